//! Managed resources.
//!
//! Every resource maps one state value to Woodpecker API calls. The provider
//! validates and plans against [`Resource::schema`] before any handler runs,
//! so handlers can assume planned state is well-formed.

mod repository;
mod repository_cron;
mod repository_registry;
mod secret;
mod user;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::schema::Schema;

pub use repository::RepositoryResource;
pub use repository_cron::RepositoryCronResource;
pub use repository_registry::RepositoryRegistryResource;
pub use secret::{SecretKind, SecretResource};
pub use user::UserResource;

pub(crate) use secret::{get_secret, secret_scope};

/// A resource type managed by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The full type name, e.g. `woodpecker_user`.
    fn type_name(&self) -> &'static str;

    /// Current schema, including its version.
    fn schema(&self) -> Schema;

    /// Create the object described by `planned` and return the new state.
    async fn create(&self, api: &dyn WoodpeckerApi, planned: &Value)
        -> Result<Value, ProviderError>;

    /// Refresh `current` from the server.
    async fn read(&self, api: &dyn WoodpeckerApi, current: &Value)
        -> Result<Value, ProviderError>;

    /// Apply `planned` to an existing object.
    async fn update(
        &self,
        api: &dyn WoodpeckerApi,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object described by `current`.
    async fn delete(&self, api: &dyn WoodpeckerApi, current: &Value)
        -> Result<(), ProviderError>;

    /// Turn an import identifier into the key attributes of a state value.
    fn import_state(&self, id: &str) -> Result<Value, ProviderError>;

    /// Convert state written by an older schema version to the current one.
    fn upgrade_state(&self, version: i64, state: Value) -> Result<Value, ProviderError> {
        let current = self.schema().version as i64;
        if version == current {
            Ok(state)
        } else {
            Err(ProviderError::Validation(format!(
                "{} has no state upgrade from version {} to {}",
                self.type_name(),
                version,
                current
            )))
        }
    }
}

/// Every resource the provider serves.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(UserResource),
        Arc::new(SecretResource::new(SecretKind::Global)),
        Arc::new(SecretResource::new(SecretKind::Org)),
        Arc::new(SecretResource::new(SecretKind::Repository)),
        Arc::new(RepositoryResource),
        Arc::new(RepositoryCronResource),
        Arc::new(RepositoryRegistryResource),
    ]
}

const IMPORT_ID_SEPARATOR: char = '/';

/// Split a two-part import identifier such as `repository_id/name`.
fn split_import_id<'a>(id: &'a str, format: &str) -> Result<(&'a str, &'a str), ProviderError> {
    let parts: Vec<&str> = id.split(IMPORT_ID_SEPARATOR).collect();
    match parts.as_slice() {
        [first, second] if !first.is_empty() && !second.is_empty() => Ok((first, second)),
        _ => Err(unexpected_import_id(id, format)),
    }
}

fn unexpected_import_id(id: &str, format: &str) -> ProviderError {
    ProviderError::invalid_import_id(
        "Unexpected Import Identifier",
        format!(
            "Expected import identifier with format: {}. Got: {:?}",
            format, id
        ),
    )
}

/// Parse the numeric part of an import identifier.
fn parse_import_int(part: &str, summary: &str) -> Result<i64, ProviderError> {
    part.parse::<i64>()
        .map_err(|e| ProviderError::invalid_import_id(summary, e.to_string()))
}

/// Fail when a server-assigned id is missing from state.
fn require_id(id: Option<i64>, type_name: &str) -> Result<i64, ProviderError> {
    id.ok_or_else(|| ProviderError::Validation(format!("{} state has no id", type_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_import_id() {
        assert_eq!(
            split_import_id("12/deploy_key", "repository_id/name").unwrap(),
            ("12", "deploy_key")
        );

        for bad in ["12", "12/", "/name", "1/2/3", ""] {
            let err = split_import_id(bad, "repository_id/name").unwrap_err();
            let diagnostics = err.to_diagnostics();
            assert_eq!(diagnostics[0].summary, "Unexpected Import Identifier");
            assert!(diagnostics[0]
                .detail
                .as_deref()
                .unwrap()
                .contains(&format!("Got: {:?}", bad)));
        }
    }

    #[test]
    fn test_parse_import_int() {
        assert_eq!(parse_import_int("42", "Invalid repository id").unwrap(), 42);

        let err = parse_import_int("abc", "Invalid repository id").unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Invalid repository id");
    }

    #[test]
    fn test_all_type_names_unique() {
        let resources = all();
        let mut names: Vec<_> = resources.iter().map(|r| r.type_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), resources.len());
        assert!(names.iter().all(|n| n.starts_with("woodpecker_")));
    }

    #[test]
    fn test_default_upgrade_rejects_unknown_version() {
        let user = UserResource;
        let state = serde_json::json!({"login": "octocat"});
        assert_eq!(user.upgrade_state(0, state.clone()).unwrap(), state);
        assert!(user.upgrade_state(3, state).is_err());
    }
}
