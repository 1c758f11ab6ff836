//! Global, organization and repository secrets.
//!
//! The three kinds share one schema shape and differ only in their scope key
//! and in which endpoints they call.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{parse_import_int, split_import_id, unexpected_import_id, Resource};
use crate::client::types::SECRET_EVENTS;
use crate::client::{ClientResult, Secret, WoodpeckerApi};
use crate::error::ProviderError;
use crate::models::{decode, encode, SecretScope, SecretState, SecretStateV0};
use crate::schema::{Attribute, Schema};

/// Which endpoints a secret lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// `woodpecker_secret`, server-wide.
    Global,
    /// `woodpecker_org_secret`, keyed by `org_id`.
    Org,
    /// `woodpecker_repository_secret`, keyed by `repository_id`.
    Repository,
}

impl SecretKind {
    /// Name of the state attribute holding the scope id, if any.
    pub fn scope_key(&self) -> Option<&'static str> {
        match self {
            Self::Global => None,
            Self::Org => Some("org_id"),
            Self::Repository => Some("repository_id"),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Global => "woodpecker_secret",
            Self::Org => "woodpecker_org_secret",
            Self::Repository => "woodpecker_repository_secret",
        }
    }
}

/// Resolve the scope a secret state refers to.
pub(crate) fn secret_scope(kind: SecretKind, state: &SecretState) -> Result<SecretScope, ProviderError> {
    let missing = |key: &str| ProviderError::Validation(format!("{} is required", key));
    match kind {
        SecretKind::Global => Ok(SecretScope::Global),
        SecretKind::Org => state.org_id.map(SecretScope::Org).ok_or_else(|| missing("org_id")),
        SecretKind::Repository => state
            .repository_id
            .map(SecretScope::Repository)
            .ok_or_else(|| missing("repository_id")),
    }
}

pub(crate) async fn get_secret(
    api: &dyn WoodpeckerApi,
    scope: SecretScope,
    name: &str,
) -> ClientResult<Secret> {
    match scope {
        SecretScope::Global => api.global_secret(name).await,
        SecretScope::Org(org_id) => api.org_secret(org_id, name).await,
        SecretScope::Repository(repo_id) => api.secret(repo_id, name).await,
    }
}

async fn create_secret(
    api: &dyn WoodpeckerApi,
    scope: SecretScope,
    secret: &Secret,
) -> ClientResult<Secret> {
    match scope {
        SecretScope::Global => api.global_secret_create(secret).await,
        SecretScope::Org(org_id) => api.org_secret_create(org_id, secret).await,
        SecretScope::Repository(repo_id) => api.secret_create(repo_id, secret).await,
    }
}

async fn update_secret(
    api: &dyn WoodpeckerApi,
    scope: SecretScope,
    secret: &Secret,
) -> ClientResult<Secret> {
    match scope {
        SecretScope::Global => api.global_secret_update(secret).await,
        SecretScope::Org(org_id) => api.org_secret_update(org_id, secret).await,
        SecretScope::Repository(repo_id) => api.secret_update(repo_id, secret).await,
    }
}

async fn delete_secret(api: &dyn WoodpeckerApi, scope: SecretScope, name: &str) -> ClientResult<()> {
    match scope {
        SecretScope::Global => api.global_secret_delete(name).await,
        SecretScope::Org(org_id) => api.org_secret_delete(org_id, name).await,
        SecretScope::Repository(repo_id) => api.secret_delete(repo_id, name).await,
    }
}

/// `woodpecker_secret`, `woodpecker_org_secret` or
/// `woodpecker_repository_secret`, depending on `kind`.
pub struct SecretResource {
    kind: SecretKind,
}

impl SecretResource {
    /// The resource for secrets of `kind`.
    pub fn new(kind: SecretKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Resource for SecretResource {
    fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    fn schema(&self) -> Schema {
        let description = match self.kind {
            SecretKind::Global => "Provides a global secret.",
            SecretKind::Org => "Provides an organization secret.",
            SecretKind::Repository => "Provides a repository secret.",
        };
        let schema = Schema::new(1)
            .with_description(description)
            .with_attribute(
                "id",
                Attribute::computed_int64().with_description("the secret's id"),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the name of the secret"),
            )
            .with_attribute(
                "value",
                Attribute::required_string()
                    .sensitive()
                    .with_description("the value of the secret"),
            )
            .with_attribute(
                "images",
                Attribute::optional_computed_string_set()
                    .with_description("list of Docker images where this secret is available"),
            )
            .with_attribute(
                "events",
                Attribute::required_string_set()
                    .one_of(SECRET_EVENTS)
                    .with_description("events for which the secret is available"),
            );

        match self.kind.scope_key() {
            Some(key) => schema.with_attribute(
                key,
                Attribute::required_int64()
                    .with_force_new()
                    .with_description(format!("the ID of the {}", key.trim_end_matches("_id"))),
            ),
            None => schema,
        }
    }

    async fn create(
        &self,
        api: &dyn WoodpeckerApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: SecretState = decode(planned)?;
        let scope = secret_scope(self.kind, &state)?;
        let secret = create_secret(api, scope, &state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't create secret", e))?;
        info!(kind = self.type_name(), name = %secret.name, id = secret.id, "created secret");
        encode(&SecretState::from_api(&secret, scope, state.value))
    }

    async fn read(
        &self,
        api: &dyn WoodpeckerApi,
        current: &Value,
    ) -> Result<Value, ProviderError> {
        let state: SecretState = decode(current)?;
        let scope = secret_scope(self.kind, &state)?;
        let secret = get_secret(api, scope, &state.name)
            .await
            .map_err(|e| ProviderError::client("Couldn't get secret", e))?;
        debug!(kind = self.type_name(), name = %secret.name, "read secret");
        encode(&SecretState::from_api(&secret, scope, state.value))
    }

    async fn update(
        &self,
        api: &dyn WoodpeckerApi,
        _prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: SecretState = decode(planned)?;
        let scope = secret_scope(self.kind, &state)?;
        let secret = update_secret(api, scope, &state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't update secret", e))?;
        info!(kind = self.type_name(), name = %secret.name, "updated secret");
        encode(&SecretState::from_api(&secret, scope, state.value))
    }

    async fn delete(&self, api: &dyn WoodpeckerApi, current: &Value) -> Result<(), ProviderError> {
        let state: SecretState = decode(current)?;
        let scope = secret_scope(self.kind, &state)?;
        delete_secret(api, scope, &state.name)
            .await
            .map_err(|e| ProviderError::client("Couldn't delete secret", e))?;
        info!(kind = self.type_name(), name = %state.name, "deleted secret");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        match self.kind {
            SecretKind::Global => {
                if id.is_empty() {
                    return Err(unexpected_import_id(id, "name"));
                }
                Ok(json!({ "name": id }))
            },
            SecretKind::Org => {
                let (org_id, name) = split_import_id(id, "org_id/name")?;
                let org_id = parse_import_int(org_id, "Invalid org id")?;
                Ok(json!({ "org_id": org_id, "name": name }))
            },
            SecretKind::Repository => {
                let (repo_id, name) = split_import_id(id, "repository_id/name")?;
                let repo_id = parse_import_int(repo_id, "Invalid repository id")?;
                Ok(json!({ "repository_id": repo_id, "name": name }))
            },
        }
    }

    fn upgrade_state(&self, version: i64, state: Value) -> Result<Value, ProviderError> {
        match version {
            0 => {
                let v0: SecretStateV0 = decode(&state)?;
                debug!(kind = self.type_name(), "upgrading secret state from version 0");
                encode(&SecretState::from(v0))
            },
            1 => Ok(state),
            other => Err(ProviderError::Validation(format!(
                "{} has no state upgrade from version {} to 1",
                self.type_name(),
                other
            ))),
        }
    }
}
