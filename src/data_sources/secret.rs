use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, SecretState};
use crate::resources::{get_secret, secret_scope, Resource, SecretKind, SecretResource};
use crate::schema::Schema;

/// Secret lookup for each scope.
pub struct SecretDataSource {
    kind: SecretKind,
}

impl SecretDataSource {
    /// The data source for secrets of `kind`.
    pub fn new(kind: SecretKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl DataSource for SecretDataSource {
    fn type_name(&self) -> &'static str {
        match self.kind {
            SecretKind::Global => "woodpecker_secret",
            SecretKind::Org => "woodpecker_org_secret",
            SecretKind::Repository => "woodpecker_repository_secret",
        }
    }

    fn schema(&self) -> Schema {
        let keys: Vec<&str> = std::iter::once("name").chain(self.kind.scope_key()).collect();
        SecretResource::new(self.kind)
            .schema()
            .without_attribute("value")
            .lookup(&keys)
            .with_description("Use this data source to retrieve information about a secret.")
    }

    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError> {
        let query: SecretState = decode(config)?;
        let scope = secret_scope(self.kind, &query)?;
        let secret = get_secret(api, scope, &query.name)
            .await
            .map_err(|e| ProviderError::client("Couldn't get secret data", e))?;
        debug!(kind = self.type_name(), name = %secret.name, "looked up secret");
        encode(&SecretState::from_api(&secret, scope, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Secret;
    use serde_json::json;
    use crate::testing::FakeWoodpecker;

    #[tokio::test]
    async fn test_repository_secret_lookup_hides_value() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);
        api.secret_create(
            repo.id,
            &Secret {
                name: "token".into(),
                value: "hunter2".into(),
                events: vec!["push".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let state = SecretDataSource::new(SecretKind::Repository)
            .read(&api, &json!({"repository_id": repo.id, "name": "token"}))
            .await
            .unwrap();

        assert_eq!(state["events"], json!(["push"]));
        assert!(state.get("value").is_none());
    }

    #[tokio::test]
    async fn test_missing_org_secret() {
        let api = FakeWoodpecker::new();
        let org = api.seed_org("octo");
        let err = SecretDataSource::new(SecretKind::Org)
            .read(&api, &json!({"org_id": org.id, "name": "missing"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Couldn't get secret data");
    }

    #[test]
    fn test_schema_keys() {
        let schema = SecretDataSource::new(SecretKind::Org).schema();
        assert!(schema.attribute("org_id").unwrap().flags.required);
        assert!(schema.attribute("name").unwrap().flags.required);
        assert!(schema.attribute("events").unwrap().flags.is_computed_only());
    }
}
