use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, RegistryState};
use crate::resources::{RepositoryRegistryResource, Resource};
use crate::schema::Schema;

/// `woodpecker_repository_registry`
pub struct RepositoryRegistryDataSource;

#[async_trait]
impl DataSource for RepositoryRegistryDataSource {
    fn type_name(&self) -> &'static str {
        "woodpecker_repository_registry"
    }

    fn schema(&self) -> Schema {
        RepositoryRegistryResource
            .schema()
            .without_attribute("password")
            .lookup(&["repository_id", "address"])
            .with_description("Use this data source to retrieve information about a container registry in a specific repository.")
    }

    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError> {
        let query: RegistryState = decode(config)?;
        let registry = api
            .registry(query.repository_id, &query.address)
            .await
            .map_err(|e| ProviderError::client("Couldn't get registry data", e))?;
        debug!(repository_id = query.repository_id, address = %registry.address, "looked up registry");
        encode(&RegistryState::from_api(&registry, query.repository_id, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Registry;
    use crate::testing::FakeWoodpecker;
    use serde_json::json;

    #[tokio::test]
    async fn test_lookup_registry() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);
        api.registry_create(
            repo.id,
            &Registry {
                address: "ghcr.io".into(),
                username: "bot".into(),
                password: "pw".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let state = RepositoryRegistryDataSource
            .read(&api, &json!({"repository_id": repo.id, "address": "ghcr.io"}))
            .await
            .unwrap();
        assert_eq!(state["username"], "bot");
        assert!(state.get("password").is_none());
    }
}
