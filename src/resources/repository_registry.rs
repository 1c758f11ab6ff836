use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{parse_import_int, split_import_id, Resource};
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, RegistryState};
use crate::schema::{Attribute, Schema};

/// `woodpecker_repository_registry`
pub struct RepositoryRegistryResource;

#[async_trait]
impl Resource for RepositoryRegistryResource {
    fn type_name(&self) -> &'static str {
        "woodpecker_repository_registry"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Provides a repository registry.")
            .with_attribute("id", Attribute::computed_int64().with_description("the id of the registry"))
            .with_attribute(
                "repository_id",
                Attribute::required_int64()
                    .with_force_new()
                    .with_description("the ID of the repository"),
            )
            .with_attribute(
                "address",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the address of the registry (e.g. docker.io)"),
            )
            .with_attribute("username", Attribute::required_string().with_description("username used for authentication"))
            .with_attribute(
                "password",
                Attribute::required_string()
                    .sensitive()
                    .with_description("password used for authentication"),
            )
            .with_attribute("email", Attribute::optional_computed_string().with_description("email used for authentication"))
    }

    async fn create(
        &self,
        api: &dyn WoodpeckerApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: RegistryState = decode(planned)?;
        api.registry_create(state.repository_id, &state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't create registry", e))?;

        // The create response carries no id.
        let registry = api
            .registry(state.repository_id, &state.address)
            .await
            .map_err(|e| ProviderError::client("Couldn't get registry", e))?;
        info!(repository_id = state.repository_id, address = %registry.address, "created registry");
        encode(&RegistryState::from_api(&registry, state.repository_id, state.password))
    }

    async fn read(
        &self,
        api: &dyn WoodpeckerApi,
        current: &Value,
    ) -> Result<Value, ProviderError> {
        let state: RegistryState = decode(current)?;
        let registry = api
            .registry(state.repository_id, &state.address)
            .await
            .map_err(|e| ProviderError::client("Couldn't get registry", e))?;
        debug!(repository_id = state.repository_id, address = %registry.address, "read registry");
        encode(&RegistryState::from_api(&registry, state.repository_id, state.password))
    }

    async fn update(
        &self,
        api: &dyn WoodpeckerApi,
        _prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: RegistryState = decode(planned)?;
        let registry = api
            .registry_update(state.repository_id, &state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't update registry", e))?;
        info!(repository_id = state.repository_id, address = %registry.address, "updated registry");
        encode(&RegistryState::from_api(&registry, state.repository_id, state.password))
    }

    async fn delete(&self, api: &dyn WoodpeckerApi, current: &Value) -> Result<(), ProviderError> {
        let state: RegistryState = decode(current)?;
        api.registry_delete(state.repository_id, &state.address)
            .await
            .map_err(|e| ProviderError::client("Couldn't delete registry", e))?;
        info!(repository_id = state.repository_id, address = %state.address, "deleted registry");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let (repo_id, address) = split_import_id(id, "repository_id/address")?;
        let repo_id = parse_import_int(repo_id, "Invalid repository id")?;
        Ok(json!({ "repository_id": repo_id, "address": address }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWoodpecker;

    #[tokio::test]
    async fn test_create_rereads_for_id() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);

        let created = RepositoryRegistryResource
            .create(
                &api,
                &json!({
                    "repository_id": repo.id,
                    "address": "ghcr.io",
                    "username": "bot",
                    "password": "pw",
                    "email": null
                }),
            )
            .await
            .unwrap();

        assert!(created["id"].as_i64().unwrap() > 0);
        assert_eq!(created["password"], "pw");
        assert_eq!(api.calls(), vec!["registry_create", "registry"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);
        let created = RepositoryRegistryResource
            .create(
                &api,
                &json!({"repository_id": repo.id, "address": "docker.io", "username": "a", "password": "pw"}),
            )
            .await
            .unwrap();

        let mut planned = created.clone();
        planned["username"] = json!("b");
        let updated = RepositoryRegistryResource
            .update(&api, &created, &planned)
            .await
            .unwrap();
        assert_eq!(updated["username"], "b");
        assert_eq!(updated["password"], "pw");

        RepositoryRegistryResource.delete(&api, &updated).await.unwrap();
        assert!(api.registry_list(repo.id).await.unwrap().is_empty());
    }

    #[test]
    fn test_import() {
        assert_eq!(
            RepositoryRegistryResource.import_state("4/ghcr.io").unwrap(),
            json!({"repository_id": 4, "address": "ghcr.io"})
        );
    }
}
