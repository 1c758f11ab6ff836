use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, RepositoryState};
use crate::resources::{Resource, RepositoryResource};
use crate::schema::Schema;

/// `woodpecker_repository`
pub struct RepositoryDataSource;

#[async_trait]
impl DataSource for RepositoryDataSource {
    fn type_name(&self) -> &'static str {
        "woodpecker_repository"
    }

    fn schema(&self) -> Schema {
        RepositoryResource
            .schema()
            .lookup(&["full_name"])
            .with_description("Use this data source to retrieve information about a repository.")
    }

    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError> {
        let query: RepositoryState = decode(config)?;
        let repo = api
            .repo_lookup(&query.full_name)
            .await
            .map_err(|e| ProviderError::client("Couldn't get repository data", e))?;
        debug!(full_name = %repo.full_name, "looked up repository");
        encode(&RepositoryState::from(&repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWoodpecker;
    use serde_json::json;

    #[tokio::test]
    async fn test_lookup_repository() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);

        let state = RepositoryDataSource
            .read(&api, &json!({"full_name": "octo/hello"}))
            .await
            .unwrap();
        assert_eq!(state["id"], repo.id);
        assert_eq!(state["name"], "hello");
        assert_eq!(state["visibility"], "public");
    }

    #[test]
    fn test_schema_is_read_only() {
        let schema = RepositoryDataSource.schema();
        for (name, attr) in &schema.attributes {
            if name == "full_name" {
                assert!(attr.flags.required);
            } else {
                assert!(attr.flags.is_computed_only(), "{}", name);
            }
        }
    }
}
