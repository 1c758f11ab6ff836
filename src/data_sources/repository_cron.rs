use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, CronState};
use crate::resources::{RepositoryCronResource, Resource};
use crate::schema::Schema;

/// `woodpecker_repository_cron`
pub struct RepositoryCronDataSource;

#[async_trait]
impl DataSource for RepositoryCronDataSource {
    fn type_name(&self) -> &'static str {
        "woodpecker_repository_cron"
    }

    fn schema(&self) -> Schema {
        RepositoryCronResource
            .schema()
            .lookup(&["repository_id", "id"])
            .with_description("Use this data source to retrieve information about a cron job in a specific repository.")
    }

    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError> {
        let query: CronState = decode(config)?;
        let id = query.id.unwrap_or_default();
        let cron = api
            .cron(query.repository_id, id)
            .await
            .map_err(|e| ProviderError::client("Couldn't get cron job data", e))?;
        debug!(repository_id = query.repository_id, id, "looked up cron job");
        encode(&CronState {
            repository_id: query.repository_id,
            ..CronState::from(&cron)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Cron;
    use crate::testing::FakeWoodpecker;
    use serde_json::json;

    #[tokio::test]
    async fn test_lookup_cron() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);
        let cron = api
            .cron_create(
                repo.id,
                &Cron {
                    name: "nightly".into(),
                    schedule: "@daily".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let state = RepositoryCronDataSource
            .read(&api, &json!({"repository_id": repo.id, "id": cron.id}))
            .await
            .unwrap();
        assert_eq!(state["name"], "nightly");
        assert_eq!(state["schedule"], "@daily");

        let err = RepositoryCronDataSource
            .read(&api, &json!({"repository_id": repo.id, "id": 999}))
            .await
            .unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Couldn't get cron job data");
    }
}
