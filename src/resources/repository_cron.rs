use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{parse_import_int, require_id, split_import_id, Resource};
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, CronState};
use crate::schema::{Attribute, Schema};

/// `woodpecker_repository_cron`
pub struct RepositoryCronResource;

#[async_trait]
impl Resource for RepositoryCronResource {
    fn type_name(&self) -> &'static str {
        "woodpecker_repository_cron"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Provides a repository cron job.")
            .with_attribute("id", Attribute::computed_int64().with_description("the cron job's id"))
            .with_attribute(
                "repository_id",
                Attribute::required_int64()
                    .with_force_new()
                    .with_description("the ID of the repository"),
            )
            .with_attribute("name", Attribute::required_string().with_description("the name of the cron job"))
            .with_attribute(
                "schedule",
                Attribute::required_string()
                    .with_description("cron expression, e.g. @daily, 0 0 * * *"),
            )
            .with_attribute(
                "branch",
                Attribute::optional_computed_string()
                    .with_description("the name of the branch (uses default branch if empty)"),
            )
            .with_attribute("creator_id", Attribute::computed_int64().with_description("id of user who created the cron job"))
            .with_attribute("created_at", Attribute::computed_int64().with_description("date the cron job was created"))
    }

    async fn create(
        &self,
        api: &dyn WoodpeckerApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: CronState = decode(planned)?;
        let cron = api
            .cron_create(state.repository_id, &state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't create cron job", e))?;
        info!(repository_id = state.repository_id, id = cron.id, "created cron job");
        encode(&CronState {
            repository_id: state.repository_id,
            ..CronState::from(&cron)
        })
    }

    async fn read(
        &self,
        api: &dyn WoodpeckerApi,
        current: &Value,
    ) -> Result<Value, ProviderError> {
        let state: CronState = decode(current)?;
        let id = require_id(state.id, self.type_name())?;
        let cron = api
            .cron(state.repository_id, id)
            .await
            .map_err(|e| ProviderError::client("Couldn't get cron job", e))?;
        debug!(repository_id = state.repository_id, id, "read cron job");
        encode(&CronState {
            repository_id: state.repository_id,
            ..CronState::from(&cron)
        })
    }

    async fn update(
        &self,
        api: &dyn WoodpeckerApi,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let prior: CronState = decode(prior)?;
        let mut state: CronState = decode(planned)?;
        state.id = Some(require_id(state.id.or(prior.id), self.type_name())?);

        let cron = api
            .cron_update(state.repository_id, &state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't update cron job", e))?;
        info!(repository_id = state.repository_id, id = cron.id, "updated cron job");
        encode(&CronState {
            repository_id: state.repository_id,
            ..CronState::from(&cron)
        })
    }

    async fn delete(&self, api: &dyn WoodpeckerApi, current: &Value) -> Result<(), ProviderError> {
        let state: CronState = decode(current)?;
        let id = require_id(state.id, self.type_name())?;
        api.cron_delete(state.repository_id, id)
            .await
            .map_err(|e| ProviderError::client("Couldn't delete cron job", e))?;
        info!(repository_id = state.repository_id, id, "deleted cron job");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        let (repo_id, cron_id) = split_import_id(id, "repository_id/id")?;
        let repo_id = parse_import_int(repo_id, "Invalid repository id")?;
        let cron_id = parse_import_int(cron_id, "Invalid cron id")?;
        Ok(json!({ "repository_id": repo_id, "id": cron_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWoodpecker;

    #[tokio::test]
    async fn test_cron_lifecycle() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);

        let created = RepositoryCronResource
            .create(
                &api,
                &json!({"repository_id": repo.id, "name": "nightly", "schedule": "@daily", "branch": null}),
            )
            .await
            .unwrap();
        assert_eq!(created["name"], "nightly");
        assert_eq!(created["repository_id"], repo.id);
        assert!(created["created_at"].as_i64().unwrap() > 0);

        let mut planned = created.clone();
        planned["schedule"] = json!("@hourly");
        let updated = RepositoryCronResource
            .update(&api, &created, &planned)
            .await
            .unwrap();
        assert_eq!(updated["schedule"], "@hourly");
        assert_eq!(updated["id"], created["id"]);

        RepositoryCronResource.delete(&api, &updated).await.unwrap();
        assert!(api.cron_list(repo.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_then_read() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);
        let created = RepositoryCronResource
            .create(
                &api,
                &json!({"repository_id": repo.id, "name": "weekly", "schedule": "@weekly"}),
            )
            .await
            .unwrap();

        let imported = RepositoryCronResource
            .import_state(&format!("{}/{}", repo.id, created["id"]))
            .unwrap();
        let read = RepositoryCronResource.read(&api, &imported).await.unwrap();
        assert_eq!(read, created);
    }

    #[test]
    fn test_import_errors() {
        let err = RepositoryCronResource.import_state("1/x").unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Invalid cron id");

        let err = RepositoryCronResource.import_state("x/1").unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Invalid repository id");

        let err = RepositoryCronResource.import_state("1").unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Unexpected Import Identifier");
    }
}
