use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{require_id, unexpected_import_id, Resource};
use crate::client::types::CANCEL_PIPELINE_EVENTS;
use crate::client::{ClientError, WoodpeckerApi};
use crate::error::ProviderError;
use crate::models::{decode, encode, RepositoryState};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `woodpecker_repository`
///
/// Creating the resource activates an existing forge repository in
/// Woodpecker; deleting it removes the repository from Woodpecker.
pub struct RepositoryResource;

pub(crate) fn repository_schema() -> Schema {
    let trusted = AttributeType::object([
        ("network", AttributeType::Bool),
        ("security", AttributeType::Bool),
        ("volumes", AttributeType::Bool),
    ]);

    Schema::v0()
        .with_description("Provides a repository.")
        .with_attribute("id", Attribute::computed_int64().with_description("the repository's id"))
        .with_attribute("forge_id", Attribute::computed_int64().with_description("the forge's id"))
        .with_attribute(
            "forge_remote_id",
            Attribute::computed_string().with_description("the unique identifier for the repository on the forge"),
        )
        .with_attribute("owner", Attribute::computed_string().with_description("the owner of the repository"))
        .with_attribute("name", Attribute::computed_string().with_description("the name of the repository"))
        .with_attribute(
            "full_name",
            Attribute::required_string()
                .with_force_new()
                .with_description("the full name of the repository (format: owner/reponame)"),
        )
        .with_attribute("avatar_url", Attribute::computed_string().with_description("the repository's avatar URL"))
        .with_attribute("forge_url", Attribute::computed_string().with_description("the URL of the repository on the forge"))
        .with_attribute("clone_url", Attribute::computed_string().with_description("the URL to clone repository"))
        .with_attribute("default_branch", Attribute::computed_string().with_description("the name of the default branch"))
        .with_attribute("is_private", Attribute::computed_bool().with_description("whether the repo (SCM) is private"))
        .with_attribute("is_active", Attribute::computed_bool().with_description("whether the repo is active"))
        .with_attribute(
            "timeout",
            Attribute::optional_computed_int64()
                .at_least(1)
                .with_description("after this timeout a pipeline has to finish or will be treated as timed out (in minutes)"),
        )
        .with_attribute(
            "visibility",
            Attribute::optional_computed_string()
                .one_of_case_insensitive(&["public", "private", "internal"])
                .with_description("project visibility (public, private, internal)"),
        )
        .with_attribute(
            "trusted",
            Attribute::new(trusted, AttributeFlags::optional_computed())
                .with_description("elevated privileges (network, security, volumes) for the repository's pipelines"),
        )
        .with_attribute(
            "require_approval",
            Attribute::optional_computed_string()
                .one_of(&["none", "forks", "pull_requests", "all_events"])
                .with_description("which events require approval before the pipeline runs"),
        )
        .with_attribute(
            "approval_allowed_users",
            Attribute::optional_computed_string_set()
                .with_description("users allowed to approve pipelines"),
        )
        .with_attribute(
            "allow_pull_requests",
            Attribute::optional_computed_bool().with_description("Enables handling webhook's pull request event. If disabled, then pipeline won't run for pull requests."),
        )
        .with_attribute(
            "allow_deployments",
            Attribute::optional_computed_bool().with_description("Enables a repository to be deployed"),
        )
        .with_attribute(
            "config_file",
            Attribute::optional_computed_string().with_description("The path to the pipeline config file or folder. By default it is left empty which will use the following configuration resolution .woodpecker/*.yml -> .woodpecker/*.yaml -> .woodpecker.yml -> .woodpecker.yaml."),
        )
        .with_attribute(
            "cancel_previous_pipeline_events",
            Attribute::optional_computed_string_set()
                .one_of(CANCEL_PIPELINE_EVENTS)
                .with_description("Enables to cancel pending and running pipelines of the same event and context before starting the newly triggered one."),
        )
        .with_attribute(
            "netrc_trusted_plugins",
            Attribute::optional_computed_string_set()
                .with_description("Plugins that get access to netrc credentials that can be used to clone repositories from the forge or push them into the forge."),
        )
}

#[async_trait]
impl Resource for RepositoryResource {
    fn type_name(&self) -> &'static str {
        "woodpecker_repository"
    }

    fn schema(&self) -> Schema {
        repository_schema()
    }

    async fn create(
        &self,
        api: &dyn WoodpeckerApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: RepositoryState = decode(planned)?;
        let patch = state.to_patch()?;

        let repos = api
            .repo_list_all()
            .await
            .map_err(|e| ProviderError::client("Couldn't list repositories", e))?;
        let forge_repo = repos
            .iter()
            .find(|repo| repo.full_name == state.full_name)
            .ok_or_else(|| {
                ProviderError::client(
                    "Repository not found",
                    ClientError::not_found(format!(
                        "Repository with name '{}' not found",
                        state.full_name
                    )),
                )
            })?;

        let activated = api
            .repo_activate(&forge_repo.forge_remote_id)
            .await
            .map_err(|e| ProviderError::client("Couldn't activate repository", e))?;
        info!(full_name = %activated.full_name, id = activated.id, "activated repository");

        let updated = api
            .repo_patch(activated.id, &patch)
            .await
            .map_err(|e| ProviderError::client("Couldn't update repository", e))?;
        encode(&RepositoryState::from(&updated))
    }

    async fn read(
        &self,
        api: &dyn WoodpeckerApi,
        current: &Value,
    ) -> Result<Value, ProviderError> {
        let state: RepositoryState = decode(current)?;
        let repo = api
            .repo_lookup(&state.full_name)
            .await
            .map_err(|e| ProviderError::client("Couldn't get repository", e))?;
        debug!(full_name = %repo.full_name, "read repository");
        encode(&RepositoryState::from(&repo))
    }

    async fn update(
        &self,
        api: &dyn WoodpeckerApi,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let prior: RepositoryState = decode(prior)?;
        let state: RepositoryState = decode(planned)?;
        let id = require_id(state.id.or(prior.id), self.type_name())?;

        let repo = api
            .repo_patch(id, &state.to_patch()?)
            .await
            .map_err(|e| ProviderError::client("Couldn't update repository", e))?;
        info!(full_name = %repo.full_name, "updated repository");
        encode(&RepositoryState::from(&repo))
    }

    async fn delete(&self, api: &dyn WoodpeckerApi, current: &Value) -> Result<(), ProviderError> {
        let state: RepositoryState = decode(current)?;
        let id = require_id(state.id, self.type_name())?;
        api.repo_delete(id)
            .await
            .map_err(|e| ProviderError::client("Couldn't delete repository", e))?;
        info!(full_name = %state.full_name, "deleted repository");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        if id.is_empty() {
            return Err(unexpected_import_id(id, "owner/name"));
        }
        Ok(json!({ "full_name": id }))
    }
}
