//! State models and their mapping to API payloads.
//!
//! Each struct mirrors one resource or data source schema. Unknown values
//! (computed attributes not yet known, or unset optional ones) are `None`
//! and encode as JSON `null`. Set attributes use `BTreeSet` so encoded state
//! is stable regardless of the order the server returns elements in.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{
    Cron, Org, Registry, Repo, RepoPatch, Secret, TrustedConfiguration,
    TrustedConfigurationPatch, User,
};
use crate::error::ProviderError;

/// Decode a state or config value into a model.
pub fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(value.clone())?)
}

/// Encode a model as a state value.
pub fn encode<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

fn to_set(items: &[String]) -> BTreeSet<String> {
    items.iter().cloned().collect()
}

fn to_vec(items: &BTreeSet<String>) -> Vec<String> {
    items.iter().cloned().collect()
}

/// `woodpecker_user`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Id on the forge.
    #[serde(default)]
    pub forge_id: Option<i64>,
    /// Login name, the user's identity.
    #[serde(default)]
    pub login: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Whether the user may log in.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Whether the user is an administrator.
    #[serde(default)]
    pub is_admin: Option<bool>,
}

impl From<&User> for UserState {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id),
            forge_id: Some(user.forge_id),
            login: user.login.clone(),
            email: Some(user.email.clone()),
            avatar_url: Some(user.avatar.clone()),
            is_active: Some(user.active),
            is_admin: Some(user.admin),
        }
    }
}

impl UserState {
    /// The request body for create and update.
    pub fn to_api(&self) -> User {
        User {
            id: self.id.unwrap_or_default(),
            forge_id: self.forge_id.unwrap_or_default(),
            login: self.login.clone(),
            email: self.email.clone().unwrap_or_default(),
            avatar: self.avatar_url.clone().unwrap_or_default(),
            active: self.is_active.unwrap_or_default(),
            admin: self.is_admin.unwrap_or_default(),
        }
    }
}

/// Where a secret lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretScope {
    /// Server-wide.
    Global,
    /// Owned by the organization with this id.
    Org(i64),
    /// Owned by the repository with this id.
    Repository(i64),
}

/// `woodpecker_secret`, `woodpecker_org_secret` and
/// `woodpecker_repository_secret` at schema version 1.
///
/// The scope key that does not apply to a kind is omitted from its state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretState {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Owning organization for org secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,
    /// Owning repository for repository secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<i64>,
    /// Secret name, unique within its scope.
    #[serde(default)]
    pub name: String,
    /// Write-only; the server never echoes it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Images the secret is limited to.
    #[serde(default)]
    pub images: Option<BTreeSet<String>>,
    /// Events the secret is exposed to.
    #[serde(default)]
    pub events: BTreeSet<String>,
}

impl SecretState {
    /// Build state from a server response, carrying `value` over from the
    /// caller's state.
    pub fn from_api(secret: &Secret, scope: SecretScope, value: Option<String>) -> Self {
        let (org_id, repository_id) = match scope {
            SecretScope::Global => (None, None),
            SecretScope::Org(id) => (Some(id), None),
            SecretScope::Repository(id) => (None, Some(id)),
        };
        Self {
            id: Some(secret.id),
            org_id,
            repository_id,
            name: secret.name.clone(),
            value,
            images: Some(to_set(&secret.images)),
            events: to_set(&secret.events),
        }
    }

    /// The request body; the scope travels in the URL.
    pub fn to_api(&self) -> Secret {
        Secret {
            id: self.id.unwrap_or_default(),
            name: self.name.clone(),
            value: self.value.clone().unwrap_or_default(),
            images: self.images.as_ref().map(to_vec).unwrap_or_default(),
            events: to_vec(&self.events),
            ..Default::default()
        }
    }
}

/// Secret state as written by schema version 0.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SecretStateV0 {
    /// Every field that survived into version 1.
    #[serde(flatten)]
    pub current: SecretState,
    /// Dropped in version 1.
    #[serde(default)]
    pub plugins_only: Option<bool>,
}

impl From<SecretStateV0> for SecretState {
    fn from(v0: SecretStateV0) -> Self {
        v0.current
    }
}

/// The `trusted` object of a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedState {
    /// Host network access.
    #[serde(default)]
    pub network: Option<bool>,
    /// Privileged containers.
    #[serde(default)]
    pub security: Option<bool>,
    /// Host volume mounts.
    #[serde(default)]
    pub volumes: Option<bool>,
}

impl From<&TrustedConfiguration> for TrustedState {
    fn from(trusted: &TrustedConfiguration) -> Self {
        Self {
            network: Some(trusted.network),
            security: Some(trusted.security),
            volumes: Some(trusted.volumes),
        }
    }
}

impl From<&TrustedState> for TrustedConfigurationPatch {
    fn from(trusted: &TrustedState) -> Self {
        Self {
            network: trusted.network,
            volumes: trusted.volumes,
            security: trusted.security,
        }
    }
}

/// `woodpecker_repository`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryState {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Id on the forge.
    #[serde(default)]
    pub forge_id: Option<i64>,
    /// The repository's id on the forge.
    #[serde(default)]
    pub forge_remote_id: Option<String>,
    /// Owning user or organization.
    #[serde(default)]
    pub owner: Option<String>,
    /// Name without the owner.
    #[serde(default)]
    pub name: Option<String>,
    /// `owner/name`, the identity used to find the repository.
    #[serde(default)]
    pub full_name: String,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Web URL on the forge.
    #[serde(default)]
    pub forge_url: Option<String>,
    /// Clone URL.
    #[serde(default)]
    pub clone_url: Option<String>,
    /// Default branch.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Pipeline timeout in minutes.
    #[serde(default)]
    pub timeout: Option<i64>,
    /// `public`, `private` or `internal`.
    #[serde(default)]
    pub visibility: Option<String>,
    /// Whether the forge reports the repository as private.
    #[serde(default)]
    pub is_private: Option<bool>,
    /// Elevated pipeline privileges.
    #[serde(default)]
    pub trusted: Option<TrustedState>,
    /// Approval mode name.
    #[serde(default)]
    pub require_approval: Option<String>,
    /// Users exempt from approval.
    #[serde(default)]
    pub approval_allowed_users: Option<BTreeSet<String>>,
    /// Whether the repository is activated.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Whether pull request pipelines run.
    #[serde(default)]
    pub allow_pull_requests: Option<bool>,
    /// Whether deployments may be triggered.
    #[serde(default)]
    pub allow_deployments: Option<bool>,
    /// Pipeline configuration path.
    #[serde(default)]
    pub config_file: Option<String>,
    /// Events that cancel older running pipelines.
    #[serde(default)]
    pub cancel_previous_pipeline_events: Option<BTreeSet<String>>,
    /// Plugins that receive netrc credentials.
    #[serde(default)]
    pub netrc_trusted_plugins: Option<BTreeSet<String>>,
}

impl From<&Repo> for RepositoryState {
    fn from(repo: &Repo) -> Self {
        Self {
            id: Some(repo.id),
            forge_id: Some(repo.forge_id),
            forge_remote_id: Some(repo.forge_remote_id.clone()),
            owner: Some(repo.owner.clone()),
            name: Some(repo.name.clone()),
            full_name: repo.full_name.clone(),
            avatar_url: Some(repo.avatar.clone()),
            forge_url: Some(repo.forge_url.clone()),
            clone_url: Some(repo.clone.clone()),
            default_branch: Some(repo.branch.clone()),
            timeout: Some(repo.timeout),
            visibility: Some(repo.visibility.to_string()),
            is_private: Some(repo.is_scm_private),
            trusted: Some(TrustedState::from(&repo.trusted)),
            require_approval: Some(repo.require_approval.to_string()),
            approval_allowed_users: Some(to_set(&repo.approval_allowed_users)),
            is_active: Some(repo.is_active),
            allow_pull_requests: Some(repo.allow_pull_requests),
            allow_deployments: Some(repo.allow_deployments),
            config_file: Some(repo.config.clone()),
            cancel_previous_pipeline_events: Some(to_set(&repo.cancel_previous_pipeline_events)),
            netrc_trusted_plugins: Some(to_set(&repo.netrc_trusted_plugins)),
        }
    }
}

impl RepositoryState {
    /// The settings patch for every configurable attribute that has a value.
    pub fn to_patch(&self) -> Result<RepoPatch, ProviderError> {
        let visibility = self
            .visibility
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| ProviderError::Validation(format!("visibility: {}", e)))?;
        let require_approval = self
            .require_approval
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| ProviderError::Validation(format!("require_approval: {}", e)))?;

        Ok(RepoPatch {
            config: self.config_file.clone(),
            timeout: self.timeout,
            visibility,
            trusted: self.trusted.as_ref().map(TrustedConfigurationPatch::from),
            require_approval,
            approval_allowed_users: self.approval_allowed_users.as_ref().map(to_vec),
            allow_pull_requests: self.allow_pull_requests,
            allow_deployments: self.allow_deployments,
            cancel_previous_pipeline_events: self
                .cancel_previous_pipeline_events
                .as_ref()
                .map(to_vec),
            netrc_trusted_plugins: self.netrc_trusted_plugins.as_ref().map(to_vec),
        })
    }
}

/// `woodpecker_repository_cron`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CronState {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Owning repository.
    #[serde(default)]
    pub repository_id: i64,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Cron expression.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Branch to run on.
    #[serde(default)]
    pub branch: Option<String>,
    /// Id of the creating user.
    #[serde(default)]
    pub creator_id: Option<i64>,
    /// Creation time as a unix timestamp.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl From<&Cron> for CronState {
    fn from(cron: &Cron) -> Self {
        Self {
            id: Some(cron.id),
            repository_id: cron.repo_id,
            name: Some(cron.name.clone()),
            schedule: Some(cron.schedule.clone()),
            branch: Some(cron.branch.clone()),
            creator_id: Some(cron.creator_id),
            created_at: Some(cron.created),
        }
    }
}

impl CronState {
    /// The request body for create and update.
    pub fn to_api(&self) -> Cron {
        Cron {
            id: self.id.unwrap_or_default(),
            name: self.name.clone().unwrap_or_default(),
            repo_id: self.repository_id,
            creator_id: self.creator_id.unwrap_or_default(),
            schedule: self.schedule.clone().unwrap_or_default(),
            created: self.created_at.unwrap_or_default(),
            branch: self.branch.clone().unwrap_or_default(),
        }
    }
}

/// `woodpecker_repository_registry`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Owning repository.
    #[serde(default)]
    pub repository_id: i64,
    /// Registry host.
    #[serde(default)]
    pub address: String,
    /// Login user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Write-only; the server never echoes it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Login email.
    #[serde(default)]
    pub email: Option<String>,
}

impl RegistryState {
    /// Build state from a server response, carrying `password` over from
    /// the caller's state.
    pub fn from_api(registry: &Registry, repository_id: i64, password: Option<String>) -> Self {
        Self {
            id: Some(registry.id),
            repository_id,
            address: registry.address.clone(),
            username: Some(registry.username.clone()),
            password,
            email: Some(registry.email.clone()),
        }
    }

    /// The request body, password included.
    pub fn to_api(&self) -> Registry {
        Registry {
            id: self.id.unwrap_or_default(),
            repo_id: self.repository_id,
            address: self.address.clone(),
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
        }
    }
}

/// `woodpecker_org` data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgState {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Id on the forge.
    #[serde(default)]
    pub forge_id: Option<i64>,
    /// Organization or user name.
    #[serde(default)]
    pub name: String,
    /// Whether the namespace belongs to a user.
    #[serde(default)]
    pub is_user: Option<bool>,
}

impl From<&Org> for OrgState {
    fn from(org: &Org) -> Self {
        Self {
            id: Some(org.id),
            forge_id: Some(org.forge_id),
            name: org.name.clone(),
            is_user: Some(org.is_user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApprovalMode, VisibilityMode};
    use serde_json::json;

    #[test]
    fn test_user_round_trip_through_api() {
        let state: UserState = decode(&json!({
            "login": "octocat",
            "email": "octo@example.com",
            "is_admin": true
        }))
        .unwrap();

        let user = state.to_api();
        assert_eq!(user.login, "octocat");
        assert!(user.admin);
        assert_eq!(user.avatar, "");

        let back = UserState::from(&User {
            id: 3,
            forge_id: 1,
            avatar: "https://avatars/octo".into(),
            active: true,
            ..user
        });
        assert_eq!(back.id, Some(3));
        assert_eq!(back.avatar_url.as_deref(), Some("https://avatars/octo"));
        assert_eq!(back.is_active, Some(true));
    }

    #[test]
    fn test_secret_state_keeps_value_and_scope() {
        let secret = Secret {
            id: 9,
            repo_id: 5,
            name: "token".into(),
            events: vec!["tag".into(), "push".into()],
            ..Default::default()
        };

        let state = SecretState::from_api(&secret, SecretScope::Repository(5), Some("s3cret".into()));
        let value = encode(&state).unwrap();

        assert_eq!(value["repository_id"], 5);
        assert!(value.get("org_id").is_none());
        assert_eq!(value["value"], "s3cret");
        assert_eq!(value["events"], json!(["push", "tag"]));
        assert_eq!(value["images"], json!([]));
    }

    #[test]
    fn test_global_secret_state_has_no_scope_keys() {
        let state = SecretState::from_api(
            &Secret {
                name: "global".into(),
                ..Default::default()
            },
            SecretScope::Global,
            None,
        );
        let value = encode(&state).unwrap();
        assert!(value.get("org_id").is_none());
        assert!(value.get("repository_id").is_none());
        assert!(value.get("value").is_none());
    }

    #[test]
    fn test_secret_v0_drops_plugins_only() {
        let v0: SecretStateV0 = decode(&json!({
            "id": 1,
            "name": "docker",
            "value": "pw",
            "images": ["plugins/docker"],
            "plugins_only": true,
            "events": ["push"]
        }))
        .unwrap();
        assert_eq!(v0.plugins_only, Some(true));

        let upgraded = encode(&SecretState::from(v0)).unwrap();
        assert!(upgraded.get("plugins_only").is_none());
        assert_eq!(upgraded["images"], json!(["plugins/docker"]));
        assert_eq!(upgraded["value"], "pw");
    }

    #[test]
    fn test_repository_patch_only_sends_set_fields() {
        let state: RepositoryState = decode(&json!({
            "full_name": "octo/hello",
            "visibility": "PRIVATE",
            "timeout": 30,
            "trusted": {"network": true, "volumes": null, "security": null},
            "require_approval": "pull_requests"
        }))
        .unwrap();

        let patch = state.to_patch().unwrap();
        assert_eq!(patch.visibility, Some(VisibilityMode::Private));
        assert_eq!(patch.require_approval, Some(ApprovalMode::PullRequests));
        assert_eq!(patch.allow_pull_requests, None);

        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            body,
            json!({
                "timeout": 30,
                "visibility": "private",
                "trusted": {"network": true},
                "require_approval": "pull_requests"
            })
        );
    }

    #[test]
    fn test_repository_patch_rejects_unknown_visibility() {
        let state = RepositoryState {
            full_name: "octo/hello".into(),
            visibility: Some("secret".into()),
            ..Default::default()
        };
        assert!(matches!(
            state.to_patch(),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_repository_state_from_api() {
        let repo = Repo {
            id: 2,
            full_name: "octo/hello".into(),
            visibility: VisibilityMode::Internal,
            require_approval: ApprovalMode::AllEvents,
            trusted: TrustedConfiguration {
                network: true,
                ..Default::default()
            },
            cancel_previous_pipeline_events: vec!["push".into()],
            ..Default::default()
        };

        let state = RepositoryState::from(&repo);
        assert_eq!(state.visibility.as_deref(), Some("internal"));
        assert_eq!(state.require_approval.as_deref(), Some("all_events"));
        assert_eq!(state.trusted.unwrap().network, Some(true));
        assert_eq!(state.trusted.unwrap().volumes, Some(false));
        assert_eq!(state.netrc_trusted_plugins, Some(BTreeSet::new()));
    }

    #[test]
    fn test_cron_and_registry_mapping() {
        let cron = CronState {
            repository_id: 4,
            name: Some("nightly".into()),
            schedule: Some("@daily".into()),
            ..Default::default()
        }
        .to_api();
        assert_eq!(cron.repo_id, 4);
        assert_eq!(cron.branch, "");

        let registry = Registry {
            id: 8,
            address: "ghcr.io".into(),
            username: "bot".into(),
            ..Default::default()
        };
        let state = RegistryState::from_api(&registry, 4, Some("pw".into()));
        assert_eq!(state.repository_id, 4);
        assert_eq!(state.to_api().password, "pw");
        assert_eq!(state.email.as_deref(), Some(""));
    }
}
