//! Woodpecker REST API payloads.
//!
//! Field names follow the server's JSON encoding. Optional fields on the
//! patch structs are skipped when unset so only supplied values are sent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pipeline events a secret can be exposed to.
pub const SECRET_EVENTS: &[&str] = &[
    "push",
    "tag",
    "pull_request",
    "pull_request_closed",
    "deployment",
    "cron",
    "manual",
    "release",
];

/// Events that can cancel a previously running pipeline.
pub const CANCEL_PIPELINE_EVENTS: &[&str] = &["push", "tag", "pull_request", "deployment"];

/// A Woodpecker user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned id.
    #[serde(default)]
    pub id: i64,
    /// Id of the forge account.
    #[serde(default)]
    pub forge_id: i64,
    /// Forge login name.
    pub login: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Avatar image URL.
    #[serde(default, rename = "avatar_url")]
    pub avatar: String,
    /// Whether the user may log in.
    #[serde(default)]
    pub active: bool,
    /// Whether the user is a server administrator.
    #[serde(default)]
    pub admin: bool,
}

/// A secret. The same shape is used for global, organization and
/// repository scoped secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Server-assigned id.
    #[serde(default)]
    pub id: i64,
    /// Owning organization, zero unless org scoped.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub org_id: i64,
    /// Owning repository, zero unless repository scoped.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub repo_id: i64,
    /// Secret name, unique within its scope.
    pub name: String,
    /// Never returned by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Images the secret is restricted to; empty for all images.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub images: Vec<String>,
    /// Pipeline events the secret is exposed to.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub events: Vec<String>,
}

/// Repository visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    /// Visible to everyone.
    #[default]
    Public,
    /// Visible to users with forge access.
    Private,
    /// Visible to every logged-in user.
    Internal,
}

impl VisibilityMode {
    /// The lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Internal => "internal",
        }
    }
}

/// Which pipelines need manual approval before they run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// No pipeline needs approval.
    None,
    /// Pull requests from forks need approval.
    #[default]
    Forks,
    /// All pull requests need approval.
    PullRequests,
    /// Every pipeline needs approval.
    AllEvents,
}

impl ApprovalMode {
    /// The snake_case name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Forks => "forks",
            Self::PullRequests => "pull_requests",
            Self::AllEvents => "all_events",
        }
    }
}

/// Error returned when a string names no known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl FromStr for VisibilityMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "internal" => Ok(Self::Internal),
            _ => Err(UnknownVariant {
                kind: "visibility",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "forks" => Ok(Self::Forks),
            "pull_requests" => Ok(Self::PullRequests),
            "all_events" => Ok(Self::AllEvents),
            _ => Err(UnknownVariant {
                kind: "approval mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elevated privileges granted to a repository's pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedConfiguration {
    /// Pipelines may use the host network.
    #[serde(default)]
    pub network: bool,
    /// Pipelines may mount host volumes.
    #[serde(default)]
    pub volumes: bool,
    /// Pipelines may run privileged containers.
    #[serde(default)]
    pub security: bool,
}

/// [`TrustedConfiguration`] with every field optional, for [`RepoPatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedConfigurationPatch {
    /// Host network access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<bool>,
    /// Host volume mounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<bool>,
    /// Privileged containers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<bool>,
}

/// An activated (or activatable) repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// Server-assigned id; zero until the repository is activated.
    #[serde(default)]
    pub id: i64,
    /// Id of the forge integration.
    #[serde(default)]
    pub forge_id: i64,
    /// The repository's id on the forge, used to activate it.
    #[serde(default)]
    pub forge_remote_id: String,
    /// Owning user or organization.
    #[serde(default)]
    pub owner: String,
    /// Repository name without the owner.
    #[serde(default)]
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Avatar image URL.
    #[serde(default, rename = "avatar_url")]
    pub avatar: String,
    /// Web URL on the forge.
    #[serde(default)]
    pub forge_url: String,
    /// Clone URL.
    #[serde(default, rename = "clone_url")]
    pub clone: String,
    /// Default branch.
    #[serde(default, rename = "default_branch")]
    pub branch: String,
    /// Pipeline timeout in minutes.
    #[serde(default)]
    pub timeout: i64,
    /// Who can see the repository and its pipelines.
    #[serde(default)]
    pub visibility: VisibilityMode,
    /// Whether the forge reports the repository as private.
    #[serde(default, rename = "private")]
    pub is_scm_private: bool,
    /// Elevated privileges for pipelines.
    #[serde(default)]
    pub trusted: TrustedConfiguration,
    /// Which pipelines need manual approval.
    #[serde(default)]
    pub require_approval: ApprovalMode,
    /// Users whose pipelines never need approval.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub approval_allowed_users: Vec<String>,
    /// Whether the repository is activated on the server.
    #[serde(default, rename = "active")]
    pub is_active: bool,
    /// Whether pull request pipelines run.
    #[serde(default, rename = "allow_pr")]
    pub allow_pull_requests: bool,
    /// Whether deployments may be triggered.
    #[serde(default, rename = "allow_deploy")]
    pub allow_deployments: bool,
    /// Path of the pipeline configuration.
    #[serde(default, rename = "config_file")]
    pub config: String,
    /// Events that cancel older running pipelines.
    #[serde(default, deserialize_with = "nullable_vec")]
    pub cancel_previous_pipeline_events: Vec<String>,
    /// Plugins that receive netrc credentials.
    #[serde(default, rename = "netrc_trusted", deserialize_with = "nullable_vec")]
    pub netrc_trusted_plugins: Vec<String>,
}

/// Partial repository settings update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoPatch {
    /// New pipeline configuration path.
    #[serde(rename = "config_file", skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    /// New timeout in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    /// New visibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityMode>,
    /// Trusted settings to change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted: Option<TrustedConfigurationPatch>,
    /// New approval mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<ApprovalMode>,
    /// Replacement approval allow list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_allowed_users: Option<Vec<String>>,
    /// Toggle pull request pipelines.
    #[serde(rename = "allow_pr", skip_serializing_if = "Option::is_none")]
    pub allow_pull_requests: Option<bool>,
    /// Toggle deployments.
    #[serde(rename = "allow_deploy", skip_serializing_if = "Option::is_none")]
    pub allow_deployments: Option<bool>,
    /// Replacement cancel events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_previous_pipeline_events: Option<Vec<String>>,
    /// Replacement netrc plugin list.
    #[serde(rename = "netrc_trusted", skip_serializing_if = "Option::is_none")]
    pub netrc_trusted_plugins: Option<Vec<String>>,
}

/// A scheduled pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cron {
    /// Server-assigned id.
    #[serde(default)]
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Owning repository.
    #[serde(default)]
    pub repo_id: i64,
    /// Id of the user who created the job.
    #[serde(default)]
    pub creator_id: i64,
    /// Cron expression or descriptor such as `@daily`.
    pub schedule: String,
    /// Creation time as a unix timestamp.
    #[serde(default)]
    pub created: i64,
    /// Branch the pipeline runs on; empty for the default branch.
    #[serde(default)]
    pub branch: String,
}

/// Container registry credentials attached to a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Server-assigned id. Not echoed on create.
    #[serde(default)]
    pub id: i64,
    /// Owning repository.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub repo_id: i64,
    /// Registry host, unique within the repository.
    pub address: String,
    #[serde(default)]
    pub username: String,
    /// Never returned by the server.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Login email for the registry.
    #[serde(default)]
    pub email: String,
}

/// An organization (or user namespace) known to the forge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    /// Server-assigned id.
    #[serde(default)]
    pub id: i64,
    /// Id on the forge.
    #[serde(default)]
    pub forge_id: i64,
    /// Organization or user name.
    pub name: String,
    /// Whether this namespace is a user rather than an organization.
    #[serde(default)]
    pub is_user: bool,
}

/// Server build information from `/version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Source repository of the server build.
    #[serde(default)]
    pub source: String,
    /// Version string, possibly with a build suffix.
    pub version: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// The server encodes empty lists as `null`.
fn nullable_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visibility_parse_is_case_insensitive() {
        assert_eq!("PUBLIC".parse::<VisibilityMode>(), Ok(VisibilityMode::Public));
        assert_eq!("Internal".parse::<VisibilityMode>(), Ok(VisibilityMode::Internal));
        assert!("secret".parse::<VisibilityMode>().is_err());
    }

    #[test]
    fn test_approval_mode_wire_names() {
        assert_eq!(
            serde_json::to_value(ApprovalMode::PullRequests).unwrap(),
            json!("pull_requests")
        );
        assert_eq!(
            "all_events".parse::<ApprovalMode>(),
            Ok(ApprovalMode::AllEvents)
        );
        assert_eq!(ApprovalMode::None.to_string(), "none");
    }

    #[test]
    fn test_repo_decodes_null_lists() {
        let repo: Repo = serde_json::from_value(json!({
            "id": 7,
            "full_name": "octo/hello",
            "cancel_previous_pipeline_events": null,
            "netrc_trusted": null,
            "allow_pr": true,
            "private": true
        }))
        .unwrap();

        assert_eq!(repo.id, 7);
        assert!(repo.cancel_previous_pipeline_events.is_empty());
        assert!(repo.netrc_trusted_plugins.is_empty());
        assert!(repo.allow_pull_requests);
        assert!(repo.is_scm_private);
        assert_eq!(repo.visibility, VisibilityMode::Public);
    }

    #[test]
    fn test_repo_patch_skips_unset_fields() {
        let patch = RepoPatch {
            timeout: Some(30),
            trusted: Some(TrustedConfigurationPatch {
                network: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"timeout": 30, "trusted": {"network": true}})
        );
    }

    #[test]
    fn test_secret_omits_empty_value() {
        let secret = Secret {
            name: "token".into(),
            events: vec!["push".into()],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&secret).unwrap();
        assert!(encoded.get("value").is_none());
        assert!(encoded.get("repo_id").is_none());
        assert_eq!(encoded["events"], json!(["push"]));
    }
}
