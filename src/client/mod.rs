//! Woodpecker API client.
//!
//! Resource and data source handlers talk to the server exclusively through
//! the [`WoodpeckerApi`] trait. [`HttpClient`] is the production
//! implementation; tests substitute an in-memory fake.

mod http;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpClient;
pub use types::{
    ApprovalMode, Cron, Org, Registry, Repo, RepoPatch, Secret, TrustedConfiguration,
    TrustedConfigurationPatch, User, Version, VisibilityMode,
};

/// Errors returned by the API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server URL or a request path was malformed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The server answered with a non-success status.
    #[error("client error {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, or the reason when the body was empty.
        message: String,
    },

    /// The response body was not the expected JSON document.
    #[error("couldn't decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// A [`ClientError::Status`] with the given code.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// A 404 status error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(404, message)
    }

    /// Whether the server reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Result alias for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// One method per Woodpecker REST endpoint used by the provider.
#[async_trait]
pub trait WoodpeckerApi: Send + Sync {
    /// The user owning the configured token.
    async fn self_user(&self) -> ClientResult<User>;
    /// Server build information.
    async fn version(&self) -> ClientResult<Version>;

    /// The user with `login`.
    async fn user(&self, login: &str) -> ClientResult<User>;
    /// All users.
    async fn user_list(&self) -> ClientResult<Vec<User>>;
    /// Create a user.
    async fn user_post(&self, user: &User) -> ClientResult<User>;
    /// Update the user identified by `user.login`.
    async fn user_patch(&self, user: &User) -> ClientResult<User>;
    /// Delete a user.
    async fn user_delete(&self, login: &str) -> ClientResult<()>;

    /// The global secret `name`.
    async fn global_secret(&self, name: &str) -> ClientResult<Secret>;
    /// All global secrets.
    async fn global_secret_list(&self) -> ClientResult<Vec<Secret>>;
    /// Create a global secret.
    async fn global_secret_create(&self, secret: &Secret) -> ClientResult<Secret>;
    /// Update the global secret identified by `secret.name`.
    async fn global_secret_update(&self, secret: &Secret) -> ClientResult<Secret>;
    /// Delete a global secret.
    async fn global_secret_delete(&self, name: &str) -> ClientResult<()>;

    /// Look up an organization by name.
    async fn org_lookup(&self, name: &str) -> ClientResult<Org>;
    /// The secret `name` of an organization.
    async fn org_secret(&self, org_id: i64, name: &str) -> ClientResult<Secret>;
    /// All secrets of an organization.
    async fn org_secret_list(&self, org_id: i64) -> ClientResult<Vec<Secret>>;
    /// Create an organization secret.
    async fn org_secret_create(&self, org_id: i64, secret: &Secret) -> ClientResult<Secret>;
    /// Update an organization secret identified by `secret.name`.
    async fn org_secret_update(&self, org_id: i64, secret: &Secret) -> ClientResult<Secret>;
    /// Delete an organization secret.
    async fn org_secret_delete(&self, org_id: i64, name: &str) -> ClientResult<()>;

    /// Every forge repository visible to the user, active or not.
    async fn repo_list_all(&self) -> ClientResult<Vec<Repo>>;
    /// Look up an active repository by `owner/name`.
    async fn repo_lookup(&self, full_name: &str) -> ClientResult<Repo>;
    /// Activate the forge repository with this remote id.
    async fn repo_activate(&self, forge_remote_id: &str) -> ClientResult<Repo>;
    /// Apply the set fields of `patch` to a repository.
    async fn repo_patch(&self, repo_id: i64, patch: &RepoPatch) -> ClientResult<Repo>;
    /// Deactivate a repository.
    async fn repo_delete(&self, repo_id: i64) -> ClientResult<()>;

    /// The secret `name` of a repository.
    async fn secret(&self, repo_id: i64, name: &str) -> ClientResult<Secret>;
    /// All secrets of a repository.
    async fn secret_list(&self, repo_id: i64) -> ClientResult<Vec<Secret>>;
    /// Create a repository secret.
    async fn secret_create(&self, repo_id: i64, secret: &Secret) -> ClientResult<Secret>;
    /// Update a repository secret identified by `secret.name`.
    async fn secret_update(&self, repo_id: i64, secret: &Secret) -> ClientResult<Secret>;
    /// Delete a repository secret.
    async fn secret_delete(&self, repo_id: i64, name: &str) -> ClientResult<()>;

    /// A cron job of a repository.
    async fn cron(&self, repo_id: i64, cron_id: i64) -> ClientResult<Cron>;
    /// All cron jobs of a repository.
    async fn cron_list(&self, repo_id: i64) -> ClientResult<Vec<Cron>>;
    /// Create a cron job.
    async fn cron_create(&self, repo_id: i64, cron: &Cron) -> ClientResult<Cron>;
    /// Update the cron job identified by `cron.id`.
    async fn cron_update(&self, repo_id: i64, cron: &Cron) -> ClientResult<Cron>;
    /// Delete a cron job.
    async fn cron_delete(&self, repo_id: i64, cron_id: i64) -> ClientResult<()>;

    /// The registry for `address` of a repository.
    async fn registry(&self, repo_id: i64, address: &str) -> ClientResult<Registry>;
    /// All registries of a repository.
    async fn registry_list(&self, repo_id: i64) -> ClientResult<Vec<Registry>>;
    /// Add registry credentials. The response carries no id.
    async fn registry_create(&self, repo_id: i64, registry: &Registry) -> ClientResult<Registry>;
    /// Update the registry identified by `registry.address`.
    async fn registry_update(&self, repo_id: i64, registry: &Registry) -> ClientResult<Registry>;
    /// Remove registry credentials.
    async fn registry_delete(&self, repo_id: i64, address: &str) -> ClientResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(ClientError::not_found("no such user").is_not_found());
        assert!(!ClientError::status(500, "boom").is_not_found());
    }

    #[test]
    fn test_status_display() {
        let err = ClientError::status(403, "forbidden");
        assert_eq!(err.to_string(), "client error 403: forbidden");
    }
}
