//! Test support for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] without a gRPC server and
//! [`FakeWoodpecker`] is an in-memory [`WoodpeckerApi`] that records every
//! call it receives.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use terraform_provider_woodpecker::testing::{FakeWoodpecker, ProviderTester};
//! use terraform_provider_woodpecker::WoodpeckerProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_user() {
//!     let api = Arc::new(FakeWoodpecker::new());
//!     let tester = ProviderTester::new(WoodpeckerProvider::with_client(api.clone()));
//!
//!     let state = tester
//!         .lifecycle_create("woodpecker_user", json!({"login": "alice"}))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["login"], "alice");
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{
    ClientError, ClientResult, Cron, Org, Registry, Repo, RepoPatch, Secret, User, Version,
    WoodpeckerApi,
};
use crate::error::ProviderError;
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a [`ProviderService`] directly, the way the host would over gRPC.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's full schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names from the metadata.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names from the metadata.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate a provider configuration block.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Ask the provider to stop.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create, using `proposed_state` as the configuration too.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan an update of `prior_state`, using `proposed_state` as the configuration too.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a destroy by proposing a null state.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Plan with explicit prior state, proposed state and configuration.
    pub async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, prior_state, proposed_state, config)
            .await
    }

    /// Apply a planned create.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Apply a planned update.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import by identifier.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade state written by an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create, then read back. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Plan, update, then read back. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Plan the destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update and delete in sequence. Returns the last state seen
    /// before the delete.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created_state = self.lifecycle_create(resource_type, initial_config).await?;
        let updated_state = self
            .lifecycle_update(resource_type, created_state, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated_state.clone())
            .await?;

        Ok(updated_state)
    }
}

/// Failure of a tester operation.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The provider returned error diagnostics.
    #[error("operation failed with {}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The provider returned an error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = format!("[{:?}] {}", d.severity, d.summary);
            if let Some(detail) = &d.detail {
                line.push_str(": ");
                line.push_str(detail);
            }
            if let Some(attr) = &d.attribute {
                line.push_str(&format!(" (at {})", attr));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    if has_errors(&diagnostics) {
        Err(TestError::Diagnostics(
            diagnostics.into_iter().filter(Diagnostic::is_error).collect(),
        ))
    } else {
        Ok(())
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates a resource: it has changes and does not
/// replace anything.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected a create plan, got no changes");
    assert!(!plan.requires_replace, "expected a create plan, got a replacement");
}

/// Assert that a plan changes nothing.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, got {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan changes at least one attribute.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected changes, got none");
}

/// Assert that applying the plan destroys and recreates the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected a replacement, changed attributes: {:?}",
        changed_paths(plan)
    );
}

/// Assert that a plan changes an existing resource without replacing it.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "expected an in-place update, got a replacement"
    );
}

/// Assert that the plan changes `path`.
///
/// # Panics
///
/// Panics with the list of changed attributes when `path` is not among them.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(
        paths.contains(&path),
        "expected '{}' to change, changed attributes: {:?}",
        path,
        paths
    );
}

/// Assert that `path` is not among a plan's changes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "expected '{}' to be left alone",
        path
    );
}

/// Assert that no diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Assert that at least one diagnostic is an error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(has_errors(diagnostics), "expected at least one error, got none");
}

/// Assert that some error diagnostic mentions `text` in its summary or detail.
pub fn assert_error_contains(diagnostics: &[Diagnostic], text: &str) {
    let found = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(text) || d.detail.as_deref().is_some_and(|detail| detail.contains(text))
    });
    assert!(
        found,
        "expected an error containing '{}', got {:?}",
        text,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

// =============================================================================
// In-memory Woodpecker server
// =============================================================================

#[derive(Default)]
struct FakeState {
    next_id: i64,
    calls: Vec<&'static str>,
    users: BTreeMap<String, User>,
    global_secrets: BTreeMap<String, Secret>,
    orgs: BTreeMap<String, Org>,
    org_secrets: BTreeMap<(i64, String), Secret>,
    repos: BTreeMap<i64, Repo>,
    secrets: BTreeMap<(i64, String), Secret>,
    crons: BTreeMap<(i64, i64), Cron>,
    registries: BTreeMap<(i64, String), Registry>,
}

impl FakeState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn active_repo(&self, repo_id: i64) -> ClientResult<&Repo> {
        self.repos
            .get(&repo_id)
            .filter(|repo| repo.is_active)
            .ok_or_else(|| ClientError::not_found(format!("repo {} not found", repo_id)))
    }

    fn org(&self, org_id: i64) -> ClientResult<&Org> {
        self.orgs
            .values()
            .find(|org| org.id == org_id)
            .ok_or_else(|| ClientError::not_found(format!("org {} not found", org_id)))
    }
}

fn redacted(secret: &Secret) -> Secret {
    Secret {
        value: String::new(),
        ..secret.clone()
    }
}

fn redacted_registry(registry: &Registry) -> Registry {
    Registry {
        password: String::new(),
        ..registry.clone()
    }
}

fn conflict(what: &str) -> ClientError {
    ClientError::status(409, format!("{} already exists", what))
}

fn apply_secret_update(stored: &mut Secret, update: &Secret) {
    if !update.value.is_empty() {
        stored.value = update.value.clone();
    }
    stored.images = update.images.clone();
    stored.events = update.events.clone();
}

/// An in-memory [`WoodpeckerApi`] for tests.
///
/// Behaves like a Woodpecker 3 server as far as the provider can observe:
/// secret values and registry passwords are never returned, repositories
/// must be activated before they can be looked up, and missing objects
/// produce 404 errors. Every API call is recorded by method name.
///
/// Seeding helpers are not recorded.
pub struct FakeWoodpecker {
    state: Mutex<FakeState>,
}

impl FakeWoodpecker {
    /// Login of the user the fake authenticates as.
    pub const SELF_LOGIN: &'static str = "woodpecker-admin";

    /// Version reported by `/version`.
    pub const VERSION: &'static str = "3.0.0";

    /// A fake server with only the authenticated admin user.
    pub fn new() -> Self {
        let mut state = FakeState::default();
        let id = state.next_id();
        state.users.insert(
            Self::SELF_LOGIN.to_string(),
            User {
                id,
                forge_id: 1,
                login: Self::SELF_LOGIN.to_string(),
                email: format!("{}@example.com", Self::SELF_LOGIN),
                avatar: String::new(),
                active: true,
                admin: true,
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: &'static str) -> MutexGuard<'_, FakeState> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    /// Names of the API methods called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Add a forge repository. Inactive repositories are only visible
    /// through `repo_list_all` until activated.
    pub fn seed_repo(&self, full_name: &str, active: bool) -> Repo {
        let mut state = self.lock();
        let id = state.next_id();
        let (owner, name) = full_name.split_once('/').unwrap_or(("", full_name));
        let repo = Repo {
            id,
            forge_id: 1,
            forge_remote_id: (1000 + id).to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: full_name.to_string(),
            forge_url: format!("https://forge.example.com/{}", full_name),
            clone: format!("https://forge.example.com/{}.git", full_name),
            branch: "main".to_string(),
            timeout: 60,
            is_active: active,
            allow_pull_requests: true,
            config: ".woodpecker.yaml".to_string(),
            ..Default::default()
        };
        state.repos.insert(id, repo.clone());
        repo
    }

    /// Add an organization.
    pub fn seed_org(&self, name: &str) -> Org {
        let mut state = self.lock();
        let org = Org {
            id: state.next_id(),
            forge_id: 1,
            name: name.to_string(),
            is_user: false,
        };
        state.orgs.insert(name.to_string(), org.clone());
        org
    }
}

impl Default for FakeWoodpecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WoodpeckerApi for FakeWoodpecker {
    async fn self_user(&self) -> ClientResult<User> {
        let state = self.record("self_user");
        state
            .users
            .get(Self::SELF_LOGIN)
            .cloned()
            .ok_or_else(|| ClientError::status(401, "unauthorized"))
    }

    async fn version(&self) -> ClientResult<Version> {
        self.record("version");
        Ok(Version {
            source: "https://github.com/woodpecker-ci/woodpecker".to_string(),
            version: Self::VERSION.to_string(),
        })
    }

    async fn user(&self, login: &str) -> ClientResult<User> {
        let state = self.record("user");
        state
            .users
            .get(login)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("user {} not found", login)))
    }

    async fn user_list(&self) -> ClientResult<Vec<User>> {
        let state = self.record("user_list");
        Ok(state.users.values().cloned().collect())
    }

    async fn user_post(&self, user: &User) -> ClientResult<User> {
        let mut state = self.record("user_post");
        if state.users.contains_key(&user.login) {
            return Err(conflict("user"));
        }
        let created = User {
            id: state.next_id(),
            forge_id: 1,
            active: true,
            ..user.clone()
        };
        state.users.insert(created.login.clone(), created.clone());
        Ok(created)
    }

    async fn user_patch(&self, user: &User) -> ClientResult<User> {
        let mut state = self.record("user_patch");
        let stored = state
            .users
            .get_mut(&user.login)
            .ok_or_else(|| ClientError::not_found(format!("user {} not found", user.login)))?;
        if !user.email.is_empty() {
            stored.email = user.email.clone();
        }
        if !user.avatar.is_empty() {
            stored.avatar = user.avatar.clone();
        }
        stored.admin = user.admin;
        Ok(stored.clone())
    }

    async fn user_delete(&self, login: &str) -> ClientResult<()> {
        let mut state = self.record("user_delete");
        state
            .users
            .remove(login)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("user {} not found", login)))
    }

    async fn global_secret(&self, name: &str) -> ClientResult<Secret> {
        let state = self.record("global_secret");
        state
            .global_secrets
            .get(name)
            .map(redacted)
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", name)))
    }

    async fn global_secret_list(&self) -> ClientResult<Vec<Secret>> {
        let state = self.record("global_secret_list");
        Ok(state.global_secrets.values().map(redacted).collect())
    }

    async fn global_secret_create(&self, secret: &Secret) -> ClientResult<Secret> {
        let mut state = self.record("global_secret_create");
        if state.global_secrets.contains_key(&secret.name) {
            return Err(conflict("secret"));
        }
        let created = Secret {
            id: state.next_id(),
            org_id: 0,
            repo_id: 0,
            ..secret.clone()
        };
        state.global_secrets.insert(created.name.clone(), created.clone());
        Ok(redacted(&created))
    }

    async fn global_secret_update(&self, secret: &Secret) -> ClientResult<Secret> {
        let mut state = self.record("global_secret_update");
        let stored = state
            .global_secrets
            .get_mut(&secret.name)
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", secret.name)))?;
        apply_secret_update(stored, secret);
        Ok(redacted(stored))
    }

    async fn global_secret_delete(&self, name: &str) -> ClientResult<()> {
        let mut state = self.record("global_secret_delete");
        state
            .global_secrets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", name)))
    }

    async fn org_lookup(&self, name: &str) -> ClientResult<Org> {
        let state = self.record("org_lookup");
        state
            .orgs
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("org {} not found", name)))
    }

    async fn org_secret(&self, org_id: i64, name: &str) -> ClientResult<Secret> {
        let state = self.record("org_secret");
        state.org(org_id)?;
        state
            .org_secrets
            .get(&(org_id, name.to_string()))
            .map(redacted)
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", name)))
    }

    async fn org_secret_list(&self, org_id: i64) -> ClientResult<Vec<Secret>> {
        let state = self.record("org_secret_list");
        state.org(org_id)?;
        Ok(state
            .org_secrets
            .iter()
            .filter(|((id, _), _)| *id == org_id)
            .map(|(_, secret)| redacted(secret))
            .collect())
    }

    async fn org_secret_create(&self, org_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let mut state = self.record("org_secret_create");
        state.org(org_id)?;
        let key = (org_id, secret.name.clone());
        if state.org_secrets.contains_key(&key) {
            return Err(conflict("secret"));
        }
        let created = Secret {
            id: state.next_id(),
            org_id,
            repo_id: 0,
            ..secret.clone()
        };
        state.org_secrets.insert(key, created.clone());
        Ok(redacted(&created))
    }

    async fn org_secret_update(&self, org_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let mut state = self.record("org_secret_update");
        let stored = state
            .org_secrets
            .get_mut(&(org_id, secret.name.clone()))
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", secret.name)))?;
        apply_secret_update(stored, secret);
        Ok(redacted(stored))
    }

    async fn org_secret_delete(&self, org_id: i64, name: &str) -> ClientResult<()> {
        let mut state = self.record("org_secret_delete");
        state
            .org_secrets
            .remove(&(org_id, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", name)))
    }

    async fn repo_list_all(&self) -> ClientResult<Vec<Repo>> {
        let state = self.record("repo_list_all");
        Ok(state.repos.values().cloned().collect())
    }

    async fn repo_lookup(&self, full_name: &str) -> ClientResult<Repo> {
        let state = self.record("repo_lookup");
        state
            .repos
            .values()
            .find(|repo| repo.is_active && repo.full_name == full_name)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("repo {} not found", full_name)))
    }

    async fn repo_activate(&self, forge_remote_id: &str) -> ClientResult<Repo> {
        let mut state = self.record("repo_activate");
        let repo = state
            .repos
            .values_mut()
            .find(|repo| repo.forge_remote_id == forge_remote_id)
            .ok_or_else(|| {
                ClientError::not_found(format!("forge repo {} not found", forge_remote_id))
            })?;
        if repo.is_active {
            return Err(conflict("repository"));
        }
        repo.is_active = true;
        Ok(repo.clone())
    }

    async fn repo_patch(&self, repo_id: i64, patch: &RepoPatch) -> ClientResult<Repo> {
        let mut state = self.record("repo_patch");
        state.active_repo(repo_id)?;
        let repo = state
            .repos
            .get_mut(&repo_id)
            .ok_or_else(|| ClientError::not_found(format!("repo {} not found", repo_id)))?;
        if let Some(config) = &patch.config {
            repo.config = config.clone();
        }
        if let Some(timeout) = patch.timeout {
            repo.timeout = timeout;
        }
        if let Some(visibility) = patch.visibility {
            repo.visibility = visibility;
        }
        if let Some(trusted) = &patch.trusted {
            if let Some(network) = trusted.network {
                repo.trusted.network = network;
            }
            if let Some(volumes) = trusted.volumes {
                repo.trusted.volumes = volumes;
            }
            if let Some(security) = trusted.security {
                repo.trusted.security = security;
            }
        }
        if let Some(require_approval) = patch.require_approval {
            repo.require_approval = require_approval;
        }
        if let Some(users) = &patch.approval_allowed_users {
            repo.approval_allowed_users = users.clone();
        }
        if let Some(allow) = patch.allow_pull_requests {
            repo.allow_pull_requests = allow;
        }
        if let Some(allow) = patch.allow_deployments {
            repo.allow_deployments = allow;
        }
        if let Some(events) = &patch.cancel_previous_pipeline_events {
            repo.cancel_previous_pipeline_events = events.clone();
        }
        if let Some(plugins) = &patch.netrc_trusted_plugins {
            repo.netrc_trusted_plugins = plugins.clone();
        }
        Ok(repo.clone())
    }

    async fn repo_delete(&self, repo_id: i64) -> ClientResult<()> {
        let mut state = self.record("repo_delete");
        state.active_repo(repo_id)?;
        if let Some(repo) = state.repos.get_mut(&repo_id) {
            repo.is_active = false;
        }
        state.secrets.retain(|(id, _), _| *id != repo_id);
        state.crons.retain(|(id, _), _| *id != repo_id);
        state.registries.retain(|(id, _), _| *id != repo_id);
        Ok(())
    }

    async fn secret(&self, repo_id: i64, name: &str) -> ClientResult<Secret> {
        let state = self.record("secret");
        state.active_repo(repo_id)?;
        state
            .secrets
            .get(&(repo_id, name.to_string()))
            .map(redacted)
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", name)))
    }

    async fn secret_list(&self, repo_id: i64) -> ClientResult<Vec<Secret>> {
        let state = self.record("secret_list");
        state.active_repo(repo_id)?;
        Ok(state
            .secrets
            .iter()
            .filter(|((id, _), _)| *id == repo_id)
            .map(|(_, secret)| redacted(secret))
            .collect())
    }

    async fn secret_create(&self, repo_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let mut state = self.record("secret_create");
        state.active_repo(repo_id)?;
        let key = (repo_id, secret.name.clone());
        if state.secrets.contains_key(&key) {
            return Err(conflict("secret"));
        }
        let created = Secret {
            id: state.next_id(),
            org_id: 0,
            repo_id,
            ..secret.clone()
        };
        state.secrets.insert(key, created.clone());
        Ok(redacted(&created))
    }

    async fn secret_update(&self, repo_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let mut state = self.record("secret_update");
        let stored = state
            .secrets
            .get_mut(&(repo_id, secret.name.clone()))
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", secret.name)))?;
        apply_secret_update(stored, secret);
        Ok(redacted(stored))
    }

    async fn secret_delete(&self, repo_id: i64, name: &str) -> ClientResult<()> {
        let mut state = self.record("secret_delete");
        state
            .secrets
            .remove(&(repo_id, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("secret {} not found", name)))
    }

    async fn cron(&self, repo_id: i64, cron_id: i64) -> ClientResult<Cron> {
        let state = self.record("cron");
        state.active_repo(repo_id)?;
        state
            .crons
            .get(&(repo_id, cron_id))
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("cron {} not found", cron_id)))
    }

    async fn cron_list(&self, repo_id: i64) -> ClientResult<Vec<Cron>> {
        let state = self.record("cron_list");
        state.active_repo(repo_id)?;
        Ok(state
            .crons
            .iter()
            .filter(|((id, _), _)| *id == repo_id)
            .map(|(_, cron)| cron.clone())
            .collect())
    }

    async fn cron_create(&self, repo_id: i64, cron: &Cron) -> ClientResult<Cron> {
        let mut state = self.record("cron_create");
        state.active_repo(repo_id)?;
        let id = state.next_id();
        let creator_id = state
            .users
            .get(Self::SELF_LOGIN)
            .map(|user| user.id)
            .unwrap_or_default();
        let created = Cron {
            id,
            repo_id,
            creator_id,
            created: 1_700_000_000 + id,
            ..cron.clone()
        };
        state.crons.insert((repo_id, id), created.clone());
        Ok(created)
    }

    async fn cron_update(&self, repo_id: i64, cron: &Cron) -> ClientResult<Cron> {
        let mut state = self.record("cron_update");
        let stored = state
            .crons
            .get_mut(&(repo_id, cron.id))
            .ok_or_else(|| ClientError::not_found(format!("cron {} not found", cron.id)))?;
        if !cron.name.is_empty() {
            stored.name = cron.name.clone();
        }
        if !cron.schedule.is_empty() {
            stored.schedule = cron.schedule.clone();
        }
        stored.branch = cron.branch.clone();
        Ok(stored.clone())
    }

    async fn cron_delete(&self, repo_id: i64, cron_id: i64) -> ClientResult<()> {
        let mut state = self.record("cron_delete");
        state
            .crons
            .remove(&(repo_id, cron_id))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("cron {} not found", cron_id)))
    }

    async fn registry(&self, repo_id: i64, address: &str) -> ClientResult<Registry> {
        let state = self.record("registry");
        state.active_repo(repo_id)?;
        state
            .registries
            .get(&(repo_id, address.to_string()))
            .map(redacted_registry)
            .ok_or_else(|| ClientError::not_found(format!("registry {} not found", address)))
    }

    async fn registry_list(&self, repo_id: i64) -> ClientResult<Vec<Registry>> {
        let state = self.record("registry_list");
        state.active_repo(repo_id)?;
        Ok(state
            .registries
            .iter()
            .filter(|((id, _), _)| *id == repo_id)
            .map(|(_, registry)| redacted_registry(registry))
            .collect())
    }

    async fn registry_create(&self, repo_id: i64, registry: &Registry) -> ClientResult<Registry> {
        let mut state = self.record("registry_create");
        state.active_repo(repo_id)?;
        let key = (repo_id, registry.address.clone());
        if state.registries.contains_key(&key) {
            return Err(conflict("registry"));
        }
        let created = Registry {
            id: state.next_id(),
            repo_id,
            ..registry.clone()
        };
        state.registries.insert(key, created.clone());
        // The server does not echo the assigned id on create.
        Ok(Registry {
            id: 0,
            ..redacted_registry(&created)
        })
    }

    async fn registry_update(&self, repo_id: i64, registry: &Registry) -> ClientResult<Registry> {
        let mut state = self.record("registry_update");
        let stored = state
            .registries
            .get_mut(&(repo_id, registry.address.clone()))
            .ok_or_else(|| {
                ClientError::not_found(format!("registry {} not found", registry.address))
            })?;
        stored.username = registry.username.clone();
        if !registry.password.is_empty() {
            stored.password = registry.password.clone();
        }
        stored.email = registry.email.clone();
        Ok(redacted_registry(stored))
    }

    async fn registry_delete(&self, repo_id: i64, address: &str) -> ClientResult<()> {
        let mut state = self.record("registry_delete");
        state
            .registries
            .remove(&(repo_id, address.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(format!("registry {} not found", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TrustedConfigurationPatch;
    use crate::provider::WoodpeckerProvider;
    use serde_json::json;
    use std::sync::Arc;

    fn tester() -> (Arc<FakeWoodpecker>, ProviderTester<WoodpeckerProvider>) {
        let api = Arc::new(FakeWoodpecker::new());
        let provider = WoodpeckerProvider::with_client(api.clone());
        (api, ProviderTester::new(provider))
    }

    #[tokio::test]
    async fn test_fake_authenticates_as_admin() {
        let api = FakeWoodpecker::new();
        let user = api.self_user().await.unwrap();
        assert_eq!(user.login, FakeWoodpecker::SELF_LOGIN);
        assert!(user.admin);
        assert_eq!(api.version().await.unwrap().version, FakeWoodpecker::VERSION);
        assert_eq!(api.calls(), vec!["self_user", "version"]);
    }

    #[test]
    fn test_fake_seeding_is_not_recorded() {
        let api = FakeWoodpecker::new();
        let org = api.seed_org("octo");
        let repo = api.seed_repo("octo/hello", true);
        assert_ne!(org.id, repo.id);
        assert_eq!(repo.owner, "octo");
        assert!(api.calls().is_empty());

        let found = tokio_test::assert_ok!(tokio_test::block_on(api.org_lookup("octo")));
        assert_eq!(found, org);
        assert_eq!(api.calls(), vec!["org_lookup"]);
    }

    #[tokio::test]
    async fn test_fake_never_returns_secret_values() {
        let api = FakeWoodpecker::new();
        let created = api
            .global_secret_create(&Secret {
                name: "token".into(),
                value: "hunter2".into(),
                events: vec!["push".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(created.id > 0);
        assert!(created.value.is_empty());
        assert!(api.global_secret("token").await.unwrap().value.is_empty());

        let err = api
            .global_secret_create(&Secret {
                name: "token".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_fake_repo_activation() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", false);
        assert!(api.calls().is_empty());

        assert!(api.repo_lookup("octo/hello").await.unwrap_err().is_not_found());
        assert_eq!(api.repo_list_all().await.unwrap().len(), 1);

        let active = api.repo_activate(&repo.forge_remote_id).await.unwrap();
        assert!(active.is_active);
        assert_eq!(api.repo_lookup("octo/hello").await.unwrap().id, repo.id);

        api.repo_delete(repo.id).await.unwrap();
        assert!(api.repo_lookup("octo/hello").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_fake_repo_patch_applies_set_fields_only() {
        let api = FakeWoodpecker::new();
        let repo = api.seed_repo("octo/hello", true);

        let patched = api
            .repo_patch(
                repo.id,
                &RepoPatch {
                    timeout: Some(15),
                    trusted: Some(TrustedConfigurationPatch {
                        volumes: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(patched.timeout, 15);
        assert!(patched.trusted.volumes);
        assert!(!patched.trusted.network);
        assert_eq!(patched.config, repo.config);
        assert_eq!(patched.allow_pull_requests, repo.allow_pull_requests);
    }

    #[tokio::test]
    async fn test_fake_scopes_children_by_repo() {
        let api = FakeWoodpecker::new();
        let first = api.seed_repo("octo/one", true);
        let second = api.seed_repo("octo/two", true);
        let cron = Cron {
            name: "nightly".into(),
            schedule: "@daily".into(),
            ..Default::default()
        };

        let created = api.cron_create(first.id, &cron).await.unwrap();
        assert!(created.created > 0);
        assert_eq!(created.repo_id, first.id);
        assert!(api.cron_list(second.id).await.unwrap().is_empty());
        assert!(api.cron(second.id, created.id).await.unwrap_err().is_not_found());
        assert!(api.cron_delete(second.id, created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_tester_crud_lifecycle() {
        let (api, tester) = tester();
        let repo = api.seed_repo("octo/hello", true);

        let final_state = tester
            .lifecycle_crud(
                "woodpecker_repository_cron",
                json!({"repository_id": repo.id, "name": "nightly", "schedule": "@daily"}),
                json!({"repository_id": repo.id, "name": "nightly", "schedule": "@hourly"}),
            )
            .await
            .unwrap();

        assert_eq!(final_state["schedule"], "@hourly");
        assert!(api.cron_list(repo.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tester_plan_assertions() {
        let (api, tester) = tester();
        let repo = api.seed_repo("octo/hello", true);
        let state = tester
            .lifecycle_create(
                "woodpecker_repository_cron",
                json!({"repository_id": repo.id, "name": "nightly", "schedule": "@daily"}),
            )
            .await
            .unwrap();

        let unchanged = tester
            .plan_update("woodpecker_repository_cron", state.clone(), state.clone())
            .await
            .unwrap();
        assert_plan_no_changes(&unchanged);

        let mut proposed = state.clone();
        proposed["schedule"] = json!("@weekly");
        let plan = tester
            .plan_update("woodpecker_repository_cron", state.clone(), proposed)
            .await
            .unwrap();
        assert_plan_has_changes(&plan);
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "schedule");
        assert_plan_does_not_change_attribute(&plan, "name");

        let destroy = tester
            .plan_delete("woodpecker_repository_cron", state)
            .await
            .unwrap();
        assert!(destroy.is_destroy());
    }

    #[tokio::test]
    async fn test_tester_surfaces_validation_errors() {
        let (_, tester) = tester();

        let err = tester
            .validate_resource_config("woodpecker_repository", json!({"visibility": "secret"}))
            .await
            .unwrap_err();
        match &err {
            TestError::Diagnostics(diagnostics) => {
                assert_has_errors(diagnostics);
                assert!(err.to_string().contains("operation failed with"));
            }
            other => panic!("unexpected error: {}", other),
        }

        tester
            .validate_resource_config("woodpecker_user", json!({"login": "alice"}))
            .await
            .unwrap();
    }

    #[test]
    fn test_diagnostic_assertions() {
        let diagnostics = vec![
            Diagnostic::warning("Deprecated attribute"),
            Diagnostic::error("Couldn't get user").with_detail("client error 404: not found"),
        ];
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "Couldn't get user");
        assert_error_contains(&diagnostics, "404");
        assert_no_errors(&diagnostics[..1]);
    }

    #[test]
    #[should_panic(expected = "expected an error containing")]
    fn test_assert_error_contains_ignores_warnings() {
        assert_error_contains(&[Diagnostic::warning("Deprecated attribute")], "Deprecated");
    }
}
