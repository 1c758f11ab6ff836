//! The Woodpecker provider root.
//!
//! [`WoodpeckerProvider`] owns the resource and data source registries and
//! the API client created by `Configure`. Every other operation is
//! dispatched by type name to the matching handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::{HttpClient, WoodpeckerApi};
use crate::config::{provider_config_schema, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::plan;
use crate::resources::{self, Resource};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::{validate, validate_changes, validate_result};

/// Lowest server version the provider works with.
pub const MINIMUM_SERVER_VERSION: &str = ">= 3.0.0";

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Provider for a Woodpecker CI server.
pub struct WoodpeckerProvider {
    client: RwLock<Option<Arc<dyn WoodpeckerApi>>>,
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    env: Arc<EnvLookup>,
}

impl Default for WoodpeckerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WoodpeckerProvider {
    /// An unconfigured provider reading fallbacks from the process environment.
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            env: Arc::new(|var: &str| std::env::var(var).ok()),
        }
    }

    /// A provider that is already configured with `client`.
    pub fn with_client(client: Arc<dyn WoodpeckerApi>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            ..Self::new()
        }
    }

    /// Replace the environment lookup used for configuration fallbacks.
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    /// Whether `Configure` has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<dyn WoodpeckerApi>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "the provider has not been configured; Configure must succeed before resources or data sources are used"
                    .to_string(),
            )
        })
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Check the server identity and version, returning diagnostics on failure.
    async fn verify_server(api: &dyn WoodpeckerApi) -> Vec<Diagnostic> {
        let user = match api.self_user().await {
            Ok(user) => user,
            Err(e) => {
                return vec![Diagnostic::error("Couldn't get current user").with_detail(e.to_string())]
            },
        };
        debug!(login = %user.login, "authenticated");

        let version = match api.version().await {
            Ok(version) => version,
            Err(e) => {
                return vec![
                    Diagnostic::error("Couldn't get woodpecker version").with_detail(e.to_string())
                ]
            },
        };

        match check_version(&version.version) {
            Ok(()) => {
                info!(login = %user.login, version = %version.version, "connected to woodpecker");
                Vec::new()
            },
            Err(diagnostic) => vec![diagnostic],
        }
    }
}

/// Check a server version string against [`MINIMUM_SERVER_VERSION`].
///
/// Build suffixes such as `3.1.0-f05c1631d2` are ignored.
pub fn check_version(version: &str) -> Result<(), Diagnostic> {
    let requirement = semver::VersionReq::parse(MINIMUM_SERVER_VERSION).map_err(|e| {
        Diagnostic::error("Couldn't parse woodpecker version constraint").with_detail(format!(
            "{}. Please report this issue to the provider developers.",
            e
        ))
    })?;

    let release = version.split('-').next().unwrap_or_default();
    let parsed = semver::Version::parse(release.trim_start_matches('v')).map_err(|e| {
        Diagnostic::error("Couldn't parse woodpecker version").with_detail(format!(
            "{}. Please report this issue to the provider developers.",
            e
        ))
    })?;

    if requirement.matches(&parsed) {
        Ok(())
    } else {
        Err(
            Diagnostic::error("Woodpecker version doesn't satisfy the constraint").with_detail(
                format!(
                    "Current woodpecker version: {}, expected: {}. Consider using an older version \
                     of the provider or update your Woodpecker CI instance.",
                    version, MINIMUM_SERVER_VERSION
                ),
            ),
        )
    }
}

#[async_trait::async_trait]
impl ProviderService for WoodpeckerProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(provider_config_schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_config_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_config_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resolved = match ProviderConfig::from_value(&config)?.resolve(|var| (self.env)(var)) {
            Ok(resolved) => resolved,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let client = match HttpClient::new(&resolved.server, resolved.token) {
            Ok(client) => client,
            Err(e) => {
                return Ok(vec![Diagnostic::error("Invalid Server URL")
                    .with_detail(e.to_string())
                    .with_attribute("server")])
            },
        };

        let diagnostics = Self::verify_server(&client).await;
        if has_errors(&diagnostics) {
            warn!(server = %resolved.server, "provider configuration failed");
            return Ok(diagnostics);
        }

        *self.client.write().await = Some(Arc::new(client));
        info!(server = %resolved.server, "provider configured");
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("provider stopping");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(validate(&resource.schema(), &config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource(resource_type)?.upgrade_state(version, state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let prior_state = prior_state.filter(|v| !v.is_null());
        plan::plan(
            &resource.schema(),
            prior_state.as_ref(),
            &proposed_state,
            &config,
        )
        .map_err(ProviderError::Invalid)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        validate_result(&resource.schema(), &planned_state).map_err(ProviderError::Invalid)?;
        let api = self.client().await?;
        resource.create(api.as_ref(), &planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.client().await?;
        resource.read(api.as_ref(), &current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let diagnostics = validate_changes(&resource.schema(), &prior_state, &planned_state);
        if !diagnostics.is_empty() {
            return Err(ProviderError::Invalid(diagnostics));
        }
        let api = self.client().await?;
        resource.update(api.as_ref(), &prior_state, &planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let api = self.client().await?;
        resource.delete(api.as_ref(), &current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.resource(resource_type)?.import_state(id)?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        validate_result(&data_source.schema(), &config).map_err(ProviderError::Invalid)?;
        let api = self.client().await?;
        data_source.read(api.as_ref(), &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RepoPatch;
    use crate::testing::{
        assert_error_contains, assert_plan_creates, assert_plan_replaces,
        assert_plan_updates_in_place, FakeWoodpecker, ProviderTester, TestError,
    };
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tester(api: &Arc<FakeWoodpecker>) -> ProviderTester<WoodpeckerProvider> {
        ProviderTester::new(WoodpeckerProvider::with_client(api.clone()))
    }

    async fn mock_server(version: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "login": "admin", "admin": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "source": "https://github.com/woodpecker-ci/woodpecker",
                "version": version
            })))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_check_version() {
        assert!(check_version("3.0.0").is_ok());
        assert!(check_version("3.4.1-f05c1631d2").is_ok());
        assert!(check_version("v3.1.0").is_ok());

        let too_old = check_version("2.8.3").unwrap_err();
        assert_eq!(too_old.summary, "Woodpecker version doesn't satisfy the constraint");
        assert!(too_old.detail.unwrap().contains("2.8.3"));

        let garbage = check_version("next").unwrap_err();
        assert_eq!(garbage.summary, "Couldn't parse woodpecker version");
    }

    #[tokio::test]
    async fn test_configure_against_server() {
        let server = mock_server("3.2.0").await;
        let provider = WoodpeckerProvider::new().with_env(|_| None);
        let tester = ProviderTester::new(provider);

        tester
            .configure(json!({"server": server.uri(), "token": "t0ken"}))
            .await
            .unwrap();
        assert!(tester.provider().is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_from_env() {
        let server = mock_server("3.0.0").await;
        let uri = server.uri();
        let provider = WoodpeckerProvider::new().with_env(move |var| match var {
            "WOODPECKER_SERVER" => Some(uri.clone()),
            "WOODPECKER_TOKEN" => Some("t0ken".to_string()),
            _ => None,
        });
        let tester = ProviderTester::new(provider);

        tester.configure(json!({"server": null, "token": null})).await.unwrap();
        assert!(tester.provider().is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_rejects_old_server() {
        let server = mock_server("2.7.0").await;
        let tester = ProviderTester::new(WoodpeckerProvider::new().with_env(|_| None));

        let err = tester
            .configure(json!({"server": server.uri(), "token": "t0ken"}))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_error_contains(&diagnostics, "doesn't satisfy the constraint")
            },
            other => panic!("unexpected error: {}", other),
        }
        assert!(!tester.provider().is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;
        let tester = ProviderTester::new(WoodpeckerProvider::new().with_env(|_| None));

        let err = tester
            .configure(json!({"server": server.uri(), "token": "wrong"}))
            .await
            .unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => {
                assert_eq!(diagnostics[0].summary, "Couldn't get current user");
            },
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_configure_missing_values() {
        let tester = ProviderTester::new(WoodpeckerProvider::new().with_env(|_| None));
        let err = tester.configure(json!({})).await.unwrap_err();
        match err {
            TestError::Diagnostics(diagnostics) => assert_eq!(diagnostics.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_operations() {
        let tester = ProviderTester::new(WoodpeckerProvider::new().with_env(|_| None));
        let err = tester
            .read("woodpecker_user", json!({"login": "octocat"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_schema_lists_every_type() {
        let tester = ProviderTester::new(WoodpeckerProvider::new());
        assert_eq!(tester.resource_types().len(), 7);
        assert_eq!(tester.data_source_types().len(), 8);
        assert!(tester.schema().provider.attribute("token").unwrap().flags.sensitive);
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let api = Arc::new(FakeWoodpecker::new());
        let err = tester(&api)
            .create("woodpecker_pipeline", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let api = Arc::new(FakeWoodpecker::new());
        let repo = api.seed_repo("octo/hello", true);
        let tester = tester(&api);

        let config = json!({
            "repository_id": repo.id,
            "name": "deploy_key",
            "value": "hunter2",
            "images": ["alpine"],
            "events": ["push", "cron"]
        });
        let plan = tester
            .plan_create("woodpecker_repository_secret", config.clone())
            .await
            .unwrap();
        assert_plan_creates(&plan);

        let created = tester
            .create("woodpecker_repository_secret", plan.planned_state)
            .await
            .unwrap();
        let read = tester
            .read("woodpecker_repository_secret", created.clone())
            .await
            .unwrap();

        assert_eq!(read, created);
        for key in ["repository_id", "name", "value", "images"] {
            assert_eq!(read[key], config[key], "{}", key);
        }
        assert_eq!(read["events"], json!(["cron", "push"]));
    }

    #[tokio::test]
    async fn test_import_then_refresh_reproduces_state() {
        let api = Arc::new(FakeWoodpecker::new());
        let repo = api.seed_repo("octo/hello", true);
        let tester = tester(&api);

        let applied = tester
            .lifecycle_create(
                "woodpecker_repository_registry",
                json!({
                    "repository_id": repo.id,
                    "address": "ghcr.io",
                    "username": "bot",
                    "password": "pw"
                }),
            )
            .await
            .unwrap();

        let imported = tester
            .import_resource(
                "woodpecker_repository_registry",
                &format!("{}/ghcr.io", repo.id),
            )
            .await
            .unwrap();
        assert_eq!(imported.len(), 1);

        let mut refreshed = tester
            .read("woodpecker_repository_registry", imported[0].state.clone())
            .await
            .unwrap();
        // The password is write-only and cannot be recovered by import.
        refreshed["password"] = applied["password"].clone();
        assert_eq!(refreshed, applied);
    }

    #[tokio::test]
    async fn test_invalid_enum_fails_before_network() {
        let api = Arc::new(FakeWoodpecker::new());
        let tester = tester(&api);

        let err = tester
            .plan_create(
                "woodpecker_secret",
                json!({"name": "token", "value": "v", "events": ["push", "commit"]}),
            )
            .await
            .unwrap_err();
        let diagnostics = err.to_diagnostics();
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("events.1"));

        let err = tester
            .create(
                "woodpecker_repository",
                json!({"full_name": "octo/hello", "visibility": "secret"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Invalid(_)));

        let err = tester
            .read_data_source("woodpecker_repository_cron", json!({"repository_id": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Invalid(_)));

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_changing_immutable_attribute_replaces() {
        let api = Arc::new(FakeWoodpecker::new());
        let tester = tester(&api);

        let created = tester
            .lifecycle_create("woodpecker_user", json!({"login": "alice"}))
            .await
            .unwrap();

        let mut renamed = created.clone();
        renamed["login"] = json!("bob");
        let plan = tester
            .plan_update("woodpecker_user", created.clone(), renamed)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert!(plan.planned_state["id"].is_null());

        let mut promoted = created.clone();
        promoted["is_admin"] = json!(true);
        let plan = tester
            .plan_update("woodpecker_user", created, promoted)
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
    }

    #[tokio::test]
    async fn test_delete_removes_from_listing() {
        let api = Arc::new(FakeWoodpecker::new());
        let repo = api.seed_repo("octo/hello", true);
        let tester = tester(&api);

        let cron = tester
            .lifecycle_create(
                "woodpecker_repository_cron",
                json!({"repository_id": repo.id, "name": "nightly", "schedule": "@daily"}),
            )
            .await
            .unwrap();
        assert_eq!(api.cron_list(repo.id).await.unwrap().len(), 1);

        tester
            .lifecycle_delete("woodpecker_repository_cron", cron)
            .await
            .unwrap();
        assert!(api.cron_list(repo.id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_creates_under_one_owner() {
        let api = Arc::new(FakeWoodpecker::new());
        let alpha = api.seed_repo("octo/alpha", false);
        let beta = api.seed_repo("octo/beta", false);
        let tester = Arc::new(tester(&api));

        let spawn_create = |config: Value| {
            let tester = tester.clone();
            tokio::spawn(async move { tester.create("woodpecker_repository", config).await })
        };
        let first = spawn_create(json!({"full_name": "octo/alpha", "timeout": 30}));
        let second = spawn_create(json!({"full_name": "octo/beta", "timeout": 45}));
        let (a, b) = (first.await.unwrap().unwrap(), second.await.unwrap().unwrap());

        assert_eq!(a["id"], alpha.id);
        assert_eq!(b["id"], beta.id);
        assert_eq!(a["timeout"], 30);
        assert_eq!(b["timeout"], 45);
        for state in [&a, &b] {
            assert_eq!(state["owner"], "octo");
            assert_eq!(state["is_active"], true);
        }

        assert_eq!(api.repo_lookup("octo/alpha").await.unwrap().timeout, 30);
        assert_eq!(api.repo_lookup("octo/beta").await.unwrap().timeout, 45);
        let calls = api.calls();
        assert_eq!(calls.iter().filter(|c| **c == "repo_activate").count(), 2);
        assert_eq!(calls.iter().filter(|c| **c == "repo_patch").count(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_server_values_outside_validators() {
        let api = Arc::new(FakeWoodpecker::new());
        let repo = api.seed_repo("octo/hello", true);
        api.repo_patch(repo.id, &RepoPatch { timeout: Some(0), ..Default::default() })
            .await
            .unwrap();
        let tester = tester(&api);

        let prior = tester
            .read("woodpecker_repository", json!({"full_name": "octo/hello"}))
            .await
            .unwrap();
        assert_eq!(prior["timeout"], 0);

        let plan = tester
            .plan(
                "woodpecker_repository",
                Some(prior.clone()),
                json!({"full_name": "octo/hello", "allow_deployments": true}),
                json!({"full_name": "octo/hello", "allow_deployments": true}),
            )
            .await
            .unwrap();
        assert_eq!(plan.planned_state["timeout"], 0);

        let updated = tester
            .update("woodpecker_repository", prior, plan.planned_state)
            .await
            .unwrap();
        assert_eq!(updated["allow_deployments"], true);
        assert_eq!(updated["timeout"], 0);
    }

    #[tokio::test]
    async fn test_update_rejects_changed_invalid_value() {
        let api = Arc::new(FakeWoodpecker::new());
        api.seed_repo("octo/hello", true);
        let tester = tester(&api);
        let prior = tester
            .read("woodpecker_repository", json!({"full_name": "octo/hello"}))
            .await
            .unwrap();
        let calls_before = api.calls().len();

        let mut planned = prior.clone();
        planned["timeout"] = json!(0);
        let err = tester
            .update("woodpecker_repository", prior, planned)
            .await
            .unwrap_err();
        assert_eq!(err.to_diagnostics()[0].attribute.as_deref(), Some("timeout"));
        assert_eq!(api.calls().len(), calls_before);
    }

    async fn import_and_refresh(
        tester: &ProviderTester<WoodpeckerProvider>,
        resource_type: &str,
        id: &str,
    ) -> Value {
        let imported = tester.import_resource(resource_type, id).await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, resource_type);
        tester
            .read(resource_type, imported[0].state.clone())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_import_then_refresh_user() {
        let api = Arc::new(FakeWoodpecker::new());
        let tester = tester(&api);
        let applied = tester
            .lifecycle_create(
                "woodpecker_user",
                json!({"login": "alice", "email": "alice@example.com", "is_admin": true}),
            )
            .await
            .unwrap();

        let refreshed = import_and_refresh(&tester, "woodpecker_user", "alice").await;
        assert_eq!(refreshed, applied);
    }

    #[tokio::test]
    async fn test_import_then_refresh_secrets() {
        let api = Arc::new(FakeWoodpecker::new());
        let org = api.seed_org("octo");
        let repo = api.seed_repo("octo/hello", true);
        let tester = tester(&api);

        let cases = [
            (
                "woodpecker_secret",
                json!({"name": "token", "value": "g", "images": ["alpine"], "events": ["push"]}),
                "token".to_string(),
            ),
            (
                "woodpecker_org_secret",
                json!({"org_id": org.id, "name": "npm", "value": "o", "events": ["tag", "push"]}),
                format!("{}/npm", org.id),
            ),
            (
                "woodpecker_repository_secret",
                json!({"repository_id": repo.id, "name": "deploy", "value": "r", "events": ["cron"]}),
                format!("{}/deploy", repo.id),
            ),
        ];

        for (resource_type, config, import_id) in cases {
            let applied = tester.lifecycle_create(resource_type, config).await.unwrap();
            let mut refreshed = import_and_refresh(&tester, resource_type, &import_id).await;
            // The value is write-only and cannot be recovered by import.
            assert!(refreshed.get("value").is_none(), "{}", resource_type);
            refreshed["value"] = applied["value"].clone();
            assert_eq!(refreshed, applied, "{}", resource_type);
        }
    }

    #[tokio::test]
    async fn test_upgrade_secret_state() {
        let api = Arc::new(FakeWoodpecker::new());
        let upgraded = tester(&api)
            .upgrade_resource_state(
                "woodpecker_org_secret",
                0,
                json!({"id": 1, "org_id": 2, "name": "n", "value": "v", "images": [], "plugins_only": false, "events": ["push"]}),
            )
            .await
            .unwrap();
        assert!(upgraded.get("plugins_only").is_none());
    }
}
