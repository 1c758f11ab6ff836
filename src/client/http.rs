//! reqwest-backed implementation of [`WoodpeckerApi`].

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::{
    ClientError, ClientResult, Cron, Org, Registry, Repo, RepoPatch, Secret, User, Version,
    WoodpeckerApi,
};

/// HTTP client for a single Woodpecker server.
///
/// Every request carries the token as a bearer credential. Paths are built
/// from segments so names containing reserved characters are escaped.
#[derive(Clone)]
pub struct HttpClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a client for `server` (e.g. `https://ci.example.com`).
    pub fn new(server: &str, token: impl Into<String>) -> ClientResult<Self> {
        let http = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Self::with_http_client(http, server, token)
    }

    /// Create a client reusing an existing reqwest [`Client`].
    pub fn with_http_client(
        http: Client,
        server: &str,
        token: impl Into<String>,
    ) -> ClientResult<Self> {
        let base_url = Url::parse(server.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn api(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut all = Vec::with_capacity(segments.len() + 1);
        all.push("api");
        all.extend_from_slice(segments);
        self.url(&all)
    }

    async fn execute(&self, request: RequestBuilder) -> ClientResult<String> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Woodpecker API returned an error");
            return Err(ClientError::status(status.as_u16(), body.trim()));
        }
        Ok(body)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
        debug!(%url, "GET");
        let body = self.execute(self.http.get(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send<B, T>(&self, method: Method, url: Url, payload: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!(%method, %url, "sending request");
        let body = self
            .execute(self.http.request(method, url).json(payload))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn delete(&self, url: Url) -> ClientResult<()> {
        debug!(%url, "DELETE");
        self.execute(self.http.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl WoodpeckerApi for HttpClient {
    async fn self_user(&self) -> ClientResult<User> {
        self.get(self.api(&["user"])?).await
    }

    async fn version(&self) -> ClientResult<Version> {
        self.get(self.url(&["version"])?).await
    }

    async fn user(&self, login: &str) -> ClientResult<User> {
        self.get(self.api(&["users", login])?).await
    }

    async fn user_list(&self) -> ClientResult<Vec<User>> {
        self.get(self.api(&["users"])?).await
    }

    async fn user_post(&self, user: &User) -> ClientResult<User> {
        self.send(Method::POST, self.api(&["users"])?, user).await
    }

    async fn user_patch(&self, user: &User) -> ClientResult<User> {
        self.send(Method::PATCH, self.api(&["users", &user.login])?, user)
            .await
    }

    async fn user_delete(&self, login: &str) -> ClientResult<()> {
        self.delete(self.api(&["users", login])?).await
    }

    async fn global_secret(&self, name: &str) -> ClientResult<Secret> {
        self.get(self.api(&["secrets", name])?).await
    }

    async fn global_secret_list(&self) -> ClientResult<Vec<Secret>> {
        self.get(self.api(&["secrets"])?).await
    }

    async fn global_secret_create(&self, secret: &Secret) -> ClientResult<Secret> {
        self.send(Method::POST, self.api(&["secrets"])?, secret).await
    }

    async fn global_secret_update(&self, secret: &Secret) -> ClientResult<Secret> {
        self.send(Method::PATCH, self.api(&["secrets", &secret.name])?, secret)
            .await
    }

    async fn global_secret_delete(&self, name: &str) -> ClientResult<()> {
        self.delete(self.api(&["secrets", name])?).await
    }

    async fn org_lookup(&self, name: &str) -> ClientResult<Org> {
        let mut segments = vec!["orgs", "lookup"];
        segments.extend(name.split('/'));
        self.get(self.api(&segments)?).await
    }

    async fn org_secret(&self, org_id: i64, name: &str) -> ClientResult<Secret> {
        let org_id = org_id.to_string();
        self.get(self.api(&["orgs", &org_id, "secrets", name])?)
            .await
    }

    async fn org_secret_list(&self, org_id: i64) -> ClientResult<Vec<Secret>> {
        let org_id = org_id.to_string();
        self.get(self.api(&["orgs", &org_id, "secrets"])?).await
    }

    async fn org_secret_create(&self, org_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let org_id = org_id.to_string();
        self.send(
            Method::POST,
            self.api(&["orgs", &org_id, "secrets"])?,
            secret,
        )
        .await
    }

    async fn org_secret_update(&self, org_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let org_id = org_id.to_string();
        self.send(
            Method::PATCH,
            self.api(&["orgs", &org_id, "secrets", &secret.name])?,
            secret,
        )
        .await
    }

    async fn org_secret_delete(&self, org_id: i64, name: &str) -> ClientResult<()> {
        let org_id = org_id.to_string();
        self.delete(self.api(&["orgs", &org_id, "secrets", name])?)
            .await
    }

    async fn repo_list_all(&self) -> ClientResult<Vec<Repo>> {
        let mut url = self.api(&["user", "repos"])?;
        url.query_pairs_mut().append_pair("all", "true");
        self.get(url).await
    }

    async fn repo_lookup(&self, full_name: &str) -> ClientResult<Repo> {
        let mut segments = vec!["repos", "lookup"];
        segments.extend(full_name.split('/'));
        self.get(self.api(&segments)?).await
    }

    async fn repo_activate(&self, forge_remote_id: &str) -> ClientResult<Repo> {
        let mut url = self.api(&["repos"])?;
        url.query_pairs_mut()
            .append_pair("forge_remote_id", forge_remote_id);
        debug!(%url, "POST");
        let body = self.execute(self.http.post(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn repo_patch(&self, repo_id: i64, patch: &RepoPatch) -> ClientResult<Repo> {
        let repo_id = repo_id.to_string();
        self.send(Method::PATCH, self.api(&["repos", &repo_id])?, patch)
            .await
    }

    async fn repo_delete(&self, repo_id: i64) -> ClientResult<()> {
        let repo_id = repo_id.to_string();
        self.delete(self.api(&["repos", &repo_id])?).await
    }

    async fn secret(&self, repo_id: i64, name: &str) -> ClientResult<Secret> {
        let repo_id = repo_id.to_string();
        self.get(self.api(&["repos", &repo_id, "secrets", name])?)
            .await
    }

    async fn secret_list(&self, repo_id: i64) -> ClientResult<Vec<Secret>> {
        let repo_id = repo_id.to_string();
        self.get(self.api(&["repos", &repo_id, "secrets"])?).await
    }

    async fn secret_create(&self, repo_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let repo_id = repo_id.to_string();
        self.send(
            Method::POST,
            self.api(&["repos", &repo_id, "secrets"])?,
            secret,
        )
        .await
    }

    async fn secret_update(&self, repo_id: i64, secret: &Secret) -> ClientResult<Secret> {
        let repo_id = repo_id.to_string();
        self.send(
            Method::PATCH,
            self.api(&["repos", &repo_id, "secrets", &secret.name])?,
            secret,
        )
        .await
    }

    async fn secret_delete(&self, repo_id: i64, name: &str) -> ClientResult<()> {
        let repo_id = repo_id.to_string();
        self.delete(self.api(&["repos", &repo_id, "secrets", name])?)
            .await
    }

    async fn cron(&self, repo_id: i64, cron_id: i64) -> ClientResult<Cron> {
        let (repo_id, cron_id) = (repo_id.to_string(), cron_id.to_string());
        self.get(self.api(&["repos", &repo_id, "cron", &cron_id])?)
            .await
    }

    async fn cron_list(&self, repo_id: i64) -> ClientResult<Vec<Cron>> {
        let repo_id = repo_id.to_string();
        self.get(self.api(&["repos", &repo_id, "cron"])?).await
    }

    async fn cron_create(&self, repo_id: i64, cron: &Cron) -> ClientResult<Cron> {
        let repo_id = repo_id.to_string();
        self.send(Method::POST, self.api(&["repos", &repo_id, "cron"])?, cron)
            .await
    }

    async fn cron_update(&self, repo_id: i64, cron: &Cron) -> ClientResult<Cron> {
        let (repo_id, cron_id) = (repo_id.to_string(), cron.id.to_string());
        self.send(
            Method::PATCH,
            self.api(&["repos", &repo_id, "cron", &cron_id])?,
            cron,
        )
        .await
    }

    async fn cron_delete(&self, repo_id: i64, cron_id: i64) -> ClientResult<()> {
        let (repo_id, cron_id) = (repo_id.to_string(), cron_id.to_string());
        self.delete(self.api(&["repos", &repo_id, "cron", &cron_id])?)
            .await
    }

    async fn registry(&self, repo_id: i64, address: &str) -> ClientResult<Registry> {
        let repo_id = repo_id.to_string();
        self.get(self.api(&["repos", &repo_id, "registries", address])?)
            .await
    }

    async fn registry_list(&self, repo_id: i64) -> ClientResult<Vec<Registry>> {
        let repo_id = repo_id.to_string();
        self.get(self.api(&["repos", &repo_id, "registries"])?)
            .await
    }

    async fn registry_create(&self, repo_id: i64, registry: &Registry) -> ClientResult<Registry> {
        let repo_id = repo_id.to_string();
        self.send(
            Method::POST,
            self.api(&["repos", &repo_id, "registries"])?,
            registry,
        )
        .await
    }

    async fn registry_update(&self, repo_id: i64, registry: &Registry) -> ClientResult<Registry> {
        let repo_id = repo_id.to_string();
        self.send(
            Method::PATCH,
            self.api(&["repos", &repo_id, "registries", &registry.address])?,
            registry,
        )
        .await
    }

    async fn registry_delete(&self, repo_id: i64, address: &str) -> ClientResult<()> {
        let repo_id = repo_id.to_string();
        self.delete(self.api(&["repos", &repo_id, "registries", address])?)
            .await
    }
}
