use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, UserState};
use crate::resources::{Resource, UserResource};
use crate::schema::Schema;

/// `woodpecker_user`. An empty `login` looks up the authenticated user.
pub struct UserDataSource;

#[async_trait]
impl DataSource for UserDataSource {
    fn type_name(&self) -> &'static str {
        "woodpecker_user"
    }

    fn schema(&self) -> Schema {
        UserResource
            .schema()
            .lookup(&["login"])
            .with_description("Use this data source to retrieve information about a user.")
    }

    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError> {
        let query: UserState = decode(config)?;
        let user = if query.login.is_empty() {
            api.self_user().await
        } else {
            api.user(&query.login).await
        }
        .map_err(|e| ProviderError::client("Couldn't read user data", e))?;
        debug!(login = %user.login, "looked up user");
        encode(&UserState::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWoodpecker;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_login_reads_self() {
        let api = FakeWoodpecker::new();
        let state = UserDataSource.read(&api, &json!({"login": ""})).await.unwrap();
        assert_eq!(state["login"], FakeWoodpecker::SELF_LOGIN);
        assert_eq!(state["is_admin"], true);
    }

    #[tokio::test]
    async fn test_unknown_login() {
        let api = FakeWoodpecker::new();
        let err = UserDataSource
            .read(&api, &json!({"login": "nobody"}))
            .await
            .unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Couldn't read user data");
    }
}
