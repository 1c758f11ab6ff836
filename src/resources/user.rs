use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{unexpected_import_id, Resource};
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, UserState};
use crate::schema::{Attribute, Schema};

/// `woodpecker_user`
pub struct UserResource;

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &'static str {
        "woodpecker_user"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Provides a user.")
            .with_attribute(
                "id",
                Attribute::computed_int64().with_description("the user's id"),
            )
            .with_attribute(
                "forge_id",
                Attribute::computed_int64().with_description("the forge's id"),
            )
            .with_attribute(
                "login",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the user's login"),
            )
            .with_attribute(
                "email",
                Attribute::optional_computed_string().with_description("the user's email"),
            )
            .with_attribute(
                "avatar_url",
                Attribute::optional_computed_string().with_description("the user's avatar URL"),
            )
            .with_attribute(
                "is_active",
                Attribute::computed_bool().with_description("whether user is active in the system"),
            )
            .with_attribute(
                "is_admin",
                Attribute::optional_computed_bool().with_description("whether user is an admin"),
            )
    }

    async fn create(
        &self,
        api: &dyn WoodpeckerApi,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: UserState = decode(planned)?;
        let user = api
            .user_post(&state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't create user", e))?;
        info!(login = %user.login, id = user.id, "created user");
        encode(&UserState::from(&user))
    }

    async fn read(
        &self,
        api: &dyn WoodpeckerApi,
        current: &Value,
    ) -> Result<Value, ProviderError> {
        let state: UserState = decode(current)?;
        let user = api
            .user(&state.login)
            .await
            .map_err(|e| ProviderError::client("Couldn't get user", e))?;
        debug!(login = %user.login, "read user");
        encode(&UserState::from(&user))
    }

    async fn update(
        &self,
        api: &dyn WoodpeckerApi,
        _prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let state: UserState = decode(planned)?;
        let user = api
            .user_patch(&state.to_api())
            .await
            .map_err(|e| ProviderError::client("Couldn't update user", e))?;
        info!(login = %user.login, "updated user");
        encode(&UserState::from(&user))
    }

    async fn delete(&self, api: &dyn WoodpeckerApi, current: &Value) -> Result<(), ProviderError> {
        let state: UserState = decode(current)?;
        api.user_delete(&state.login)
            .await
            .map_err(|e| ProviderError::client("Couldn't delete user", e))?;
        info!(login = %state.login, "deleted user");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        if id.is_empty() {
            return Err(unexpected_import_id(id, "login"));
        }
        Ok(json!({ "login": id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWoodpecker;

    #[tokio::test]
    async fn test_user_lifecycle() {
        let api = FakeWoodpecker::new();
        let resource = UserResource;

        let created = resource
            .create(&api, &json!({"login": "alice", "email": "alice@example.com", "is_admin": null}))
            .await
            .unwrap();
        assert_eq!(created["login"], "alice");
        assert_eq!(created["email"], "alice@example.com");
        assert_eq!(created["is_admin"], false);
        assert!(created["id"].as_i64().unwrap() > 0);

        let mut planned = created.clone();
        planned["is_admin"] = json!(true);
        let updated = resource.update(&api, &created, &planned).await.unwrap();
        assert_eq!(updated["is_admin"], true);

        let read = resource.read(&api, &json!({"login": "alice"})).await.unwrap();
        assert_eq!(read, updated);

        resource.delete(&api, &read).await.unwrap();
        let err = resource.read(&api, &read).await.unwrap_err();
        assert_eq!(err.to_diagnostics()[0].summary, "Couldn't get user");
    }

    #[test]
    fn test_user_import() {
        assert_eq!(
            UserResource.import_state("alice").unwrap(),
            json!({"login": "alice"})
        );
        assert!(UserResource.import_state("").is_err());
    }
}
