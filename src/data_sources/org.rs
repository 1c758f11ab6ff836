use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::models::{decode, encode, OrgState};
use crate::schema::{Attribute, Schema};

/// `woodpecker_org`
pub struct OrgDataSource;

#[async_trait]
impl DataSource for OrgDataSource {
    fn type_name(&self) -> &'static str {
        "woodpecker_org"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Use this data source to retrieve information about an organization.")
            .with_attribute("id", Attribute::computed_int64().with_description("the org's id"))
            .with_attribute("forge_id", Attribute::computed_int64().with_description("the forge's id"))
            .with_attribute("name", Attribute::required_string().with_description("the org's name"))
            .with_attribute("is_user", Attribute::computed_bool().with_description("whether the org is a user"))
    }

    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError> {
        let query: OrgState = decode(config)?;
        let org = api
            .org_lookup(&query.name)
            .await
            .map_err(|e| ProviderError::client("Couldn't get org data", e))?;
        debug!(name = %org.name, id = org.id, "looked up org");
        encode(&OrgState::from(&org))
    }
}
