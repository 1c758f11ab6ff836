//! Read-only lookups.
//!
//! Data source schemas are derived from the matching resource schema with
//! [`Schema::lookup`]: the lookup keys become required and everything else
//! is computed.

mod org;
mod repository;
mod repository_cron;
mod repository_registry;
mod secret;
mod user;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::WoodpeckerApi;
use crate::error::ProviderError;
use crate::resources::SecretKind;
use crate::schema::Schema;

pub use org::OrgDataSource;
pub use repository::RepositoryDataSource;
pub use repository_cron::RepositoryCronDataSource;
pub use repository_registry::RepositoryRegistryDataSource;
pub use secret::SecretDataSource;
pub use user::UserDataSource;

/// A data source type served by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The full type name, e.g. `woodpecker_org`.
    fn type_name(&self) -> &'static str;

    /// Lookup keys are required, everything else computed.
    fn schema(&self) -> Schema;

    /// Look up the object named by `config`.
    async fn read(&self, api: &dyn WoodpeckerApi, config: &Value) -> Result<Value, ProviderError>;
}

/// Every data source the provider serves.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(UserDataSource),
        Arc::new(SecretDataSource::new(SecretKind::Global)),
        Arc::new(OrgDataSource),
        Arc::new(SecretDataSource::new(SecretKind::Org)),
        Arc::new(RepositoryDataSource),
        Arc::new(SecretDataSource::new(SecretKind::Repository)),
        Arc::new(RepositoryCronDataSource),
        Arc::new(RepositoryRegistryDataSource),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_data_sources() {
        let mut names: Vec<_> = all().iter().map(|d| d.type_name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "woodpecker_org",
                "woodpecker_org_secret",
                "woodpecker_repository",
                "woodpecker_repository_cron",
                "woodpecker_repository_registry",
                "woodpecker_repository_secret",
                "woodpecker_secret",
                "woodpecker_user",
            ]
        );
    }

    #[test]
    fn test_no_data_source_exposes_write_only_values() {
        for data_source in all() {
            let schema = data_source.schema();
            assert!(schema.attribute("value").is_none(), "{}", data_source.type_name());
            assert!(schema.attribute("password").is_none(), "{}", data_source.type_name());
        }
    }
}
