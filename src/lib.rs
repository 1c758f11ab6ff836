//! Woodpecker CI provider
//!
//! An infrastructure provider that manages the objects of a Woodpecker CI
//! server: users, global/organization/repository secrets, repositories with
//! their settings, repository cron jobs and repository registries. Each of
//! them is also available as a read-only data source, plus organizations.
//!
//! The host starts the provider as a subprocess and talks to it over gRPC.
//! On startup the binary prints a handshake line to stdout:
//!
//! ```text
//! WOODPECKER_PROVIDER|6|127.0.0.1:50051
//! ```
//!
//! # Layout
//!
//! - [`client`]: the Woodpecker REST API behind the [`client::WoodpeckerApi`] trait
//! - [`resources`] and [`data_sources`]: one handler per managed object type
//! - [`provider`]: [`WoodpeckerProvider`], which routes protocol calls to handlers
//! - [`schema`], [`validation`] and [`plan`]: typed schemas and the generic
//!   validate/plan machinery driven by them
//! - [`server`]: the gRPC server and handshake
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_woodpecker::{serve, WoodpeckerProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     terraform_provider_woodpecker::init_logging();
//!     serve(WoodpeckerProvider::new()).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod logging;
pub mod models;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::WoodpeckerProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_changes, validate_result};

pub use async_trait::async_trait;
