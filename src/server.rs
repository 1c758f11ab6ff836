//! gRPC server for the provider protocol.
//!
//! [`ProviderService`] is the Rust-typed surface a provider implements.
//! [`serve`] and friends bind a loopback listener, print the handshake line
//! the host waits for, and translate every RPC into a call on the service.
//!
//! # Shutdown
//!
//! On SIGTERM or SIGINT (CTRL+C on Windows) the server stops accepting
//! connections and gives in-flight requests up to
//! [`ServeOptions::shutdown_timeout`] to finish. The provider's `stop()` is
//! called afterwards in every case.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as proto;
use crate::schema::{has_errors, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// Operations a provider exposes to the host.
///
/// Values cross this boundary as JSON documents shaped by the schemas the
/// provider returns from [`schema`](ProviderService::schema).
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Schemas for the provider block, every resource and every data source.
    fn schema(&self) -> ProviderSchema;

    /// Type names served by this provider. Derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    /// Check the provider block without contacting the server.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider. Error diagnostics leave it unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Called once the server has shut down.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource configuration without touching the server.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Rewrite state stored under schema `version` into the current shape.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Compute the planned state. A null `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create the resource and return its new state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the server.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Apply `planned_state` to an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Turn an import identifier into a partial state that `read` can fill in.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }

    /// Check a data source configuration without touching the server.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// The format of the line printed to stdout once the server is listening.
pub fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}

// =============================================================================
// Wire conversions
// =============================================================================

/// Empty payloads decode to null.
fn decode_json(field: &str, bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        ProviderError::Validation(format!("{} is not a valid JSON document: {}", field, e))
    })
}

fn encode_json(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostic_to_proto(d: Diagnostic) -> proto::Diagnostic {
    let severity = match d.severity {
        DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
    };
    proto::Diagnostic {
        severity: severity as i32,
        summary: d.summary,
        detail: d.detail.unwrap_or_default(),
        attribute: d.attribute.unwrap_or_default(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics.into_iter().map(diagnostic_to_proto).collect()
}

fn error_to_proto(operation: &str, err: &ProviderError) -> Vec<proto::Diagnostic> {
    error!(operation, error = %err, "operation failed");
    diagnostics_to_proto(err.to_diagnostics())
}

fn report(operation: &str, result: Result<Vec<Diagnostic>, ProviderError>) -> Vec<proto::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if has_errors(&diagnostics) {
                warn!(operation, diagnostics = diagnostics.len(), "completed with errors");
            } else {
                debug!(operation, "completed");
            }
            diagnostics_to_proto(diagnostics)
        }
        Err(e) => error_to_proto(operation, &e),
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    let attributes = schema
        .attributes
        .iter()
        .map(|(name, attr)| proto::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr.default.as_ref().map(encode_json).unwrap_or_default(),
            validators: if attr.validators.is_empty() {
                Vec::new()
            } else {
                serde_json::to_vec(&attr.validators).unwrap_or_default()
            },
        })
        .collect();

    proto::Schema {
        version: schema.version as i64,
        block: Some(proto::Block {
            attributes,
            description: schema.description.clone().unwrap_or_default(),
        }),
    }
}

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> ProviderGrpcService<P> {
    fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<proto::GetMetadataRequest>,
    ) -> Result<Response<proto::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "served metadata"
        );
        Ok(Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(metadata.capabilities.into()),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<proto::GetSchemaRequest>,
    ) -> Result<Response<proto::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        Ok(Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<Response<proto::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json("config", &req.config) {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ValidateProviderConfigResponse {
            diagnostics: report("validate_provider_config", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<proto::ConfigureRequest>,
    ) -> Result<Response<proto::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = match decode_json("config", &req.config) {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };
        if matches!(&result, Ok(d) if !has_errors(d)) {
            info!("provider configured");
        }
        Ok(Response::new(proto::ConfigureResponse {
            diagnostics: report("configure", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: Request<proto::StopRequest>,
    ) -> Result<Response<proto::StopResponse>, Status> {
        info!("stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "stop failed");
                e.to_string()
            }
        };
        Ok(Response::new(proto::StopResponse { error }))
    }

    /// Check a resource configuration without touching the server.
    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type))]
    async fn validate_resource_config(
        &self,
        request: Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<Response<proto::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = match decode_json("config", &req.config) {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            }
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: report("validate_resource_config", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type, version))]
    async fn upgrade_resource_state(
        &self,
        request: Request<proto::UpgradeResourceStateRequest>,
    ) -> Result<Response<proto::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("version", req.version);

        let result = match decode_json("raw_state", &req.raw_state) {
            Ok(state) => {
                self.provider
                    .upgrade_resource_state(&req.resource_type, req.version, state)
                    .await
            }
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(upgraded) => proto::UpgradeResourceStateResponse {
                upgraded_state: encode_json(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => proto::UpgradeResourceStateResponse {
                upgraded_state: vec![],
                diagnostics: error_to_proto("upgrade_resource_state", &e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type))]
    async fn plan(
        &self,
        request: Request<proto::PlanRequest>,
    ) -> Result<Response<proto::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let decoded = decode_json("prior_state", &req.prior_state).and_then(|prior| {
            Ok((
                Some(prior).filter(|p| !p.is_null()),
                decode_json("proposed_state", &req.proposed_state)?,
                decode_json("config", &req.config)?,
            ))
        });
        let result = match decoded {
            Ok((prior, proposed, config)) => {
                self.provider
                    .plan(&req.resource_type, prior, proposed, config)
                    .await
            }
            Err(e) => Err(e),
        };

        let response = match result {
            Ok(plan) => {
                debug!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "planned"
                );
                proto::PlanResponse {
                    planned_state: encode_json(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }
            }
            Err(e) => proto::PlanResponse {
                planned_state: vec![],
                changes: vec![],
                requires_replace: false,
                diagnostics: error_to_proto("plan", &e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type))]
    async fn create(
        &self,
        request: Request<proto::CreateRequest>,
    ) -> Result<Response<proto::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode_json("planned_state", &req.planned_state) {
            Ok(planned) => self.provider.create(&req.resource_type, planned).await,
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => proto::CreateResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            },
            Err(e) => proto::CreateResponse {
                state: vec![],
                diagnostics: error_to_proto("create", &e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type))]
    async fn read(
        &self,
        request: Request<proto::ReadRequest>,
    ) -> Result<Response<proto::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode_json("current_state", &req.current_state) {
            Ok(current) => self.provider.read(&req.resource_type, current).await,
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => proto::ReadResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            },
            Err(e) => proto::ReadResponse {
                state: vec![],
                diagnostics: error_to_proto("read", &e),
            },
        };
        Ok(Response::new(response))
    }

    /// Apply `planned_state` to an existing resource.
    #[instrument(skip_all, name = "grpc.update", fields(resource_type))]
    async fn update(
        &self,
        request: Request<proto::UpdateRequest>,
    ) -> Result<Response<proto::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let decoded = decode_json("prior_state", &req.prior_state).and_then(|prior| {
            Ok((prior, decode_json("planned_state", &req.planned_state)?))
        });
        let result = match decoded {
            Ok((prior, planned)) => {
                self.provider
                    .update(&req.resource_type, prior, planned)
                    .await
            }
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => proto::UpdateResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            },
            Err(e) => proto::UpdateResponse {
                state: vec![],
                diagnostics: error_to_proto("update", &e),
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type))]
    async fn delete(
        &self,
        request: Request<proto::DeleteRequest>,
    ) -> Result<Response<proto::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode_json("current_state", &req.current_state) {
            Ok(current) => self.provider.delete(&req.resource_type, current).await,
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(()) => vec![],
            Err(e) => error_to_proto("delete", &e),
        };
        Ok(Response::new(proto::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type, id))]
    async fn import_resource_state(
        &self,
        request: Request<proto::ImportResourceStateRequest>,
    ) -> Result<Response<proto::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());

        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => proto::ImportResourceStateResponse {
                imported: imported.into_iter().map(Into::into).collect(),
                diagnostics: vec![],
            },
            Err(e) => proto::ImportResourceStateResponse {
                imported: vec![],
                diagnostics: error_to_proto("import_resource_state", &e),
            },
        };
        Ok(Response::new(response))
    }

    /// Check a data source configuration without touching the server.
    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: Request<proto::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<proto::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());

        let result = match decode_json("config", &req.config) {
            Ok(config) => {
                self.provider
                    .validate_data_source_config(&req.data_source_type, config)
                    .await
            }
            Err(e) => Err(e),
        };
        Ok(Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: report("validate_data_source_config", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type))]
    async fn read_data_source(
        &self,
        request: Request<proto::ReadDataSourceRequest>,
    ) -> Result<Response<proto::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());

        let result = match decode_json("config", &req.config) {
            Ok(config) => {
                self.provider
                    .read_data_source(&req.data_source_type, config)
                    .await
            }
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => proto::ReadDataSourceResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            },
            Err(e) => proto::ReadDataSourceResponse {
                state: vec![],
                diagnostics: error_to_proto("read_data_source", &e),
            },
        };
        Ok(Response::new(response))
    }
}

// =============================================================================
// Serving
// =============================================================================

/// Options for running the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Options with the default shutdown timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long in-flight requests may run after a shutdown signal.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolves on SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If no handler can be installed the future never resolves and the server
/// runs until the host kills it.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("received SIGINT, shutting down"),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "failed to install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received CTRL+C, shutting down"),
            Err(e) => {
                error!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    std::future::pending::<()>().await;
}

/// Serve `provider` on an ephemeral loopback port.
///
/// Prints `WOODPECKER_PROVIDER|6|<address>` to stdout once listening; the
/// host reads that line to find the server. Logs go to stderr so they never
/// mix with the handshake.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// [`serve`] with explicit options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Serve `provider` on a fixed address instead of an ephemeral port.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// [`serve_on`] with explicit options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, options, wait_for_shutdown_signal()).await
}

/// Runs until `signal` resolves, then drains for at most
/// `options.shutdown_timeout` and stops the provider.
async fn serve_on_listener<P, F>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    signal: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(addr));
    info!(address = %addr, "provider server listening");

    let provider = Arc::new(provider);
    let service = proto::provider_server::ProviderServer::new(ProviderGrpcService::new(
        Arc::clone(&provider),
    ));

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                signal.await;
                let _ = signalled_tx.send(());
            },
        );
    tokio::pin!(server);

    // The drain timeout only starts once the signal has fired.
    tokio::select! {
        result = &mut server => result?,
        _ = signalled_rx => {
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "in-flight requests did not finish in time, forcing shutdown"
                ),
            }
        }
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "provider stop failed");
    }
    info!("provider server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::provider_server::Provider;
    use crate::provider::WoodpeckerProvider;
    use crate::schema::Attribute;
    use crate::testing::FakeWoodpecker;
    use serde_json::json;

    fn service() -> (Arc<FakeWoodpecker>, ProviderGrpcService<WoodpeckerProvider>) {
        let api = Arc::new(FakeWoodpecker::new());
        let provider = WoodpeckerProvider::with_client(api.clone());
        (api, ProviderGrpcService::new(Arc::new(provider)))
    }

    #[test]
    fn test_handshake_line() {
        let addr: SocketAddr = "127.0.0.1:50051".parse().unwrap();
        assert_eq!(handshake_line(addr), "WOODPECKER_PROVIDER|6|127.0.0.1:50051");
    }

    #[test]
    fn test_schema_to_proto_flattens_attributes() {
        let schema = Schema::new(1)
            .with_description("A thing.")
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("timeout", Attribute::optional_computed_int64().at_least(1))
            .with_attribute("token", Attribute::required_string().sensitive());

        let proto = schema_to_proto(&schema);
        assert_eq!(proto.version, 1);
        let block = proto.block.unwrap();
        assert_eq!(block.description, "A thing.");
        assert_eq!(block.attributes.len(), 3);

        let name = block.attributes.iter().find(|a| a.name == "name").unwrap();
        assert!(name.required && name.force_new);
        assert!(name.validators.is_empty());

        let timeout = block.attributes.iter().find(|a| a.name == "timeout").unwrap();
        let validators: Value = serde_json::from_slice(&timeout.validators).unwrap();
        assert!(validators.is_array());

        let token = block.attributes.iter().find(|a| a.name == "token").unwrap();
        assert!(token.sensitive);
    }

    #[test]
    fn test_decode_json() {
        assert_eq!(decode_json("config", b"").unwrap(), Value::Null);
        assert_eq!(decode_json("config", br#"{"a":1}"#).unwrap(), json!({"a": 1}));
        let err = decode_json("config", b"{not json").unwrap_err();
        assert!(err.to_string().contains("config is not a valid JSON document"));
    }

    #[tokio::test]
    async fn test_get_schema_lists_every_type() {
        let (_, service) = service();
        let response = service
            .get_schema(Request::new(proto::GetSchemaRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(response.provider.is_some());
        assert_eq!(response.resources.len(), 7);
        assert_eq!(response.data_sources.len(), 8);
        assert!(response.resources.contains_key("woodpecker_repository"));
    }

    #[tokio::test]
    async fn test_create_over_grpc() {
        let (api, service) = service();
        let response = service
            .create(Request::new(proto::CreateRequest {
                resource_type: "woodpecker_user".into(),
                planned_state: encode_json(&json!({"login": "alice", "email": "a@example.com"})),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
        let state: Value = serde_json::from_slice(&response.state).unwrap();
        assert_eq!(state["login"], "alice");
        assert!(api.calls().contains(&"user_post"));
    }

    #[tokio::test]
    async fn test_errors_become_diagnostics() {
        let (_, service) = service();
        let response = service
            .read(Request::new(proto::ReadRequest {
                resource_type: "woodpecker_user".into(),
                current_state: encode_json(&json!({"login": "nobody"})),
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.state.is_empty());
        assert_eq!(response.diagnostics.len(), 1);
        let diagnostic = &response.diagnostics[0];
        assert_eq!(diagnostic.severity, proto::diagnostic::Severity::Error as i32);
        assert_eq!(diagnostic.summary, "Couldn't get user");
        assert!(diagnostic.detail.contains("404"));
    }

    #[tokio::test]
    async fn test_malformed_state_is_rejected() {
        let (api, service) = service();
        let response = service
            .delete(Request::new(proto::DeleteRequest {
                resource_type: "woodpecker_user".into(),
                current_state: b"{".to_vec(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.diagnostics.len(), 1);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plan_treats_empty_prior_as_create() {
        let (_, service) = service();
        let response = service
            .plan(Request::new(proto::PlanRequest {
                resource_type: "woodpecker_secret".into(),
                prior_state: vec![],
                proposed_state: encode_json(&json!({"name": "token", "value": "s3cret", "events": ["push"]})),
                config: vec![],
            }))
            .await
            .unwrap()
            .into_inner();

        assert!(response.diagnostics.is_empty());
        assert!(!response.requires_replace);
        assert!(!response.changes.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_after_signal() {
        let provider = WoodpeckerProvider::with_client(Arc::new(FakeWoodpecker::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let server = serve_on_listener(
            provider,
            listener,
            ServeOptions::new().with_shutdown_timeout(Duration::from_millis(200)),
            async move {
                let _ = rx.await;
            },
        );
        let trigger = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(()).unwrap();
        };

        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(server, trigger)
        })
        .await
        .unwrap();
        assert!(result.is_ok());
    }
}
