//! Error types for the provider.

use thiserror::Error;

use crate::client::ClientError;
use crate::schema::Diagnostic;

/// Errors that can occur while serving a provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is not (or could not be) configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State did not match the shape of its model.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An import identifier could not be parsed.
    #[error("{summary}: {detail}")]
    InvalidImportId {
        /// Short title.
        summary: String,
        /// What was expected and what was received.
        detail: String,
    },

    /// A Woodpecker API call failed.
    #[error("{summary}: {source}")]
    Client {
        /// Short title naming the failed operation.
        summary: String,
        /// The underlying client error.
        #[source]
        source: ClientError,
    },

    /// Configuration failed schema validation.
    #[error("{}", describe(.0))]
    Invalid(Vec<Diagnostic>),
}

impl ProviderError {
    /// Wrap a client error under a short operation title.
    pub fn client(summary: impl Into<String>, source: ClientError) -> Self {
        Self::Client {
            summary: summary.into(),
            source,
        }
    }

    /// Build an import identifier error.
    pub fn invalid_import_id(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidImportId {
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    /// Render the error as diagnostics for the host.
    ///
    /// Client errors keep their short title as the summary and the
    /// underlying error text as the detail.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Self::Invalid(diagnostics) => diagnostics.clone(),
            Self::Client { summary, source } => {
                vec![Diagnostic::error(summary.clone()).with_detail(source.to_string())]
            },
            Self::InvalidImportId { summary, detail } => {
                vec![Diagnostic::error(summary.clone()).with_detail(detail.clone())]
            },
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}

fn describe(diagnostics: &[Diagnostic]) -> String {
    let summaries: Vec<&str> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
    format!("Invalid configuration: {}", summaries.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Configuration("not configured".to_string());
        assert_eq!(format!("{}", err), "Configuration error: not configured");

        let err = ProviderError::UnknownResource("woodpecker_pipeline".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: woodpecker_pipeline"
        );

        let err = ProviderError::client("Couldn't get user", ClientError::not_found("not found"));
        assert_eq!(
            format!("{}", err),
            "Couldn't get user: client error 404: not found"
        );
    }

    #[test]
    fn test_client_error_diagnostic_splits_title_and_detail() {
        let err = ProviderError::client(
            "Couldn't create repository secret",
            ClientError::status(500, "database locked"),
        );
        let diagnostics = err.to_diagnostics();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Couldn't create repository secret");
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("client error 500: database locked")
        );
    }

    #[test]
    fn test_invalid_keeps_attribute_diagnostics() {
        let err = ProviderError::Invalid(vec![
            Diagnostic::error("Invalid Attribute Value Match for 'events.0'").with_attribute("events.0"),
        ]);

        let diagnostics = err.to_diagnostics();
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("events.0"));
        assert!(err.to_string().contains("events.0"));
    }

    #[test]
    fn test_import_id_diagnostic() {
        let err = ProviderError::invalid_import_id(
            "Unexpected Import Identifier",
            "Expected import identifier with format: repository_id/name. Got: \"oops\"",
        );
        let diagnostics = err.to_diagnostics();
        assert_eq!(diagnostics[0].summary, "Unexpected Import Identifier");
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("repository_id/name"));
    }
}
