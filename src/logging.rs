//! Logging setup for the provider binary.
//!
//! All logs go to **stderr**; stdout carries the handshake line the host
//! reads to find the gRPC address.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full `EnvFilter` directives (e.g. `terraform_provider_woodpecker=debug`)
//! - `TF_LOG`: the host's log level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`),
//!   used when `RUST_LOG` is unset
//!
//! ```bash
//! RUST_LOG=terraform_provider_woodpecker=debug terraform apply
//! TF_LOG=DEBUG terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `TF_LOG` value to a tracing level directive.
fn tf_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

/// Build the filter from `RUST_LOG`, then `TF_LOG`, then `default_level`.
fn env_filter(
    rust_log: Option<String>,
    tf_log: Option<String>,
    default_level: &str,
) -> EnvFilter {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return filter;
    }
    let level = tf_log
        .as_deref()
        .and_then(tf_log_level)
        .unwrap_or(default_level);
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn filter_from_env(default_level: &str) -> EnvFilter {
    env_filter(
        std::env::var("RUST_LOG").ok(),
        std::env::var("TF_LOG").ok(),
        default_level,
    )
}

/// Try to install the global subscriber with the given default level.
///
/// Returns `false` if a subscriber was already set.
pub fn try_init_logging_with_default(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter_from_env(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Install the global subscriber, defaulting to `info`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Install the global subscriber with a custom default level.
pub fn init_logging_with_default(default_level: &str) {
    if !try_init_logging_with_default(default_level) {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    try_init_logging_with_default("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tf_log_levels() {
        assert_eq!(tf_log_level("DEBUG"), Some("debug"));
        assert_eq!(tf_log_level("warn"), Some("warn"));
        assert_eq!(tf_log_level(" trace "), Some("trace"));
        assert_eq!(tf_log_level("JSON"), Some("trace"));
        assert_eq!(tf_log_level("off"), None);
    }

    #[test]
    fn test_rust_log_takes_precedence() {
        let filter = env_filter(
            Some("terraform_provider_woodpecker=debug".to_string()),
            Some("ERROR".to_string()),
            "info",
        );
        assert_eq!(filter.to_string(), "terraform_provider_woodpecker=debug");
    }

    #[test]
    fn test_tf_log_fallback() {
        let filter = env_filter(None, Some("WARN".to_string()), "info");
        assert_eq!(filter.to_string(), "warn");

        let filter = env_filter(None, Some("bogus".to_string()), "debug");
        assert_eq!(filter.to_string(), "debug");

        let filter = env_filter(None, None, "info");
        assert_eq!(filter.to_string(), "info");
    }
}
