//! Provider configuration block and its resolution.
//!
//! `server` and `token` may be set in the configuration block or through the
//! `WOODPECKER_SERVER` / `WOODPECKER_TOKEN` environment variables. Values in
//! the block win.

use serde::{Deserialize, Serialize};

use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable holding the server URL.
pub const ENV_SERVER: &str = "WOODPECKER_SERVER";

/// Environment variable holding the API token.
pub const ENV_TOKEN: &str = "WOODPECKER_TOKEN";

/// The raw provider configuration block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Server URL, falling back to `WOODPECKER_SERVER`.
    #[serde(default)]
    pub server: Option<String>,
    /// API token, falling back to `WOODPECKER_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,
}

/// A configuration with every required value present.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Server URL.
    pub server: String,
    /// API token.
    pub token: String,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the configuration block sent by the host.
    ///
    /// A null block is treated as empty.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
    }

    /// Fill missing values from `env` and check that both are present.
    ///
    /// Each missing value yields its own diagnostic.
    pub fn resolve<F>(&self, env: F) -> Result<ResolvedConfig, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |configured: &Option<String>, var: &str| {
            configured
                .clone()
                .filter(|v| !v.is_empty())
                .or_else(|| env(var).filter(|v| !v.is_empty()))
        };

        let server = pick(&self.server, ENV_SERVER);
        let token = pick(&self.token, ENV_TOKEN);

        let mut diagnostics = Vec::new();
        if server.is_none() {
            diagnostics.push(
                Diagnostic::error("Missing Server URL Configuration")
                    .with_detail(format!(
                        "While configuring the provider, the server URL was not found in the \
                         {} environment variable or provider configuration block server attribute.",
                        ENV_SERVER
                    ))
                    .with_attribute("server"),
            );
        }
        if token.is_none() {
            diagnostics.push(
                Diagnostic::error("Missing API Token Configuration")
                    .with_detail(format!(
                        "While configuring the provider, the API token was not found in the \
                         {} environment variable or provider configuration block token attribute.",
                        ENV_TOKEN
                    ))
                    .with_attribute("token"),
            );
        }

        match (server, token) {
            (Some(server), Some(token)) => Ok(ResolvedConfig { server, token }),
            _ => Err(diagnostics),
        }
    }
}

/// Schema of the provider configuration block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_description("Manage a Woodpecker CI server.")
        .with_attribute(
            "server",
            Attribute::optional_string().with_description(format!(
                "URL of the Woodpecker server. May also be set with {}.",
                ENV_SERVER
            )),
        )
        .with_attribute(
            "token",
            Attribute::optional_string().sensitive().with_description(format!(
                "Personal API token. May also be set with {}.",
                ENV_TOKEN
            )),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_resolve_from_block() {
        let config = ProviderConfig::from_value(&json!({
            "server": "https://ci.example.com",
            "token": "abc"
        }))
        .unwrap();

        let resolved = config.resolve(no_env).unwrap();
        assert_eq!(resolved.server, "https://ci.example.com");
        assert_eq!(resolved.token, "abc");
    }

    #[test]
    fn test_resolve_falls_back_to_env() {
        let config = ProviderConfig::from_value(&json!({"server": null})).unwrap();
        let env = |var: &str| match var {
            ENV_SERVER => Some("http://localhost:8000".to_string()),
            ENV_TOKEN => Some("from-env".to_string()),
            _ => None,
        };

        let resolved = config.resolve(env).unwrap();
        assert_eq!(resolved.server, "http://localhost:8000");
        assert_eq!(resolved.token, "from-env");
    }

    #[test]
    fn test_block_wins_over_env() {
        let config = ProviderConfig {
            server: Some("https://block".to_string()),
            token: None,
        };
        let env = |var: &str| Some(format!("env-{}", var));

        let resolved = config.resolve(env).unwrap();
        assert_eq!(resolved.server, "https://block");
        assert_eq!(resolved.token, "env-WOODPECKER_TOKEN");
    }

    #[test]
    fn test_each_missing_value_reported() {
        let diagnostics = ProviderConfig::default().resolve(no_env).unwrap_err();

        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec!["Missing Server URL Configuration", "Missing API Token Configuration"]
        );
    }

    #[test]
    fn test_empty_string_is_missing() {
        let config = ProviderConfig {
            server: Some("https://ci".to_string()),
            token: Some(String::new()),
        };
        let diagnostics = config.resolve(no_env).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("token"));
    }

    #[test]
    fn test_resolved_debug_hides_token() {
        let resolved = ResolvedConfig {
            server: "https://ci".to_string(),
            token: "secret-token".to_string(),
        };
        assert!(!format!("{:?}", resolved).contains("secret-token"));
    }

    #[test]
    fn test_schema_marks_token_sensitive() {
        let schema = provider_config_schema();
        assert!(schema.attribute("token").unwrap().flags.sensitive);
        assert!(!schema.attribute("server").unwrap().flags.required);
    }
}
