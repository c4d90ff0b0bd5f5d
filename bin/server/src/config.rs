//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`OIDC__ISSUER_URL`, `CLAIMS__GROUPS_CLAIM`,
//! `NONCE__TTL_SECONDS`).

use oidc_gate_auth::{ClaimsMappingConfig, NonceStoreConfig, ProviderConfig};
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    /// Default: "0.0.0.0:3000"
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Upper bound on one callback exchange, in seconds.
    /// Default: 30
    #[serde(default = "default_callback_timeout_seconds")]
    pub callback_timeout_seconds: u64,

    /// Identity provider configuration. Logins fail with a configuration
    /// error until it is set.
    #[serde(default)]
    pub oidc: Option<ProviderConfig>,

    /// Claims mapping rules.
    #[serde(default)]
    pub claims: ClaimsMappingConfig,

    /// Nonce store settings.
    #[serde(default)]
    pub nonce: NonceStoreConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_callback_timeout_seconds() -> u64 {
    30
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the callback deadline as a duration.
    #[must_use]
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        ServerConfig::from_source(config::Environment::default().source(Some(source)))
            .expect("load config")
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]);

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.callback_timeout(), Duration::from_secs(30));
        assert!(config.oidc.is_none());
        assert_eq!(config.claims, ClaimsMappingConfig::default());
        assert_eq!(config.nonce, NonceStoreConfig::default());
    }

    #[test]
    fn nested_settings_are_read() {
        let config = load(&[
            ("OIDC__ISSUER_URL", "https://auth.example.com"),
            ("OIDC__CLIENT_ID", "gate"),
            ("OIDC__CLIENT_SECRET", "s3cret"),
            ("OIDC__REDIRECT_URI", "https://gate.example.com/auth/callback"),
            ("OIDC__SCOPES", "openid,groups"),
            ("CLAIMS__GROUPS_CLAIM", "cognito:groups"),
            ("CLAIMS__DEFAULT_POLICIES", "default,reader"),
            ("NONCE__TTL_SECONDS", "120"),
            ("CALLBACK_TIMEOUT_SECONDS", "15"),
        ]);

        let oidc = config.oidc.as_ref().expect("oidc configured");
        assert_eq!(oidc.issuer_url(), "https://auth.example.com");
        assert_eq!(oidc.scopes(), vec!["openid", "groups"]);
        assert_eq!(config.claims.groups_claim(), "cognito:groups");
        assert_eq!(config.claims.default_policies(), vec!["default", "reader"]);
        assert_eq!(config.nonce.ttl_seconds, 120);
        assert_eq!(config.callback_timeout(), Duration::from_secs(15));
    }
}
