//! Identity-provider, claims-mapping and nonce-store configuration.
//!
//! These types are read-only to the callback exchange. They are usually
//! loaded from environment variables, so list-valued settings are stored as
//! comma-separated strings and parsed by their accessors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Configuration for the OIDC identity provider and the lease of issued grants.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The OIDC issuer URL, used for discovery.
    issuer_url: String,
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// The redirect URI the provider sends the browser back to.
    redirect_uri: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,email,profile"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Lease TTL of issued grants, in seconds.
    #[serde(default = "default_ttl_seconds")]
    ttl_seconds: u64,
    /// Maximum lease TTL of issued grants, in seconds.
    #[serde(default = "default_max_ttl_seconds")]
    max_ttl_seconds: u64,
    /// Timeout for each HTTP request to the provider, in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    http_timeout_seconds: u64,
    /// How long discovered provider metadata may be reused, in seconds.
    /// Zero disables caching.
    #[serde(default = "default_discovery_cache_ttl_seconds")]
    discovery_cache_ttl_seconds: u64,
}

fn default_scopes() -> String {
    "openid,email,profile".to_string()
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_max_ttl_seconds() -> u64 {
    86_400
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_discovery_cache_ttl_seconds() -> u64 {
    3600
}

impl ProviderConfig {
    /// Creates a new provider configuration with defaults for optional fields.
    #[must_use]
    pub fn new(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            issuer_url,
            client_id,
            client_secret,
            redirect_uri,
            scopes: default_scopes(),
            ttl_seconds: default_ttl_seconds(),
            max_ttl_seconds: default_max_ttl_seconds(),
            http_timeout_seconds: default_http_timeout_seconds(),
            discovery_cache_ttl_seconds: default_discovery_cache_ttl_seconds(),
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(issuer_url, client_id, client_secret, redirect_uri)
    }

    /// Returns the OIDC issuer URL.
    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the OAuth2 redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Returns the OAuth2 scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        split_list(&self.scopes)
    }

    /// Returns the lease TTL of issued grants.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Returns the maximum lease TTL of issued grants.
    #[must_use]
    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_seconds)
    }

    /// Returns the per-request timeout for provider calls.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Returns how long discovery results may be cached, `None` if caching is off.
    #[must_use]
    pub fn discovery_cache_ttl(&self) -> Option<Duration> {
        (self.discovery_cache_ttl_seconds > 0)
            .then(|| Duration::from_secs(self.discovery_cache_ttl_seconds))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_ttl_seconds", &self.max_ttl_seconds)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .field(
                "discovery_cache_ttl_seconds",
                &self.discovery_cache_ttl_seconds,
            )
            .finish()
    }
}

/// Builder for `ProviderConfig`.
#[derive(Debug)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
    scopes: Vec<String>,
}

impl ProviderConfigBuilder {
    /// Creates a new builder with required fields.
    #[must_use]
    pub fn new(
        issuer_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        let config = ProviderConfig::new(issuer_url, client_id, client_secret, redirect_uri);
        let scopes = config.scopes().into_iter().map(str::to_string).collect();
        Self { config, scopes }
    }

    /// Sets the OAuth2 scopes to request.
    #[must_use]
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Adds a scope to the list of scopes to request.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Sets the lease TTL and maximum TTL of issued grants, in seconds.
    #[must_use]
    pub fn lease(mut self, ttl_seconds: u64, max_ttl_seconds: u64) -> Self {
        self.config.ttl_seconds = ttl_seconds;
        self.config.max_ttl_seconds = max_ttl_seconds;
        self
    }

    /// Sets the per-request timeout for provider calls, in seconds.
    #[must_use]
    pub fn http_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.http_timeout_seconds = seconds;
        self
    }

    /// Sets how long discovery results may be cached, in seconds. Zero disables caching.
    #[must_use]
    pub fn discovery_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.config.discovery_cache_ttl_seconds = seconds;
        self
    }

    /// Builds the `ProviderConfig`.
    #[must_use]
    pub fn build(self) -> ProviderConfig {
        ProviderConfig {
            scopes: self.scopes.join(","),
            ..self.config
        }
    }
}

/// Rules translating provider claims into a user.
///
/// Every claim reference is either a top-level claim name (which may contain
/// characters such as `:`, e.g. `cognito:groups`) or, when it starts with
/// `/`, a JSON pointer into nested claims (e.g. `/realm_access/roles`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsMappingConfig {
    /// Claim supplying the username. Required in the claims.
    /// Default: "sub"
    #[serde(default = "default_username_claim")]
    username_claim: String,
    /// Claim supplying the display name. Falls back to the username.
    /// Default: "name"
    #[serde(default = "default_display_name_claim")]
    display_name_claim: String,
    /// Claim supplying group memberships.
    /// Default: "groups"
    #[serde(default = "default_groups_claim")]
    groups_claim: String,
    /// Claim supplying additional policies, if any.
    #[serde(default)]
    policies_claim: Option<String>,
    /// Policies granted to every user, as a comma-separated string.
    #[serde(default)]
    default_policies: String,
    /// Metadata key to claim reference.
    #[serde(default)]
    metadata_claims: BTreeMap<String, String>,
}

fn default_username_claim() -> String {
    "sub".to_string()
}

fn default_display_name_claim() -> String {
    "name".to_string()
}

fn default_groups_claim() -> String {
    "groups".to_string()
}

impl Default for ClaimsMappingConfig {
    fn default() -> Self {
        Self {
            username_claim: default_username_claim(),
            display_name_claim: default_display_name_claim(),
            groups_claim: default_groups_claim(),
            policies_claim: None,
            default_policies: String::new(),
            metadata_claims: BTreeMap::new(),
        }
    }
}

impl ClaimsMappingConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> ClaimsMappingConfigBuilder {
        ClaimsMappingConfigBuilder::default()
    }

    /// Returns the claim supplying the username.
    #[must_use]
    pub fn username_claim(&self) -> &str {
        &self.username_claim
    }

    /// Returns the claim supplying the display name.
    #[must_use]
    pub fn display_name_claim(&self) -> &str {
        &self.display_name_claim
    }

    /// Returns the claim supplying group memberships.
    #[must_use]
    pub fn groups_claim(&self) -> &str {
        &self.groups_claim
    }

    /// Returns the claim supplying additional policies.
    #[must_use]
    pub fn policies_claim(&self) -> Option<&str> {
        self.policies_claim.as_deref()
    }

    /// Returns the policies granted to every user.
    #[must_use]
    pub fn default_policies(&self) -> Vec<&str> {
        split_list(&self.default_policies)
    }

    /// Returns the metadata rules as metadata key to claim reference.
    #[must_use]
    pub fn metadata_claims(&self) -> &BTreeMap<String, String> {
        &self.metadata_claims
    }
}

/// Builder for `ClaimsMappingConfig`.
#[derive(Debug, Default)]
pub struct ClaimsMappingConfigBuilder {
    config: ClaimsMappingConfig,
    default_policies: Vec<String>,
}

impl ClaimsMappingConfigBuilder {
    /// Sets the claim supplying the username.
    #[must_use]
    pub fn username_claim(mut self, claim: impl Into<String>) -> Self {
        self.config.username_claim = claim.into();
        self
    }

    /// Sets the claim supplying the display name.
    #[must_use]
    pub fn display_name_claim(mut self, claim: impl Into<String>) -> Self {
        self.config.display_name_claim = claim.into();
        self
    }

    /// Sets the claim supplying group memberships.
    #[must_use]
    pub fn groups_claim(mut self, claim: impl Into<String>) -> Self {
        self.config.groups_claim = claim.into();
        self
    }

    /// Sets the claim supplying additional policies.
    #[must_use]
    pub fn policies_claim(mut self, claim: impl Into<String>) -> Self {
        self.config.policies_claim = Some(claim.into());
        self
    }

    /// Adds a policy granted to every user.
    #[must_use]
    pub fn default_policy(mut self, policy: impl Into<String>) -> Self {
        let policy = policy.into();
        if !self.default_policies.contains(&policy) {
            self.default_policies.push(policy);
        }
        self
    }

    /// Propagates a claim into the grant metadata under `key`.
    #[must_use]
    pub fn metadata_claim(mut self, key: impl Into<String>, claim: impl Into<String>) -> Self {
        self.config.metadata_claims.insert(key.into(), claim.into());
        self
    }

    /// Builds the `ClaimsMappingConfig`.
    #[must_use]
    pub fn build(self) -> ClaimsMappingConfig {
        ClaimsMappingConfig {
            default_policies: self.default_policies.join(","),
            ..self.config
        }
    }
}

/// Settings of the nonce state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceStoreConfig {
    /// How long a recorded nonce stays valid, in seconds.
    /// Default: 300
    #[serde(default = "default_nonce_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Upper bound on pending logins held at once.
    /// Default: 10000
    #[serde(default = "default_nonce_max_entries")]
    pub max_entries: usize,
}

fn default_nonce_ttl_seconds() -> u64 {
    300
}

fn default_nonce_max_entries() -> usize {
    10_000
}

impl Default for NonceStoreConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_nonce_ttl_seconds(),
            max_entries: default_nonce_max_entries(),
        }
    }
}

impl NonceStoreConfig {
    /// Returns the freshness window as a chrono duration.
    ///
    /// Windows beyond what chrono can represent saturate at `TimeDelta::MAX`.
    #[must_use]
    pub fn ttl(&self) -> chrono::TimeDelta {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config() -> ProviderConfig {
        ProviderConfig::new(
            "https://auth.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://app.example.com/auth/callback".to_string(),
        )
    }

    #[test]
    fn new_config_has_defaults() {
        let config = provider_config();

        assert_eq!(config.issuer_url(), "https://auth.example.com");
        assert_eq!(config.client_id(), "client-id");
        assert_eq!(config.client_secret(), "client-secret");
        assert_eq!(config.scopes(), vec!["openid", "email", "profile"]);
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.max_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.discovery_cache_ttl(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let debug = format!("{:?}", provider_config());
        assert!(!debug.contains("client-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn builder_allows_customization() {
        let config = ProviderConfig::builder(
            "https://auth.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://app.example.com/auth/callback".to_string(),
        )
        .add_scope("groups".to_string())
        .add_scope("openid".to_string())
        .lease(600, 1200)
        .discovery_cache_ttl_seconds(0)
        .build();

        assert_eq!(config.scopes(), vec!["openid", "email", "profile", "groups"]);
        assert_eq!(config.ttl(), Duration::from_secs(600));
        assert_eq!(config.max_ttl(), Duration::from_secs(1200));
        assert_eq!(config.discovery_cache_ttl(), None);
    }

    #[test]
    fn provider_config_deserializes_with_defaults() {
        let json = r#"{
            "issuer_url": "https://auth.example.com",
            "client_id": "my-client",
            "client_secret": "secret",
            "redirect_uri": "https://app.example.com/callback",
            "scopes": "openid, groups",
            "ttl_seconds": 120
        }"#;

        let config: ProviderConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.scopes(), vec!["openid", "groups"]);
        assert_eq!(config.ttl(), Duration::from_secs(120));
        assert_eq!(config.max_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn claims_mapping_defaults() {
        let mapping = ClaimsMappingConfig::default();

        assert_eq!(mapping.username_claim(), "sub");
        assert_eq!(mapping.display_name_claim(), "name");
        assert_eq!(mapping.groups_claim(), "groups");
        assert_eq!(mapping.policies_claim(), None);
        assert!(mapping.default_policies().is_empty());
        assert!(mapping.metadata_claims().is_empty());
    }

    #[test]
    fn claims_mapping_deserializes_from_partial_json() {
        let json = r#"{
            "username_claim": "email",
            "groups_claim": "cognito:groups",
            "default_policies": "default, reader",
            "metadata_claims": { "email": "email", "tenant": "/org/id" }
        }"#;

        let mapping: ClaimsMappingConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(mapping.username_claim(), "email");
        assert_eq!(mapping.display_name_claim(), "name");
        assert_eq!(mapping.groups_claim(), "cognito:groups");
        assert_eq!(mapping.default_policies(), vec!["default", "reader"]);
        assert_eq!(
            mapping.metadata_claims().get("tenant").map(String::as_str),
            Some("/org/id")
        );
    }

    #[test]
    fn claims_mapping_builder_does_not_duplicate_policies() {
        let mapping = ClaimsMappingConfig::builder()
            .username_claim("preferred_username")
            .policies_claim("policies")
            .default_policy("default")
            .default_policy("default")
            .metadata_claim("email", "email")
            .build();

        assert_eq!(mapping.username_claim(), "preferred_username");
        assert_eq!(mapping.policies_claim(), Some("policies"));
        assert_eq!(mapping.default_policies(), vec!["default"]);
        assert_eq!(mapping.metadata_claims().len(), 1);
    }

    #[test]
    fn nonce_store_config_defaults() {
        let config = NonceStoreConfig::default();
        assert_eq!(config.ttl_seconds, 300);
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.ttl(), chrono::Duration::minutes(5));
    }

    #[test]
    fn oversized_nonce_ttl_saturates() {
        for ttl_seconds in [u64::MAX, 10_000_000_000_000_000, i64::MAX as u64 / 1000 + 1] {
            let config = NonceStoreConfig {
                ttl_seconds,
                ..NonceStoreConfig::default()
            };
            assert_eq!(config.ttl(), chrono::TimeDelta::MAX);
        }
    }
}
