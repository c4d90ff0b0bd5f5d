//! Read-only access to provider and claims-mapping configuration.

use crate::config::{ClaimsMappingConfig, ProviderConfig};
use crate::error::{CallbackError, ConfigStoreError};
use async_trait::async_trait;
use oidc_gate_core::Result;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// Source of the configuration a login needs.
///
/// `Ok(None)` means the setting has never been configured. The callback
/// exchange treats both that and a read failure as missing configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns the identity provider configuration, if set.
    async fn provider_config(&self) -> Result<Option<ProviderConfig>, ConfigStoreError>;

    /// Returns the claims mapping rules, if set.
    async fn claims_mapping(&self) -> Result<Option<ClaimsMappingConfig>, ConfigStoreError>;
}

#[derive(Debug, Default)]
struct Settings {
    provider: Option<ProviderConfig>,
    claims: Option<ClaimsMappingConfig>,
}

/// In-memory configuration that can be replaced at runtime.
///
/// Clones share the same settings. Replacing the provider configuration
/// changes the key `OidcProvider` caches discovery under, so the next
/// login re-runs discovery.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    settings: Arc<RwLock<Settings>>,
}

impl StaticConfigStore {
    /// Creates an empty store. Every callback fails until both settings are provided.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding both settings.
    #[must_use]
    pub fn with(provider: ProviderConfig, claims: ClaimsMappingConfig) -> Self {
        let store = Self::new();
        store.set_provider_config(provider);
        store.set_claims_mapping(claims);
        store
    }

    /// Replaces the provider configuration.
    pub fn set_provider_config(&self, config: ProviderConfig) {
        self.write().provider = Some(config);
    }

    /// Removes the provider configuration.
    pub fn clear_provider_config(&self) {
        self.write().provider = None;
    }

    /// Replaces the claims mapping rules.
    pub fn set_claims_mapping(&self, mapping: ClaimsMappingConfig) {
        self.write().claims = Some(mapping);
    }

    /// Removes the claims mapping rules.
    pub fn clear_claims_mapping(&self) {
        self.write().claims = None;
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConfigStore for StaticConfigStore {
    async fn provider_config(&self) -> Result<Option<ProviderConfig>, ConfigStoreError> {
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(settings.provider.clone())
    }

    async fn claims_mapping(&self) -> Result<Option<ClaimsMappingConfig>, ConfigStoreError> {
        let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(settings.claims.clone())
    }
}

/// Loads the provider configuration, failing with `ConfigMissing` if it is
/// absent or unreadable.
pub(crate) async fn require_provider_config<S>(store: &S) -> Result<ProviderConfig, CallbackError>
where
    S: ConfigStore + ?Sized,
{
    const WHAT: &str = "identity provider configuration";

    match store.provider_config().await {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Err(CallbackError::ConfigMissing { what: WHAT }.into()),
        Err(report) => {
            warn!(error = %report, "failed to read {WHAT}");
            Err(report.context(CallbackError::ConfigMissing { what: WHAT }))
        }
    }
}

/// Loads the claims mapping rules, failing with `ConfigMissing` if they are
/// absent or unreadable.
pub(crate) async fn require_claims_mapping<S>(
    store: &S,
) -> Result<ClaimsMappingConfig, CallbackError>
where
    S: ConfigStore + ?Sized,
{
    const WHAT: &str = "claims mapping configuration";

    match store.claims_mapping().await {
        Ok(Some(mapping)) => Ok(mapping),
        Ok(None) => Err(CallbackError::ConfigMissing { what: WHAT }.into()),
        Err(report) => {
            warn!(error = %report, "failed to read {WHAT}");
            Err(report.context(CallbackError::ConfigMissing { what: WHAT }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl ConfigStore for BrokenStore {
        async fn provider_config(&self) -> Result<Option<ProviderConfig>, ConfigStoreError> {
            Err(ConfigStoreError::ReadFailed {
                reason: "storage offline".to_string(),
            }
            .into())
        }

        async fn claims_mapping(&self) -> Result<Option<ClaimsMappingConfig>, ConfigStoreError> {
            Err(ConfigStoreError::ReadFailed {
                reason: "storage offline".to_string(),
            }
            .into())
        }
    }

    fn provider_config() -> ProviderConfig {
        ProviderConfig::new(
            "https://auth.example.com".to_string(),
            "client-id".to_string(),
            "client-secret".to_string(),
            "https://app.example.com/auth/callback".to_string(),
        )
    }

    #[tokio::test]
    async fn empty_store_has_no_settings() {
        let store = StaticConfigStore::new();

        assert!(store.provider_config().await.expect("read").is_none());
        assert!(store.claims_mapping().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn settings_can_be_replaced_and_cleared() {
        let store = StaticConfigStore::with(provider_config(), ClaimsMappingConfig::default());
        let shared = store.clone();

        let replacement = ProviderConfig::new(
            "https://other.example.com".to_string(),
            "other-client".to_string(),
            "other-secret".to_string(),
            "https://app.example.com/auth/callback".to_string(),
        );
        store.set_provider_config(replacement);

        let config = shared.provider_config().await.expect("read").expect("set");
        assert_eq!(config.issuer_url(), "https://other.example.com");

        store.clear_claims_mapping();
        assert!(shared.claims_mapping().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn absent_settings_are_config_missing() {
        let store = StaticConfigStore::new();

        let err = require_provider_config(&store).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            CallbackError::ConfigMissing { .. }
        ));

        let err = require_claims_mapping(&store).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            CallbackError::ConfigMissing { .. }
        ));
    }

    #[tokio::test]
    async fn read_failures_are_config_missing() {
        let err = require_provider_config(&BrokenStore).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            CallbackError::ConfigMissing { .. }
        ));
        assert!(format!("{err:?}").contains("storage offline"));
    }
}
