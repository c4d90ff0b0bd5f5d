//! In-memory identity provider used by the unit tests.

use crate::claims::RawClaims;
use crate::config::{ClaimsMappingConfig, ProviderConfig};
use crate::error::ProviderError;
use crate::provider::{AuthorizationRequest, IdentityProvider, TokenSet, VerifiedIdToken};
use crate::store::StaticConfigStore;
use async_trait::async_trait;
use rootcause::Report;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const RAW_ID_TOKEN: &str = "eyJhbGciOiJSUzI1NiJ9.eyJzdWIiOiJhbGljZSJ9.c2ln";

/// Scripted provider that records which operations were invoked, in order.
pub(crate) struct FakeProvider {
    calls: Mutex<Vec<&'static str>>,
    user_info_subjects: Mutex<Vec<String>>,
    pub discover_error: Option<ProviderError>,
    pub exchange_error: Option<ProviderError>,
    pub verify_error: Option<ProviderError>,
    pub user_info_error: Option<ProviderError>,
    pub authorization_error: Option<ProviderError>,
    pub discover_delay: Option<Duration>,
    pub exchange_delay: Option<Duration>,
    pub id_token: Option<String>,
    pub token_nonce: Option<String>,
    pub subject: String,
    pub user_info: RawClaims,
    pub login_nonce: String,
}

impl FakeProvider {
    pub fn new() -> Self {
        let user_info = match json!({
            "sub": "alice",
            "name": "Alice Example",
            "email": "alice@example.com",
            "groups": ["engineering", "admins"]
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };

        Self {
            calls: Mutex::new(Vec::new()),
            user_info_subjects: Mutex::new(Vec::new()),
            discover_error: None,
            exchange_error: None,
            verify_error: None,
            user_info_error: None,
            authorization_error: None,
            discover_delay: None,
            exchange_delay: None,
            id_token: Some(RAW_ID_TOKEN.to_string()),
            token_nonce: Some("abc123".to_string()),
            subject: "alice".to_string(),
            user_info,
            login_nonce: "n-0S6_WzA2Mj".to_string(),
        }
    }

    pub fn with_token_nonce(mut self, nonce: Option<&str>) -> Self {
        self.token_nonce = nonce.map(str::to_string);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn user_info_subjects(&self) -> Vec<String> {
        self.user_info_subjects.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    type Handle = ();

    async fn discover(&self, _config: &ProviderConfig) -> Result<(), Report<ProviderError>> {
        self.record("discover");
        if let Some(delay) = self.discover_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.discover_error {
            Some(err) => Err(err.clone().into()),
            None => Ok(()),
        }
    }

    async fn exchange_code(
        &self,
        _handle: &(),
        _config: &ProviderConfig,
        code: &str,
    ) -> Result<TokenSet, Report<ProviderError>> {
        self.record("exchange_code");
        if let Some(delay) = self.exchange_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.exchange_error {
            return Err(err.clone().into());
        }
        assert!(!code.is_empty());

        Ok(TokenSet {
            access_token: "access-token".to_string(),
            id_token: self.id_token.clone(),
        })
    }

    fn verify_id_token(
        &self,
        _handle: &(),
        _config: &ProviderConfig,
        raw_id_token: &str,
    ) -> Result<VerifiedIdToken, Report<ProviderError>> {
        self.record("verify_id_token");
        if let Some(err) = &self.verify_error {
            return Err(err.clone().into());
        }
        assert_eq!(raw_id_token, RAW_ID_TOKEN);

        Ok(VerifiedIdToken::new(
            self.subject.clone(),
            self.token_nonce.clone(),
        ))
    }

    async fn fetch_user_info(
        &self,
        _handle: &(),
        _tokens: &TokenSet,
        subject: &str,
    ) -> Result<RawClaims, Report<ProviderError>> {
        self.record("fetch_user_info");
        self.user_info_subjects
            .lock()
            .unwrap()
            .push(subject.to_string());
        match &self.user_info_error {
            Some(err) => Err(err.clone().into()),
            None => Ok(self.user_info.clone()),
        }
    }

    fn authorization_url(
        &self,
        _handle: &(),
        _config: &ProviderConfig,
    ) -> Result<AuthorizationRequest, Report<ProviderError>> {
        self.record("authorization_url");
        if let Some(err) = &self.authorization_error {
            return Err(err.clone().into());
        }
        Ok(AuthorizationRequest {
            url: format!(
                "https://auth.example.com/authorize?response_type=code&state=state-1&nonce={}",
                self.login_nonce
            ),
            nonce: self.login_nonce.clone(),
        })
    }
}

pub(crate) fn provider_config() -> ProviderConfig {
    ProviderConfig::builder(
        "https://auth.example.com".to_string(),
        "client-id".to_string(),
        "client-secret".to_string(),
        "https://app.example.com/auth/callback".to_string(),
    )
    .lease(1800, 43_200)
    .build()
}

pub(crate) fn configured_store() -> StaticConfigStore {
    StaticConfigStore::with(provider_config(), ClaimsMappingConfig::default())
}
