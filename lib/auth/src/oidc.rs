//! OIDC provider implementation using the openidconnect crate.

use crate::claims::RawClaims;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::provider::{AuthorizationRequest, IdentityProvider, TokenSet, VerifiedIdToken};
use async_trait::async_trait;
use openidconnect::core::{
    CoreAuthenticationFlow, CoreClient, CoreGenderClaim, CoreIdToken, CoreProviderMetadata,
};
use openidconnect::{
    AccessToken, AdditionalClaims, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    DiscoveryError, EndpointMaybeSet, EndpointNotSet, EndpointSet, IssuerUrl, Nonce,
    OAuth2TokenResponse, RedirectUrl, Scope, SubjectIdentifier, TokenResponse, UserInfoClaims,
};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Client type produced by `CoreClient::from_provider_metadata`.
type DiscoveredClient = CoreClient<
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// Catch-all for claims outside the OIDC standard set (groups, roles, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProviderClaims {
    #[serde(flatten)]
    extra: HashMap<String, JsonValue>,
}

impl AdditionalClaims for ProviderClaims {}

/// The settings a discovered handle was built from.
#[derive(Clone, PartialEq, Eq)]
struct Fingerprint {
    issuer_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl Fingerprint {
    fn of(config: &ProviderConfig) -> Self {
        Self {
            issuer_url: config.issuer_url().to_string(),
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret().to_string(),
            redirect_uri: config.redirect_uri().to_string(),
        }
    }
}

/// A discovered provider: metadata, signing keys and a configured HTTP client.
pub struct ProviderHandle {
    client: DiscoveredClient,
    http_client: reqwest::Client,
    fingerprint: Fingerprint,
    discovered_at: Instant,
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("issuer_url", &self.fingerprint.issuer_url)
            .field("client_id", &self.fingerprint.client_id)
            .field("discovered_at", &self.discovered_at)
            .finish_non_exhaustive()
    }
}

/// Identity provider backed by OIDC discovery.
///
/// Discovery results are cached per provider configuration for
/// `ProviderConfig::discovery_cache_ttl`. A cached handle still verifies
/// every ID token against its signing keys, so staleness can only cause a
/// rejection, never an acceptance.
#[derive(Debug, Default)]
pub struct OidcProvider {
    cache: RwLock<Option<Arc<ProviderHandle>>>,
}

impl OidcProvider {
    /// Creates a provider with an empty discovery cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops any cached discovery result.
    ///
    /// Call this whenever the provider configuration changes.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn cached(&self, config: &ProviderConfig) -> Option<Arc<ProviderHandle>> {
        let ttl = config.discovery_cache_ttl()?;
        let fingerprint = Fingerprint::of(config);
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|handle| {
                handle.fingerprint == fingerprint && handle.discovered_at.elapsed() < ttl
            })
            .map(Arc::clone)
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    type Handle = Arc<ProviderHandle>;

    #[instrument(skip_all, fields(issuer = %config.issuer_url()))]
    async fn discover(
        &self,
        config: &ProviderConfig,
    ) -> Result<Self::Handle, Report<ProviderError>> {
        if let Some(handle) = self.cached(config).await {
            debug!("reusing cached provider metadata");
            return Ok(handle);
        }

        let handle = Arc::new(discover_handle(config).await?);
        debug!("discovered provider metadata");

        if config.discovery_cache_ttl().is_some() {
            *self.cache.write().await = Some(Arc::clone(&handle));
        }

        Ok(handle)
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        handle: &Self::Handle,
        _config: &ProviderConfig,
        code: &str,
    ) -> Result<TokenSet, Report<ProviderError>> {
        let token_response = handle
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| ProviderError::Misconfigured {
                reason: format!("provider has no token endpoint: {e}"),
            })?
            .request_async(&handle.http_client)
            .await
            .map_err(|e| ProviderError::CodeExchangeFailed {
                reason: e.to_string(),
            })?;

        Ok(TokenSet {
            access_token: token_response.access_token().secret().clone(),
            id_token: token_response.id_token().map(ToString::to_string),
        })
    }

    fn verify_id_token(
        &self,
        handle: &Self::Handle,
        _config: &ProviderConfig,
        raw_id_token: &str,
    ) -> Result<VerifiedIdToken, Report<ProviderError>> {
        let id_token: CoreIdToken =
            serde_json::from_value(JsonValue::String(raw_id_token.to_string())).map_err(|e| {
                ProviderError::TokenVerificationFailed {
                    reason: format!("malformed ID token: {e}"),
                }
            })?;

        // Signature, issuer, audience (client ID) and expiry are checked here.
        // The nonce is compared by the caller against the nonce store.
        let verifier = handle.client.id_token_verifier();
        let claims = id_token
            .claims(&verifier, defer_nonce_check)
            .map_err(|e| ProviderError::TokenVerificationFailed {
                reason: e.to_string(),
            })?;

        Ok(VerifiedIdToken::new(
            claims.subject().to_string(),
            claims.nonce().map(|nonce| nonce.secret().clone()),
        ))
    }

    #[instrument(skip_all)]
    async fn fetch_user_info(
        &self,
        handle: &Self::Handle,
        tokens: &TokenSet,
        subject: &str,
    ) -> Result<RawClaims, Report<ProviderError>> {
        let claims: UserInfoClaims<ProviderClaims, CoreGenderClaim> = handle
            .client
            .user_info(
                AccessToken::new(tokens.access_token.clone()),
                Some(SubjectIdentifier::new(subject.to_string())),
            )
            .map_err(|e| ProviderError::UserInfoFetchFailed {
                reason: format!("provider has no user info endpoint: {e}"),
            })?
            .request_async(&handle.http_client)
            .await
            .map_err(|e| ProviderError::UserInfoFetchFailed {
                reason: e.to_string(),
            })?;

        Ok(to_raw_claims(&claims)?)
    }

    fn authorization_url(
        &self,
        handle: &Self::Handle,
        config: &ProviderConfig,
    ) -> Result<AuthorizationRequest, Report<ProviderError>> {
        let mut request = handle.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        );

        // "openid" is always sent by the library
        for scope in config.scopes().into_iter().filter(|scope| *scope != "openid") {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let (url, _state, nonce) = request.url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            nonce: nonce.secret().clone(),
        })
    }
}

async fn discover_handle(config: &ProviderConfig) -> Result<ProviderHandle, Report<ProviderError>> {
    let issuer_url = IssuerUrl::new(config.issuer_url().to_string()).map_err(|e| {
        ProviderError::Misconfigured {
            reason: format!("invalid issuer URL: {e}"),
        }
    })?;

    let redirect_url = RedirectUrl::new(config.redirect_uri().to_string()).map_err(|e| {
        ProviderError::Misconfigured {
            reason: format!("invalid redirect URI: {e}"),
        }
    })?;

    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.http_timeout())
        .build()
        .map_err(|e| ProviderError::Misconfigured {
            reason: format!("failed to create HTTP client: {e}"),
        })?;

    let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
        .await
        .map_err(classify_discovery_error)?;

    let client = CoreClient::from_provider_metadata(
        provider_metadata,
        ClientId::new(config.client_id().to_string()),
        Some(ClientSecret::new(config.client_secret().to_string())),
    )
    .set_redirect_uri(redirect_url);

    Ok(ProviderHandle {
        client,
        http_client,
        fingerprint: Fingerprint::of(config),
        discovered_at: Instant::now(),
    })
}

/// Transport failures mean the provider is unreachable; anything the
/// provider answered with but we cannot use means it is misconfigured.
fn classify_discovery_error<RE>(err: DiscoveryError<RE>) -> ProviderError
where
    RE: std::error::Error + 'static,
{
    match err {
        DiscoveryError::Request(e) => ProviderError::Unreachable {
            reason: e.to_string(),
        },
        other => ProviderError::Misconfigured {
            reason: other.to_string(),
        },
    }
}

fn defer_nonce_check(_nonce: Option<&Nonce>) -> Result<(), String> {
    Ok(())
}

fn to_raw_claims<T: Serialize>(claims: &T) -> Result<RawClaims, ProviderError> {
    match serde_json::to_value(claims) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(other) => Err(ProviderError::UserInfoFetchFailed {
            reason: format!("user info is not a JSON object: {other}"),
        }),
        Err(e) => Err(ProviderError::UserInfoFetchFailed {
            reason: format!("failed to read user info claims: {e}"),
        }),
    }
}
