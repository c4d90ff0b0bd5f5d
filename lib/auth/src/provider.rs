//! The seam between the callback exchange and the identity provider.
//!
//! All network traffic to the provider goes through [`IdentityProvider`].
//! The production implementation is [`OidcProvider`](crate::oidc::OidcProvider);
//! tests substitute in-memory fakes.

use crate::claims::RawClaims;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use rootcause::Report;
use std::fmt;

/// Tokens returned by the provider's token endpoint.
///
/// Held in memory for the duration of one callback only.
#[derive(Clone)]
pub struct TokenSet {
    /// The OAuth2 access token.
    pub access_token: String,
    /// The raw (still unverified) ID token, if the provider returned one.
    pub id_token: Option<String>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Claims of an ID token whose signature, issuer, audience and expiry have
/// been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdToken {
    /// The subject identifier.
    pub subject: String,
    /// The embedded nonce claim, if present.
    pub nonce: Option<String>,
}

impl VerifiedIdToken {
    /// Creates verified claims.
    ///
    /// Implementations of [`IdentityProvider`] must only call this after
    /// the token has passed every cryptographic and claim check.
    #[must_use]
    pub fn new(subject: String, nonce: Option<String>) -> Self {
        Self { subject, nonce }
    }
}

/// A provider authorization URL together with the nonce bound to it.
///
/// The `state` parameter in `url` is not recorded: replay protection rests
/// on the nonce alone.
#[derive(Clone)]
pub struct AuthorizationRequest {
    /// Where to send the browser.
    pub url: String,
    /// The nonce embedded in `url`, to be recorded in the nonce store.
    pub nonce: String,
}

impl fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("url", &self.url)
            .field("nonce", &"<redacted>")
            .finish()
    }
}

/// Operations against an external OIDC identity provider.
///
/// Every method is independent: the orchestrator decides their order.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Discovered provider state needed by the other operations.
    type Handle: Send + Sync;

    /// Performs OIDC discovery for the configured issuer.
    ///
    /// Fails with `Unreachable` or `Misconfigured`.
    async fn discover(
        &self,
        config: &ProviderConfig,
    ) -> Result<Self::Handle, Report<ProviderError>>;

    /// Exchanges an authorization code for tokens.
    ///
    /// Fails with `CodeExchangeFailed`.
    async fn exchange_code(
        &self,
        handle: &Self::Handle,
        config: &ProviderConfig,
        code: &str,
    ) -> Result<TokenSet, Report<ProviderError>>;

    /// Verifies signature, issuer, audience and expiry of a raw ID token and
    /// surfaces its nonce claim. The nonce itself is not checked here.
    ///
    /// Fails with `TokenVerificationFailed`.
    fn verify_id_token(
        &self,
        handle: &Self::Handle,
        config: &ProviderConfig,
        raw_id_token: &str,
    ) -> Result<VerifiedIdToken, Report<ProviderError>>;

    /// Fetches user-info claims with the access token, requiring that they
    /// belong to `subject`.
    ///
    /// Fails with `UserInfoFetchFailed`.
    async fn fetch_user_info(
        &self,
        handle: &Self::Handle,
        tokens: &TokenSet,
        subject: &str,
    ) -> Result<RawClaims, Report<ProviderError>>;

    /// Builds the URL that starts a login at the provider, with a fresh
    /// random state and nonce.
    fn authorization_url(
        &self,
        handle: &Self::Handle,
        config: &ProviderConfig,
    ) -> Result<AuthorizationRequest, Report<ProviderError>>;
}
