//! OpenID Connect login callback handling for oidc-gate.
//!
//! This crate provides:
//! - Provider and claims-mapping configuration (`ProviderConfig`, `ClaimsMappingConfig`)
//! - The nonce store binding each pending login to a client (`NonceStore`)
//! - The identity provider seam and its `openidconnect` implementation
//!   (`IdentityProvider`, `OidcProvider`)
//! - Claims mapping (`map_claims`, `UserData`)
//! - Login initiation and the callback exchange (`begin_login`, `CallbackHandler`)
//!
//! # Example
//!
//! ```no_run
//! use oidc_gate_auth::{
//!     CallbackContext, CallbackHandler, CallbackRequest, ClaimsMappingConfig, NonceStore,
//!     OidcProvider, ProviderConfig, StaticConfigStore,
//! };
//! use std::time::Duration;
//!
//! # async fn run() {
//! let provider = ProviderConfig::new(
//!     "https://auth.example.com".to_string(),
//!     "client-id".to_string(),
//!     "client-secret".to_string(),
//!     "https://app.example.com/auth/callback".to_string(),
//! );
//! let store = StaticConfigStore::with(provider, ClaimsMappingConfig::default());
//! let handler = CallbackHandler::new(store, OidcProvider::new(), NonceStore::default());
//!
//! let ctx = CallbackContext::new().with_timeout(Duration::from_secs(30));
//!
//! // Browser is redirected to `redirect.url`...
//! let redirect = handler.begin_login("203.0.113.7", &ctx).await;
//!
//! // ...and comes back with an authorization code.
//! let request = CallbackRequest::new(Some("code-from-provider".to_string()), "203.0.113.7");
//! match handler.handle(&request, &ctx).await {
//!     Ok(grant) => println!("welcome {}", grant.display_name),
//!     Err(report) => println!("{}", report.current_context().public_message()),
//! }
//! # }
//! ```

pub mod callback;
pub mod claims;
pub mod config;
pub mod error;
pub mod grant;
pub mod login;
pub mod nonce;
pub mod oidc;
pub mod provider;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use callback::{CallbackContext, CallbackHandler, CallbackRequest};
pub use claims::{RawClaims, UserData, map_claims};
pub use config::{
    ClaimsMappingConfig, ClaimsMappingConfigBuilder, NonceStoreConfig, ProviderConfig,
    ProviderConfigBuilder,
};
pub use error::{
    CallbackError, CallbackStep, ClaimsError, ConfigStoreError, FailureKind, ForgeryReason,
    ProviderError,
};
pub use grant::{Alias, AuthorizationGrant, LeaseOptions};
pub use login::{LoginRedirect, begin_login};
pub use nonce::NonceStore;
pub use oidc::{OidcProvider, ProviderHandle};
pub use provider::{AuthorizationRequest, IdentityProvider, TokenSet, VerifiedIdToken};
pub use store::{ConfigStore, StaticConfigStore};
