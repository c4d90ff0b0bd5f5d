//! The login callback exchange.
//!
//! A callback moves through a fixed sequence of steps and never goes back:
//!
//! ```text
//! LoadConfig -> Discover -> ExchangeCode -> VerifyNonce -> FetchUserInfo -> MapClaims -> Success
//! ```
//!
//! Any failure is terminal and is reported as a [`CallbackError`] naming the
//! step, with the underlying provider or mapping report kept as its cause.
//!
//! Within `VerifyNonce` the ID token is verified before the nonce store is
//! consulted. An unverified token's nonce claim is attacker-controlled, so it
//! is never compared against anything.

use crate::claims::map_claims;
use crate::error::{CallbackError, CallbackStep, ForgeryReason, ProviderError};
use crate::grant::AuthorizationGrant;
use crate::login::{LoginRedirect, begin_login};
use crate::nonce::NonceStore;
use crate::provider::{IdentityProvider, VerifiedIdToken};
use crate::store::{ConfigStore, require_claims_mapping, require_provider_config};
use oidc_gate_core::{CallbackId, Result};
use rootcause::Report;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The parts of the inbound redirect consumed by the exchange.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    /// The `code` query parameter, if present.
    pub code: Option<String>,
    /// Identifies the client that started the login (its remote address).
    pub client_key: String,
}

impl CallbackRequest {
    #[must_use]
    pub fn new(code: Option<String>, client_key: impl Into<String>) -> Self {
        Self {
            code,
            client_key: client_key.into(),
        }
    }
}

/// Caller-supplied cancellation and deadline for one login or callback.
///
/// Every awaited provider call is raced against both.
#[derive(Debug, Clone, Default)]
pub struct CallbackContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallbackContext {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled through `token`.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now. A timeout too large to
    /// represent leaves the context without a deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `call` unless the context is cancelled or its deadline passes first.
    pub(crate) async fn guard<F, T>(&self, step: CallbackStep, call: F) -> Result<T, CallbackError>
    where
        F: Future<Output = T>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(%step, "cancelled by caller");
                Err(CallbackError::Cancelled { step }.into())
            }
            () = deadline => {
                debug!(%step, "deadline exceeded");
                Err(CallbackError::Cancelled { step }.into())
            }
            output = call => Ok(output),
        }
    }
}

/// Runs login callbacks against one identity provider.
///
/// The handler holds no per-request state. The nonce store is the only
/// state shared between concurrent callbacks.
pub struct CallbackHandler<S, P> {
    config_store: S,
    provider: P,
    nonce_store: NonceStore,
}

impl<S, P> CallbackHandler<S, P>
where
    S: ConfigStore,
    P: IdentityProvider,
{
    #[must_use]
    pub fn new(config_store: S, provider: P, nonce_store: NonceStore) -> Self {
        Self {
            config_store,
            provider,
            nonce_store,
        }
    }

    #[must_use]
    pub fn config_store(&self) -> &S {
        &self.config_store
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn nonce_store(&self) -> &NonceStore {
        &self.nonce_store
    }

    /// Starts a login for `client_key`. See [`begin_login`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing`, `ProviderError` or `Cancelled`.
    pub async fn begin_login(
        &self,
        client_key: &str,
        ctx: &CallbackContext,
    ) -> Result<LoginRedirect, CallbackError> {
        begin_login(
            &self.config_store,
            &self.provider,
            &self.nonce_store,
            client_key,
            ctx,
        )
        .await
    }

    /// Completes a login, producing the grant for the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns a `CallbackError` naming the failed step. Its
    /// [`public_message`](CallbackError::public_message) is the only text
    /// that should reach the requester.
    #[instrument(
        name = "oidc_callback",
        skip_all,
        fields(callback_id = %CallbackId::new(), client = %request.client_key)
    )]
    pub async fn handle(
        &self,
        request: &CallbackRequest,
        ctx: &CallbackContext,
    ) -> Result<AuthorizationGrant, CallbackError> {
        debug!(step = %CallbackStep::LoadConfig, "callback started");
        let config = require_provider_config(&self.config_store).await?;
        let mapping = require_claims_mapping(&self.config_store).await?;

        debug!(step = %CallbackStep::Discover, "discovering provider");
        let handle = ctx
            .guard(CallbackStep::Discover, self.provider.discover(&config))
            .await?
            .map_err(|report| provider_failure(report, CallbackStep::Discover))?;

        debug!(step = %CallbackStep::ExchangeCode, "exchanging authorization code");
        let code = request
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| CallbackError::BadRequest {
                reason: "missing authorization code".to_string(),
            })?;
        let tokens = ctx
            .guard(
                CallbackStep::ExchangeCode,
                self.provider.exchange_code(&handle, &config, code),
            )
            .await?
            .map_err(|report| provider_failure(report, CallbackStep::ExchangeCode))?;

        debug!(step = %CallbackStep::VerifyNonce, "verifying ID token");
        let Some(raw_id_token) = tokens.id_token.as_deref() else {
            let report = Report::from(ProviderError::TokenVerificationFailed {
                reason: "token response has no ID token".to_string(),
            });
            return Err(token_invalid(report));
        };
        let verified = self
            .provider
            .verify_id_token(&handle, &config, raw_id_token)
            .map_err(token_invalid)?;
        self.check_nonce(&request.client_key, &verified)?;

        debug!(step = %CallbackStep::FetchUserInfo, "fetching user info");
        let claims = ctx
            .guard(
                CallbackStep::FetchUserInfo,
                self.provider.fetch_user_info(&handle, &tokens, &verified.subject),
            )
            .await?
            .map_err(|report| provider_failure(report, CallbackStep::FetchUserInfo))?;

        debug!(step = %CallbackStep::MapClaims, "mapping claims");
        let user = map_claims(&claims, &mapping).map_err(|report| {
            warn!(error = %report.current_context(), "claims could not be mapped");
            report.context(CallbackError::ClaimsMappingError)
        })?;

        info!(
            username = %user.username,
            groups = user.groups.len(),
            "login callback succeeded"
        );
        Ok(AuthorizationGrant::from_user(user, &config))
    }

    /// Consumes the pending nonce for `client_key` and compares it with the
    /// nonce of an already verified ID token.
    ///
    /// The stored entry is removed before any comparison, so it cannot be
    /// presented again whatever the outcome.
    fn check_nonce(
        &self,
        client_key: &str,
        verified: &VerifiedIdToken,
    ) -> Result<(), CallbackError> {
        let expected = self
            .nonce_store
            .take(client_key)
            .ok_or_else(|| forged(ForgeryReason::NoPendingLogin))?;
        let presented = verified
            .nonce
            .as_deref()
            .ok_or_else(|| forged(ForgeryReason::MissingNonceClaim))?;

        if presented != expected {
            return Err(forged(ForgeryReason::NonceMismatch));
        }
        Ok(())
    }
}

fn provider_failure(report: Report<ProviderError>, step: CallbackStep) -> Report<CallbackError> {
    warn!(%step, error = %report.current_context(), "identity provider call failed");
    report.context(CallbackError::ProviderError { step })
}

fn token_invalid(report: Report<ProviderError>) -> Report<CallbackError> {
    warn!(error = %report.current_context(), "rejected ID token");
    report.context(CallbackError::TokenInvalid)
}

fn forged(reason: ForgeryReason) -> Report<CallbackError> {
    warn!(%reason, "rejected callback");
    CallbackError::ForgedOrExpiredRequest { reason }.into()
}
