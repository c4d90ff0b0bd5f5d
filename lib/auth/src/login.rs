//! Login initiation: the producer side of the nonce store.

use crate::callback::CallbackContext;
use crate::error::{CallbackError, CallbackStep, ProviderError};
use crate::nonce::NonceStore;
use crate::provider::IdentityProvider;
use crate::store::{ConfigStore, require_provider_config};
use oidc_gate_core::{LoginId, Result};
use rootcause::Report;
use tracing::{debug, instrument, warn};

/// Where to send the browser to start a login.
///
/// The nonce bound to the login stays in the nonce store and is never
/// handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// The provider authorization URL.
    pub url: String,
    /// Correlates log lines of this initiation.
    pub login_id: LoginId,
}

/// Builds a provider authorization URL for `client_key` and records its
/// nonce, replacing any login still pending for the same client.
///
/// # Errors
///
/// Returns `ConfigMissing` when no provider is configured, `ProviderError`
/// when discovery or URL construction fails, and `Cancelled` when `ctx`
/// ends before discovery completes. Nothing is recorded on failure.
#[instrument(skip_all, fields(login_id, client = %client_key))]
pub async fn begin_login<S, P>(
    config_store: &S,
    provider: &P,
    nonce_store: &NonceStore,
    client_key: &str,
    ctx: &CallbackContext,
) -> Result<LoginRedirect, CallbackError>
where
    S: ConfigStore + ?Sized,
    P: IdentityProvider,
{
    let login_id = LoginId::new();
    tracing::Span::current().record("login_id", tracing::field::display(login_id));

    let config = require_provider_config(config_store).await?;

    let handle = ctx
        .guard(CallbackStep::Discover, provider.discover(&config))
        .await?
        .map_err(|report| provider_failure(report, CallbackStep::Discover))?;

    let request = provider
        .authorization_url(&handle, &config)
        .map_err(|report| provider_failure(report, CallbackStep::AuthorizationUrl))?;

    nonce_store.put(client_key, request.nonce);
    debug!("recorded pending login");

    Ok(LoginRedirect {
        url: request.url,
        login_id,
    })
}

fn provider_failure(report: Report<ProviderError>, step: CallbackStep) -> Report<CallbackError> {
    warn!(%step, error = %report.current_context(), "could not start login");
    report.context(CallbackError::ProviderError { step })
}
