//! Login and callback routes.

use axum::{
    Json,
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use oidc_gate_auth::{
    AuthorizationGrant, CallbackContext, CallbackError, CallbackRequest, FailureKind,
};
use rootcause::Report;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::AppState;

/// Query parameters of the provider redirect.
///
/// Only `code` is consumed; `state` and any other parameters are ignored.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
}

/// Starts a login by redirecting to the identity provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Redirect, AuthError> {
    let ctx = CallbackContext::new().with_timeout(state.callback_timeout);
    let redirect = state
        .handler
        .begin_login(&client_key(peer), &ctx)
        .await
        .map_err(AuthError)?;

    tracing::debug!(login_id = %redirect.login_id, "redirecting to identity provider");
    Ok(Redirect::to(&redirect.url))
}

/// Completes a login and returns the grant as JSON.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<AuthorizationGrant>, AuthError> {
    let request = CallbackRequest::new(query.code, client_key(peer));
    let ctx = CallbackContext::new().with_timeout(state.callback_timeout);

    let grant = state
        .handler
        .handle(&request, &ctx)
        .await
        .map_err(AuthError)?;

    Ok(Json(grant))
}

/// Nonces are bound to the peer address without its port, since the
/// callback arrives on a different connection than the login.
fn client_key(peer: SocketAddr) -> String {
    peer.ip().to_string()
}

/// A failed login or callback.
#[derive(Debug)]
pub struct AuthError(pub Report<CallbackError>);

/// Maps a failure to the HTTP status returned to the browser.
#[must_use]
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::BadRequest => StatusCode::BAD_REQUEST,
        FailureKind::TokenInvalid
        | FailureKind::ForgedOrExpiredRequest
        | FailureKind::ClaimsMappingError => StatusCode::UNAUTHORIZED,
        FailureKind::ProviderError => StatusCode::BAD_GATEWAY,
        FailureKind::ConfigMissing => StatusCode::SERVICE_UNAVAILABLE,
        FailureKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let error = self.0.current_context();
        let status = status_for(error.kind());

        if status.is_server_error() {
            tracing::error!(report = %self.0, "login failed");
        } else {
            tracing::warn!(report = %self.0, "login rejected");
        }

        (status, error.public_message()).into_response()
    }
}
