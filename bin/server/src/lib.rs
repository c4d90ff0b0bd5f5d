//! oidc-gate HTTP server.
//!
//! Hosts the login and callback endpoints in front of
//! [`CallbackHandler`](oidc_gate_auth::CallbackHandler).

pub mod config;
pub mod routes;

use axum::{Router, routing::get};
use oidc_gate_auth::{CallbackHandler, NonceStore, OidcProvider, StaticConfigStore};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

/// Shared application state.
pub struct AppState {
    /// Runs login initiation and callbacks.
    pub handler: CallbackHandler<StaticConfigStore, OidcProvider>,
    /// Deadline applied to each login and callback.
    pub callback_timeout: Duration,
}

impl AppState {
    /// Creates the application state from server configuration.
    #[must_use]
    pub fn from_config(config: ServerConfig) -> Self {
        let callback_timeout = config.callback_timeout();
        let store = StaticConfigStore::new();
        if let Some(oidc) = config.oidc {
            store.set_provider_config(oidc);
        }
        store.set_claims_mapping(config.claims);

        Self {
            handler: CallbackHandler::new(
                store,
                OidcProvider::new(),
                NonceStore::new(&config.nonce),
            ),
            callback_timeout,
        }
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/login", get(routes::login))
        .route("/auth/callback", get(routes::callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
