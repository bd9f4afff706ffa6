//! HTTP surface of the authorizer.

pub mod authorize;
pub mod health;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{authz::Authorizer, config::AuthorizerConfig};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub authorizer: Arc<Authorizer>,
    pub config: Arc<AuthorizerConfig>,
}

impl AppState {
    pub fn new(config: AuthorizerConfig) -> Self {
        Self {
            authorizer: Arc::new(Authorizer::from_config(&config)),
            config: Arc::new(config),
        }
    }

    /// Use a custom authorizer, e.g. one backed by a different grant source.
    pub fn with_authorizer(mut self, authorizer: Authorizer) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }
}

pub fn build_app(state: AppState) -> Router {
    let server = &state.config.server;

    let mut session_routes = Router::new().route("/session", get(session::session_expiry));
    // Called from browsers, unlike the other endpoints
    if server.cors {
        session_routes = session_routes.layer(CorsLayer::permissive());
    }

    Router::new()
        .route("/authorize", post(authorize::authorize))
        .route("/health", get(health::health_check))
        .merge(session_routes)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .with_state(state)
}
