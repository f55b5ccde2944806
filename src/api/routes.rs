use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::{ensure_active_secrets, resolve_owner, ActiveSecretsGate, ResolverState};
use crate::config::ServerConfig;
use crate::secrets::SecretEngine;

use super::{
    docs,
    handlers::{
        delete_secret_handler, get_secret_handler, health_handler, list_secrets_handler,
        restore_secret_handler,
    },
};

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<SecretEngine>,
    pub server: Arc<ServerConfig>,
}

/// Wrap `router` so each request first resolves its owner and then passes the
/// global active-secret gate.
pub fn protect(router: Router, resolver: ResolverState, gate: Option<ActiveSecretsGate>) -> Router {
    let router = match gate {
        Some(gate) => router.layer(middleware::from_fn_with_state(gate, ensure_active_secrets)),
        None => router,
    };
    router.layer(middleware::from_fn_with_state(resolver, resolve_owner))
}

pub fn build_router(state: ApiState, resolver: ResolverState, gate: Option<ActiveSecretsGate>) -> Router {
    let secrets_api = Router::new()
        .route("/secrets", get(list_secrets_handler))
        .route("/secrets/{uuid}", get(get_secret_handler).delete(delete_secret_handler))
        .route("/secrets/{uuid}/restore", post(restore_secret_handler))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .merge(docs::docs_router());

    protect(secrets_api, resolver, gate).merge(public).layer(TraceLayer::new_for_http())
}
