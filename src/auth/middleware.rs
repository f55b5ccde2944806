//! Axum middleware for secret verification and the global admission gate.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Query, State},
    http::{header::CONTENT_TYPE, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::api::error::ApiError;
use crate::auth::resolver::AuthenticatedOwner;
use crate::config::{GateMode, GlobalMiddlewareConfig};
use crate::domain::OwnerRef;
use crate::errors::{Result, VigilError};
use crate::secrets::{ExprMode, SecretEngine, SecretExpr, SecretInputs, SecretVerifier};

/// Route-level requirement: the request must carry correct values for `expr`.
#[derive(Clone)]
pub struct SecretGuard {
    verifier: SecretVerifier,
    expr: Arc<SecretExpr>,
    max_body_size: usize,
}

impl SecretGuard {
    /// Parse `terms` in `mode` and check every named type exists.
    pub fn new<S: AsRef<str>>(
        verifier: SecretVerifier,
        mode: ExprMode,
        terms: &[S],
        max_body_size: usize,
    ) -> Result<Self> {
        let expr = SecretExpr::parse(mode, terms)?;
        expr.resolve(verifier.engine().registry())?;
        Ok(Self { verifier, expr: Arc::new(expr), max_body_size })
    }

    /// Every listed type must verify.
    pub fn all<S: AsRef<str>>(verifier: SecretVerifier, terms: &[S], max_body_size: usize) -> Result<Self> {
        Self::new(verifier, ExprMode::All, terms, max_body_size)
    }

    /// One supplied type verifying is enough.
    pub fn any<S: AsRef<str>>(verifier: SecretVerifier, terms: &[S], max_body_size: usize) -> Result<Self> {
        Self::new(verifier, ExprMode::Any, terms, max_body_size)
    }

    pub fn expr(&self) -> &SecretExpr {
        &self.expr
    }
}

fn request_owner(request: &Request<Body>) -> Option<OwnerRef> {
    request.extensions().get::<AuthenticatedOwner>().map(|owner| owner.0.clone())
}

/// Query parameters overlaid with the JSON body's top-level fields.
fn collect_inputs(parts: &Parts, body: &Bytes) -> std::result::Result<SecretInputs, ApiError> {
    let mut inputs = SecretInputs::new();

    if let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        inputs.extend(params.into_iter().map(|(key, value)| (key, Value::String(value))));
    }

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"));
    if is_json && !body.is_empty() {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => inputs.extend(fields),
            Ok(_) => {}
            Err(err) => return Err(ApiError::bad_request(format!("Malformed JSON body: {}", err))),
        }
    }

    Ok(inputs)
}

/// Middleware entry point verifying the secrets a route requires.
///
/// Matched secrets stay locked against a second usage decrement until the
/// response has been produced.
pub async fn require_secrets(
    State(guard): State<SecretGuard>,
    request: Request<Body>,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let correlation_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "secrets_middleware.require_secrets",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        expr = %guard.expr,
        correlation_id = %correlation_id
    );

    let outcome: std::result::Result<Response, ApiError> = async move {
        let owner = request_owner(&request).ok_or_else(VigilError::unauthenticated)?;

        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, guard.max_body_size)
            .await
            .map_err(|_| ApiError::PayloadTooLarge("Request body too large".to_string()))?;
        let inputs = collect_inputs(&parts, &bytes)?;

        let verification = match guard.verifier.verify(Some(&owner), &guard.expr, &inputs).await {
            Ok(verification) => verification,
            Err(err) => {
                warn!(%correlation_id, owner = %owner, error = %err, "secret verification failed");
                return Err(err.into());
            }
        };
        debug!(matched = verification.matched.len(), "secret verification passed");

        let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
        drop(verification);
        Ok(response)
    }
    .instrument(span)
    .await;
    outcome
}

/// Process-wide gate requiring the caller to hold active secrets of the configured types.
#[derive(Clone)]
pub struct ActiveSecretsGate {
    engine: Arc<SecretEngine>,
    mode: GateMode,
    accessors: Vec<String>,
    except_routes: Vec<Regex>,
}

/// Compile a `*`-wildcard route pattern; leading and trailing slashes are ignored.
pub fn route_pattern(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern.trim_matches('/')).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| VigilError::config_with_source(format!("Invalid except route '{}'", pattern), Box::new(e)))
}

impl ActiveSecretsGate {
    pub fn new(engine: Arc<SecretEngine>, config: &GlobalMiddlewareConfig) -> Result<Self> {
        let accessors = config
            .types
            .iter()
            .map(|key| Ok(engine.registry().by_key(key)?.accessor_name.clone()))
            .collect::<Result<Vec<_>>>()?;
        let except_routes = config.except_routes.iter().map(|p| route_pattern(p)).collect::<Result<Vec<_>>>()?;

        Ok(Self { engine, mode: config.name, accessors, except_routes })
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        let path = path.trim_matches('/');
        self.except_routes.iter().any(|pattern| pattern.is_match(path))
    }

    /// Load (and cache) the owner's active secrets; with `strict`, missing ones reject.
    pub async fn check(&self, owner: &OwnerRef, strict: bool) -> Result<()> {
        match self.mode {
            GateMode::All => {
                for accessor in &self.accessors {
                    self.engine.get_active_secrets(owner, accessor, strict, false).await?;
                }
                Ok(())
            }
            GateMode::Any => {
                if self.accessors.is_empty() {
                    return Ok(());
                }
                for accessor in &self.accessors {
                    match self.engine.get_active_secrets(owner, accessor, strict, false).await {
                        Ok(_) => return Ok(()),
                        Err(err) if err.is_no_active_secret() => continue,
                        Err(err) => return Err(err),
                    }
                }
                let policies = self
                    .accessors
                    .iter()
                    .map(|accessor| self.engine.registry().by_accessor(accessor))
                    .collect::<Result<Vec<_>>>()?;
                Err(VigilError::no_active_secret(&policies))
            }
        }
    }
}

/// Middleware entry point for the global gate. Requests without an owner pass through.
pub async fn ensure_active_secrets(
    State(gate): State<ActiveSecretsGate>,
    request: Request<Body>,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let Some(owner) = request_owner(&request) else {
        return Ok(next.run(request).await);
    };

    let strict = !gate.is_exempt(request.uri().path());
    let span = info_span!(
        "secrets_middleware.ensure_active_secrets",
        http.path = %request.uri().path(),
        owner = %owner,
        strict
    );

    async {
        if let Err(err) = gate.check(&owner, strict).await {
            warn!(owner = %owner, error = %err, "active secret gate rejected request");
            return Err(ApiError::from(err));
        }
        gate.engine.purge_user_stale_secrets(&owner);
        Ok(())
    }
    .instrument(span)
    .await?;

    Ok(next.run(request).await)
}
