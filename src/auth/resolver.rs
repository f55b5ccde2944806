//! Caller resolution.
//!
//! A host application authenticates callers however it likes; Vigil only
//! needs to know which owner a request belongs to. Resolvers are tried in
//! order and the first owner found wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Extensions, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::auth::credentials::CredentialProvider;
use crate::domain::OwnerRef;
use crate::errors::{Result, VigilError};

/// Owner of the current request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedOwner(pub OwnerRef);

impl<S> FromRequestParts<S> for AuthenticatedOwner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedOwner>()
            .cloned()
            .ok_or_else(|| ApiError::from(VigilError::unauthenticated()))
    }
}

#[async_trait]
pub trait OwnerResolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, headers: &HeaderMap, extensions: &Extensions) -> Result<Option<OwnerRef>>;
}

/// Picks up an owner that earlier middleware already placed in the extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionOwnerResolver;

#[async_trait]
impl OwnerResolver for ExtensionOwnerResolver {
    fn name(&self) -> &'static str {
        "extension"
    }

    async fn resolve(&self, _headers: &HeaderMap, extensions: &Extensions) -> Result<Option<OwnerRef>> {
        Ok(extensions.get::<AuthenticatedOwner>().map(|owner| owner.0.clone()))
    }
}

/// Reads the owner id from a header set by a trusted upstream proxy.
#[derive(Debug, Clone)]
pub struct TrustedHeaderOwnerResolver {
    header: String,
    owner_type: String,
}

impl TrustedHeaderOwnerResolver {
    pub fn new<H: Into<String>, T: Into<String>>(header: H, owner_type: T) -> Self {
        Self { header: header.into(), owner_type: owner_type.into() }
    }
}

#[async_trait]
impl OwnerResolver for TrustedHeaderOwnerResolver {
    fn name(&self) -> &'static str {
        "trusted_header"
    }

    async fn resolve(&self, headers: &HeaderMap, _extensions: &Extensions) -> Result<Option<OwnerRef>> {
        let owner_id = headers
            .get(self.header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        Ok(owner_id.map(|id| OwnerRef::new(self.owner_type.clone(), id)))
    }
}

/// Resolves the owner from credential headers named after each credential
/// type's accessor (e.g. an `email` header).
#[derive(Clone)]
pub struct CredentialOwnerResolver {
    provider: CredentialProvider,
    headers: Vec<(String, u8)>,
}

impl CredentialOwnerResolver {
    pub fn new(provider: CredentialProvider, credential_types: &[(String, u8)]) -> Self {
        Self { provider, headers: credential_types.to_vec() }
    }
}

#[async_trait]
impl OwnerResolver for CredentialOwnerResolver {
    fn name(&self) -> &'static str {
        "credential"
    }

    async fn resolve(&self, headers: &HeaderMap, _extensions: &Extensions) -> Result<Option<OwnerRef>> {
        let credentials: BTreeMap<u8, String> = self
            .headers
            .iter()
            .filter_map(|(header, code)| {
                let value = headers.get(header.as_str())?.to_str().ok()?.trim();
                (!value.is_empty()).then(|| (*code, value.to_string()))
            })
            .collect();

        if credentials.is_empty() {
            return Ok(None);
        }
        self.provider.retrieve_by_credentials(&credentials).await
    }
}

/// Tries each resolver in order.
#[derive(Clone, Default)]
pub struct ChainedOwnerResolver {
    resolvers: Vec<Arc<dyn OwnerResolver>>,
}

impl ChainedOwnerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn OwnerResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[async_trait]
impl OwnerResolver for ChainedOwnerResolver {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn resolve(&self, headers: &HeaderMap, extensions: &Extensions) -> Result<Option<OwnerRef>> {
        for resolver in &self.resolvers {
            if let Some(owner) = resolver.resolve(headers, extensions).await? {
                debug!(resolver = resolver.name(), owner = %owner, "Resolved request owner");
                return Ok(Some(owner));
            }
        }
        Ok(None)
    }
}

pub type ResolverState = Arc<dyn OwnerResolver>;

/// Attach the resolved owner, if any, to the request. Never rejects on its own.
pub async fn resolve_owner(
    State(resolver): State<ResolverState>,
    mut request: Request<Body>,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    match resolver.resolve(request.headers(), request.extensions()).await {
        Ok(Some(owner)) => {
            request.extensions_mut().insert(AuthenticatedOwner(owner));
        }
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "owner resolution failed");
            return Err(err.into());
        }
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_trusted_header_resolver() {
        let resolver = TrustedHeaderOwnerResolver::new("x-owner-id", "users");
        let mut headers = HeaderMap::new();
        let extensions = Extensions::new();

        assert_eq!(resolver.resolve(&headers, &extensions).await.unwrap(), None);

        headers.insert("x-owner-id", HeaderValue::from_static("42"));
        assert_eq!(
            resolver.resolve(&headers, &extensions).await.unwrap(),
            Some(OwnerRef::new("users", "42"))
        );
    }

    #[tokio::test]
    async fn test_chain_prefers_first_match() {
        let chain = ChainedOwnerResolver::new()
            .with(Arc::new(ExtensionOwnerResolver))
            .with(Arc::new(TrustedHeaderOwnerResolver::new("x-owner-id", "users")));

        let mut headers = HeaderMap::new();
        headers.insert("x-owner-id", HeaderValue::from_static("7"));
        let mut extensions = Extensions::new();
        assert_eq!(
            chain.resolve(&headers, &extensions).await.unwrap(),
            Some(OwnerRef::new("users", "7"))
        );

        extensions.insert(AuthenticatedOwner(OwnerRef::new("admins", "1")));
        assert_eq!(
            chain.resolve(&headers, &extensions).await.unwrap(),
            Some(OwnerRef::new("admins", "1"))
        );
    }
}
