//! Request-side integration: resolving the calling owner, verifying
//! route-required secrets and the global active-secret gate.

pub mod credentials;
pub mod middleware;
pub mod resolver;

pub use credentials::CredentialProvider;
pub use middleware::{ensure_active_secrets, require_secrets, ActiveSecretsGate, SecretGuard};
pub use resolver::{
    resolve_owner, AuthenticatedOwner, ChainedOwnerResolver, CredentialOwnerResolver,
    ExtensionOwnerResolver, OwnerResolver, ResolverState, TrustedHeaderOwnerResolver,
};
