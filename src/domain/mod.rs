//! Domain layer
//!
//! Pure domain entities for the secret lifecycle: owner references, secret
//! records and drafts, and the per-type policies that govern them. Nothing in
//! here performs I/O.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe identifiers with NewType pattern
//! - `owner`: Owning entity references and their cache tags
//! - `policy`: Frozen per-type secret policies
//! - `secret`: Persisted records, lifecycle state and pending drafts

pub mod id;
pub mod owner;
pub mod policy;
pub mod secret;

pub use id::SecretUuid;
pub use owner::OwnerRef;
pub use policy::{MaskFn, SecretTypePolicy};
pub use secret::{NewSecret, PendingSecrets, Secret, SecretDraft, SecretState};
