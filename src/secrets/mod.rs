//! # Secret Lifecycle
//!
//! Everything between a configured secret type and a verified request:
//!
//! - `registry`: immutable per-type policies assembled at startup
//! - `rules`: validation rules applied before a value is stored
//! - `hashing`: Argon2id hashing and verification of stored values
//! - `input`: flexible input shapes (string, described value, batch)
//! - `cache`: tagged cache for active-secret lookups
//! - `engine`: lookups, uniqueness, the add/flush write path and purges
//! - `expression`: `&`/`|` requirement expressions for route guards
//! - `verifier`: evaluates an expression against supplied values
//! - `usage_lock`: per-secret locks around usage decrements

pub mod cache;
pub mod engine;
pub mod expression;
pub mod hashing;
pub mod input;
pub mod registry;
pub mod rules;
pub mod usage_lock;
pub mod verifier;

pub use cache::{remember, Loaded, MemoryTaggedCache, TaggedCache};
pub use engine::{EngineSettings, SecretDisplay, SecretEngine, SecretListFilter, TrashedFilter};
pub use expression::{ExprMode, SecretExpr};
pub use hashing::{hash_value, verify_value};
pub use input::{InputEntry, SecretInput};
pub use registry::{PolicyRegistry, PolicyRegistryBuilder};
pub use rules::{default_password_rules, SecretRule};
pub use usage_lock::{UsageGuard, UsageLocks};
pub use verifier::{SecretInputs, SecretVerifier, Verification};
