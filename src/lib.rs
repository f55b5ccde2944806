//! # Vigil
//!
//! Typed, policy-driven secrets for owning entities: passwords, PINs,
//! one-time codes and login identifiers stored per owner with history,
//! usage limits and expiry.
//!
//! ## Architecture
//!
//! ```text
//! HTTP guards / REST API → Secret Verifier → Secret Engine → Repository (SQLite)
//!           ↓                                     ↓
//!   Owner resolution                  Tagged cache · Background jobs
//! ```
//!
//! ## Core Components
//!
//! - **Type registry**: frozen per-type policies loaded from configuration
//! - **Secret engine**: lookups, validation, uniqueness, writes and purges
//! - **Verifier**: AND/OR evaluation of route requirements with usage decrements
//! - **Jobs**: deferred stale purges and expiry warnings

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod jobs;
pub mod observability;
pub mod secrets;
pub mod startup;
pub mod storage;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Result, VigilError};
pub use startup::AppContext;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "vigil");
    }
}
