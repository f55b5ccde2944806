//! # Background Jobs
//!
//! Keyed deferred work: the per-owner stale purge and the per-type expiry
//! warning, both run through [`JobScheduler`].

pub mod expiration;
pub mod notifier;
pub mod purge;
pub mod scheduler;

pub use expiration::{
    check_all_expirations, dispatch_expiration_checks, CheckSecretsExpirationJob,
    DispatchExpirationChecksJob,
};
pub use notifier::{ChannelNotifier, ExpiringNotifier, LoggingNotifier, SecretExpiringEvent};
pub use purge::PurgeStaleSecretsJob;
pub use scheduler::{Job, JobScheduler, RetryPolicy};
