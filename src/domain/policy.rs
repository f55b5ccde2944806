//! Secret type policies.
//!
//! A policy is the frozen, configuration-derived rule set for one category of
//! secret. Policies are assembled once by the registry builder and shared
//! read-only afterwards.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::secrets::rules::SecretRule;

/// Produces a redacted display form for a stored value.
pub type MaskFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct SecretTypePolicy {
    pub key: String,
    /// Compact storage discriminator, unique across types
    pub code: u8,
    pub display_name: String,
    pub accessor_name: String,
    pub relationship_name: String,
    /// `None` means every non-stale secret is active
    pub max_active_count: Option<u32>,
    /// `None` means uniqueness compares against every stored secret
    pub max_history_count: Option<u32>,
    /// `None` means unlimited verifications
    pub max_usage_count: Option<u8>,
    pub expires_after: Option<Duration>,
    pub broadcast_expiring_before: Option<Duration>,
    pub hashed: bool,
    pub unique_for_all: bool,
    pub hidden: bool,
    pub append: bool,
    pub rules: Vec<SecretRule>,
    pub masking: Option<MaskFn>,
}

impl SecretTypePolicy {
    /// Policy with the stock bounds: one active secret, four remembered, hashed and hidden.
    pub fn named(key: &str, code: u8, display_name: &str) -> Self {
        Self {
            key: key.to_string(),
            code,
            display_name: display_name.to_string(),
            accessor_name: key.to_string(),
            relationship_name: format!("{}s", key),
            max_active_count: Some(1),
            max_history_count: Some(4),
            max_usage_count: None,
            expires_after: None,
            broadcast_expiring_before: None,
            hashed: true,
            unique_for_all: false,
            hidden: true,
            append: false,
            rules: Vec::new(),
            masking: None,
        }
    }

    /// Whether lookups for this type yield a bounded set rather than a single record.
    pub fn returns_many(&self) -> bool {
        self.max_active_count.map_or(true, |count| count > 1)
    }

    /// How many recent secrets count towards uniqueness and retention.
    ///
    /// `None` when neither bound is configured.
    pub fn retention_window(&self) -> Option<u32> {
        match (self.max_history_count, self.max_active_count) {
            (Some(history), Some(active)) => Some(history.max(active)),
            (Some(history), None) => Some(history),
            (None, Some(active)) => Some(active),
            (None, None) => None,
        }
    }

    /// Types that can act as a standalone login credential.
    pub fn is_credential(&self) -> bool {
        self.unique_for_all && !self.hashed
    }

    pub fn expires_at_from(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_after.map(|after| created_at + after)
    }

    /// Start of the warning window relative to `now`, when both durations are set.
    pub fn broadcast_horizon(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match (self.expires_after, self.broadcast_expiring_before) {
            (Some(_), Some(before)) => Some(now + before),
            _ => None,
        }
    }

    pub fn mask(&self, value: &str) -> Option<String> {
        self.masking.as_ref().map(|mask| mask(value))
    }
}

impl fmt::Debug for SecretTypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretTypePolicy")
            .field("key", &self.key)
            .field("code", &self.code)
            .field("accessor_name", &self.accessor_name)
            .field("max_active_count", &self.max_active_count)
            .field("max_history_count", &self.max_history_count)
            .field("max_usage_count", &self.max_usage_count)
            .field("expires_after", &self.expires_after)
            .field("broadcast_expiring_before", &self.broadcast_expiring_before)
            .field("hashed", &self.hashed)
            .field("unique_for_all", &self.unique_for_all)
            .field("hidden", &self.hidden)
            .field("rules", &self.rules.len())
            .field("masking", &self.masking.is_some())
            .finish()
    }
}
