//! Secret records and pending drafts.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::id::SecretUuid;
use super::owner::OwnerRef;

/// Lifecycle state derived from the record's markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecretState {
    Active,
    Expired,
    Disabled,
    UsedUp,
    Trashed,
}

impl SecretState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretState::Active => "active",
            SecretState::Expired => "expired",
            SecretState::Disabled => "disabled",
            SecretState::UsedUp => "used_up",
            SecretState::Trashed => "trashed",
        }
    }
}

impl fmt::Display for SecretState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted secret record.
#[derive(Clone, PartialEq)]
pub struct Secret {
    pub id: i64,
    pub uuid: SecretUuid,
    pub owner_type: String,
    pub owner_id: String,
    pub type_code: u8,
    /// Raw value, or its PHC hash string when `hashed`
    pub value: String,
    pub description: Option<String>,
    pub hashed: bool,
    pub usage_left: Option<u8>,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type.clone(), self.owner_id.clone())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SecretState {
        if self.deleted_at.is_some() {
            SecretState::Trashed
        } else if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            SecretState::Expired
        } else if self.disabled_at.is_some() {
            SecretState::Disabled
        } else if self.usage_left == Some(0) {
            SecretState::UsedUp
        } else {
            SecretState::Active
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SecretState::Active
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("owner_type", &self.owner_type)
            .field("owner_id", &self.owner_id)
            .field("type_code", &self.type_code)
            .field("hashed", &self.hashed)
            .field("usage_left", &self.usage_left)
            .field("expires_at", &self.expires_at)
            .field("disabled_at", &self.disabled_at)
            .field("deleted_at", &self.deleted_at)
            .finish_non_exhaustive()
    }
}

/// Insert payload for the repository.
#[derive(Debug, Clone)]
pub struct NewSecret {
    pub uuid: SecretUuid,
    pub owner_type: String,
    pub owner_id: String,
    pub type_code: u8,
    pub value: String,
    pub description: Option<String>,
    pub hashed: bool,
    pub usage_left: Option<u8>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A secret that has been validated and hashed but not yet persisted.
#[derive(Debug, Clone)]
pub struct SecretDraft {
    pub uuid: SecretUuid,
    pub type_code: u8,
    pub value: String,
    pub description: Option<String>,
    pub hashed: bool,
    pub usage_left: Option<u8>,
}

struct PendingEntry {
    type_code: u8,
    raw: String,
    draft: SecretDraft,
}

/// Drafts attached to one owner, waiting for the owner's save to flush them.
///
/// Entries are keyed by type and raw value so the same value added twice in
/// one batch yields a single record.
pub struct PendingSecrets {
    owner: OwnerRef,
    entries: Vec<PendingEntry>,
}

impl PendingSecrets {
    pub fn new(owner: OwnerRef) -> Self {
        Self { owner, entries: Vec::new() }
    }

    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// Record the owner id once the owner row exists.
    pub fn bind_owner_id<I: Into<String>>(&mut self, owner_id: I) {
        self.owner.owner_id = Some(owner_id.into());
    }

    /// Adds a draft, replacing an earlier one with the same raw value.
    pub fn upsert(&mut self, raw: &str, draft: SecretDraft) {
        let type_code = draft.type_code;
        match self.entries.iter_mut().find(|e| e.type_code == type_code && e.raw == raw) {
            Some(existing) => existing.draft = draft,
            None => self.entries.push(PendingEntry { type_code, raw: raw.to_string(), draft }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drafts(&self) -> impl Iterator<Item = &SecretDraft> {
        self.entries.iter().map(|e| &e.draft)
    }

    pub fn type_codes(&self) -> BTreeSet<u8> {
        self.entries.iter().map(|e| e.type_code).collect()
    }

    /// Drains the drafts in insertion order, dropping the raw values.
    pub fn take(&mut self) -> Vec<SecretDraft> {
        self.entries.drain(..).map(|e| e.draft).collect()
    }
}

impl fmt::Debug for PendingSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSecrets")
            .field("owner", &self.owner)
            .field("drafts", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn secret() -> Secret {
        let now = Utc::now();
        Secret {
            id: 1,
            uuid: SecretUuid::new(),
            owner_type: "users".into(),
            owner_id: "1".into(),
            type_code: 0,
            value: "raw".into(),
            description: None,
            hashed: false,
            usage_left: None,
            expires_at: None,
            disabled_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(value: &str) -> SecretDraft {
        SecretDraft {
            uuid: SecretUuid::new(),
            type_code: 0,
            value: value.to_string(),
            description: None,
            hashed: false,
            usage_left: None,
        }
    }

    #[test]
    fn test_state_precedence() {
        let now = Utc::now();
        let mut s = secret();
        assert_eq!(s.state_at(now), SecretState::Active);

        s.usage_left = Some(0);
        assert_eq!(s.state_at(now), SecretState::UsedUp);

        s.disabled_at = Some(now);
        assert_eq!(s.state_at(now), SecretState::Disabled);

        s.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(s.state_at(now), SecretState::Expired);

        s.deleted_at = Some(now);
        assert_eq!(s.state_at(now), SecretState::Trashed);
    }

    #[test]
    fn test_future_expiry_is_active() {
        let now = Utc::now();
        let mut s = secret();
        s.expires_at = Some(now + Duration::days(1));
        s.usage_left = Some(2);
        assert!(s.is_active_at(now));
    }

    #[test]
    fn test_pending_upsert_dedupes_raw_values() {
        let mut pending = PendingSecrets::new(OwnerRef::unsaved("users"));
        pending.upsert("hunter2", draft("first"));
        pending.upsert("hunter2", draft("second"));
        pending.upsert("other", draft("third"));

        assert_eq!(pending.len(), 2);
        let values: Vec<_> = pending.drafts().map(|d| d.value.clone()).collect();
        assert_eq!(values, vec!["second", "third"]);

        let drained = pending.take();
        assert_eq!(drained.len(), 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_debug_redacts_value() {
        let rendered = format!("{:?}", secret());
        assert!(!rendered.contains("raw"));
    }
}
