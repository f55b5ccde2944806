//! Owner references.
//!
//! Secrets belong to an owning entity identified by a type (its table name)
//! and an id. Owners that have not been saved yet carry no id.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VigilError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: Option<String>,
}

impl OwnerRef {
    pub fn new<T: Into<String>, I: Into<String>>(owner_type: T, owner_id: I) -> Self {
        Self { owner_type: owner_type.into(), owner_id: Some(owner_id.into()) }
    }

    /// An owner that has not been persisted yet.
    pub fn unsaved<T: Into<String>>(owner_type: T) -> Self {
        Self { owner_type: owner_type.into(), owner_id: None }
    }

    pub fn is_persisted(&self) -> bool {
        self.owner_id.is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn require_id(&self) -> Result<&str> {
        self.id().ok_or_else(|| {
            VigilError::invalid_input(format!(
                "{} owner must be persisted before its secrets can be stored",
                self.owner_type
            ))
        })
    }

    /// Cache tags grouping every entry of this owner: `[owner_type, owner_id]`.
    pub fn cache_tags(&self) -> Option<Vec<String>> {
        self.owner_id.as_ref().map(|id| vec![self.owner_type.clone(), id.clone()])
    }

    /// Unique key used to collapse duplicate background work for this owner.
    pub fn job_key(&self) -> String {
        format!("{}:{}", self.owner_type, self.owner_id.as_deref().unwrap_or("unsaved"))
    }

    pub fn is_same(&self, owner_type: &str, owner_id: &str) -> bool {
        self.owner_type == owner_type && self.owner_id.as_deref() == Some(owner_id)
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner_id {
            Some(id) => write!(f, "{}#{}", self.owner_type, id),
            None => write!(f, "{}#unsaved", self.owner_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsaved_owner_has_no_tags() {
        let owner = OwnerRef::unsaved("users");
        assert!(!owner.is_persisted());
        assert!(owner.cache_tags().is_none());
        assert!(owner.require_id().is_err());
        assert_eq!(owner.to_string(), "users#unsaved");
    }

    #[test]
    fn test_persisted_owner_tags() {
        let owner = OwnerRef::new("users", "42");
        assert_eq!(owner.cache_tags(), Some(vec!["users".to_string(), "42".to_string()]));
        assert_eq!(owner.job_key(), "users:42");
        assert!(owner.is_same("users", "42"));
        assert!(!owner.is_same("admins", "42"));
    }
}
