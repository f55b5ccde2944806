//! Flexible input shapes accepted wherever a secret value is supplied.
//!
//! A value may arrive as a bare string, as `{ "value": .., "description": .. }`,
//! or as an array of either (batch add).

use serde::{Deserialize, Serialize};

use crate::errors::{Result, VigilError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretInput {
    Plain(String),
    Described {
        value: String,
        #[serde(default)]
        description: Option<String>,
    },
    Batch(Vec<SecretInput>),
}

/// One normalized value with its optional description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    pub value: String,
    pub description: Option<String>,
}

impl SecretInput {
    pub fn plain<S: Into<String>>(value: S) -> Self {
        Self::Plain(value.into())
    }

    pub fn described<S: Into<String>, D: Into<String>>(value: S, description: D) -> Self {
        Self::Described { value: value.into(), description: Some(description.into()) }
    }

    /// Interpret a JSON field; anything that is not a string, object or array of those is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|_| {
            VigilError::invalid_input("Secret input must be a string or an array of strings")
        })
    }

    /// Flatten into entries. Batches may not nest and may not be empty.
    pub fn entries(&self) -> Result<Vec<InputEntry>> {
        match self {
            SecretInput::Plain(value) => Ok(vec![InputEntry { value: value.clone(), description: None }]),
            SecretInput::Described { value, description } => {
                Ok(vec![InputEntry { value: value.clone(), description: description.clone() }])
            }
            SecretInput::Batch(items) => {
                if items.is_empty() {
                    return Err(VigilError::invalid_input("Secret input batch must not be empty"));
                }
                items
                    .iter()
                    .map(|item| match item {
                        SecretInput::Batch(_) => Err(VigilError::invalid_input(
                            "Secret input must be a string or an array of strings",
                        )),
                        single => single.entries().map(|mut e| e.remove(0)),
                    })
                    .collect()
            }
        }
    }

    pub fn values(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|entry| entry.value).collect())
    }

    /// Whether the input carries at least one non-blank value.
    pub fn is_present(&self) -> bool {
        match self {
            SecretInput::Plain(value) | SecretInput::Described { value, .. } => !value.trim().is_empty(),
            SecretInput::Batch(items) => items.iter().any(SecretInput::is_present),
        }
    }
}

impl From<&str> for SecretInput {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<String> for SecretInput {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}
