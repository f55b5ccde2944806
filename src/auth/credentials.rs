//! Login by unique credential.
//!
//! Types that are globally unique and stored in plain text (an email
//! address, a username) identify their owner on their own. The provider maps
//! `{type code: value}` pairs back to that owner.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::domain::OwnerRef;
use crate::errors::{Result, VigilError};
use crate::secrets::SecretEngine;

#[derive(Clone)]
pub struct CredentialProvider {
    engine: Arc<SecretEngine>,
}

impl CredentialProvider {
    pub fn new(engine: Arc<SecretEngine>) -> Self {
        Self { engine }
    }

    /// Whether any registered type can act as a credential.
    pub fn is_available(&self) -> bool {
        self.engine.registry().credential_types().next().is_some()
    }

    /// Owner holding an active secret for every pair, or `None`.
    ///
    /// Codes must belong to credential types; anything else is rejected.
    #[instrument(skip(self, credentials), fields(pairs = credentials.len()), name = "retrieve_by_credentials")]
    pub async fn retrieve_by_credentials(&self, credentials: &BTreeMap<u8, String>) -> Result<Option<OwnerRef>> {
        if credentials.is_empty() {
            return Ok(None);
        }

        let mut candidates: Option<Vec<OwnerRef>> = None;
        for (&code, value) in credentials {
            let policy = self.engine.registry().by_code(code)?;
            if !policy.is_credential() {
                return Err(VigilError::invalid_input(format!(
                    "Secret type '{}' cannot be used as a login credential",
                    policy.key
                )));
            }

            let owners = self.engine.repository().find_owners_by_credential(code, value).await?;
            candidates = Some(match candidates {
                None => owners,
                Some(previous) => previous.into_iter().filter(|owner| owners.contains(owner)).collect(),
            });

            if candidates.as_ref().is_some_and(Vec::is_empty) {
                return Ok(None);
            }
        }

        // More than one owner left means the credentials do not identify anyone.
        Ok(match candidates {
            Some(owners) if owners.len() == 1 => owners.into_iter().next(),
            Some(owners) => {
                warn!(owners = owners.len(), "Credentials match several owners");
                None
            }
            None => None,
        })
    }
}
