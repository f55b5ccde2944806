//! Deferred hard-delete of secrets beyond each type's retention window.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::OwnerRef;
use crate::errors::Result;
use crate::jobs::scheduler::Job;
use crate::secrets::SecretEngine;

pub struct PurgeStaleSecretsJob {
    engine: Arc<SecretEngine>,
    owner: OwnerRef,
}

impl PurgeStaleSecretsJob {
    pub fn new(engine: Arc<SecretEngine>, owner: OwnerRef) -> Self {
        Self { engine, owner }
    }

    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }
}

#[async_trait]
impl Job for PurgeStaleSecretsJob {
    fn name(&self) -> &'static str {
        "purge_stale_secrets"
    }

    fn unique_key(&self) -> String {
        self.owner.job_key()
    }

    async fn run(&self) -> Result<()> {
        self.engine.purge_stale_secrets(&self.owner).await?;
        Ok(())
    }
}
