//! Expiry warnings.
//!
//! For every type with both `expires_after` and `broadcast_expiring_before`,
//! active secrets expiring inside the warning window are handed to the
//! configured [`ExpiringNotifier`], scanning by id in fixed-size chunks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};

use crate::errors::Result;
use crate::jobs::notifier::{ExpiringNotifier, SecretExpiringEvent};
use crate::jobs::scheduler::{Job, JobScheduler};
use crate::observability::MetricsRecorder;
use crate::secrets::SecretEngine;

const SCAN_CHUNK: i64 = 100;

pub struct CheckSecretsExpirationJob {
    engine: Arc<SecretEngine>,
    notifier: Arc<dyn ExpiringNotifier>,
    type_key: String,
}

impl CheckSecretsExpirationJob {
    pub fn new(engine: Arc<SecretEngine>, notifier: Arc<dyn ExpiringNotifier>, type_key: &str) -> Self {
        Self { engine, notifier, type_key: type_key.to_string() }
    }

    /// Notify every secret of this type inside its warning window; returns how many.
    #[instrument(skip(self), fields(secret_type = %self.type_key), name = "check_secrets_expiration")]
    pub async fn check(&self) -> Result<usize> {
        let now = Utc::now();
        let mut after_id = None;
        let mut notified = 0;

        loop {
            let chunk = self.engine.expiring_secrets(&self.type_key, now, after_id, SCAN_CHUNK).await?;
            let Some(last) = chunk.last() else {
                break;
            };
            after_id = Some(last.id);

            for secret in &chunk {
                self.notifier.secret_expiring(SecretExpiringEvent::new(secret, &self.type_key)).await?;
                notified += 1;
            }
            if (chunk.len() as i64) < SCAN_CHUNK {
                break;
            }
        }

        MetricsRecorder::new().record_expiring_notifications(&self.type_key, notified);
        info!(secret_type = %self.type_key, notified, "Expiration check finished");
        Ok(notified)
    }
}

#[async_trait]
impl Job for CheckSecretsExpirationJob {
    fn name(&self) -> &'static str {
        "check_secrets_expiration"
    }

    fn unique_key(&self) -> String {
        self.type_key.clone()
    }

    async fn run(&self) -> Result<()> {
        self.check().await.map(|_| ())
    }
}

/// One expiration job per type that warns before expiry.
pub fn expiration_jobs(
    engine: &Arc<SecretEngine>,
    notifier: &Arc<dyn ExpiringNotifier>,
) -> Vec<CheckSecretsExpirationJob> {
    engine
        .registry()
        .expiring_types()
        .map(|policy| CheckSecretsExpirationJob::new(Arc::clone(engine), Arc::clone(notifier), &policy.key))
        .collect()
}

/// Queue an immediate expiration check for every eligible type. Returns how many were queued.
pub fn dispatch_expiration_checks(
    scheduler: &JobScheduler,
    engine: &Arc<SecretEngine>,
    notifier: &Arc<dyn ExpiringNotifier>,
) -> usize {
    let mut queued = 0;
    for job in expiration_jobs(engine, notifier) {
        if scheduler.schedule(Arc::new(job), Duration::ZERO) {
            queued += 1;
        }
    }
    queued
}

/// Run every eligible expiration check inline; returns notifications per type.
pub async fn check_all_expirations(
    engine: &Arc<SecretEngine>,
    notifier: &Arc<dyn ExpiringNotifier>,
) -> Result<Vec<(String, usize)>> {
    let mut results = Vec::new();
    for job in expiration_jobs(engine, notifier) {
        let notified = job.check().await?;
        results.push((job.type_key, notified));
    }
    Ok(results)
}

/// Job wrapper that queues every expiration check; used for the daily schedule.
pub struct DispatchExpirationChecksJob {
    scheduler: JobScheduler,
    engine: Arc<SecretEngine>,
    notifier: Arc<dyn ExpiringNotifier>,
}

impl DispatchExpirationChecksJob {
    pub fn new(scheduler: JobScheduler, engine: Arc<SecretEngine>, notifier: Arc<dyn ExpiringNotifier>) -> Self {
        Self { scheduler, engine, notifier }
    }
}

#[async_trait]
impl Job for DispatchExpirationChecksJob {
    fn name(&self) -> &'static str {
        "dispatch_expiration_checks"
    }

    fn unique_key(&self) -> String {
        "all".to_string()
    }

    async fn run(&self) -> Result<()> {
        let queued = dispatch_expiration_checks(&self.scheduler, &self.engine, &self.notifier);
        info!(queued, "Queued expiration checks");
        Ok(())
    }
}
