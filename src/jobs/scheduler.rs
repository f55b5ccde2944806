//! Keyed deferred job scheduler.
//!
//! Jobs are identified by `name:unique_key`. Scheduling a key that is already
//! pending or running collapses into the existing run. Failed runs retry with
//! exponential backoff when the error is retryable.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::errors::Result;
use crate::observability::MetricsRecorder;

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    /// Identity used to collapse duplicate schedules of the same work.
    fn unique_key(&self) -> String;

    async fn run(&self) -> Result<()>;
}

/// Backoff settings for failed runs.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry_count` (1-based).
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1) as i32;
        let delay = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(delay).min(self.max_delay)
    }
}

struct SchedulerInner {
    pending: DashMap<String, ()>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    retry: RetryPolicy,
    metrics: MetricsRecorder,
}

#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<SchedulerInner>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl JobScheduler {
    pub fn new(retry: RetryPolicy) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(SchedulerInner {
                pending: DashMap::new(),
                shutdown_tx,
                handles: Mutex::new(Vec::new()),
                retry,
                metrics: MetricsRecorder::new(),
            }),
        }
    }

    fn job_key(job: &dyn Job) -> String {
        format!("{}:{}", job.name(), job.unique_key())
    }

    /// Run `job` once after `delay`. Returns `false` when the same key is
    /// already pending, in which case nothing new is scheduled.
    pub fn schedule(&self, job: Arc<dyn Job>, delay: Duration) -> bool {
        let key = Self::job_key(job.as_ref());
        match self.inner.pending.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::debug!(job_key = %key, "Job already pending, collapsing schedule");
                return false;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = run_with_retry(job.as_ref(), &inner.retry, &inner.metrics).await;
                }
                _ = shutdown_rx.recv() => {
                    info!(job_key = %key, "Dropping pending job on shutdown");
                }
            }
            inner.pending.remove(&key);
        });

        self.track(handle);
        true
    }

    /// Run `job` every `interval` until shutdown.
    pub fn spawn_periodic(&self, job: Arc<dyn Job>, interval: Duration) {
        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let _ = run_with_retry(job.as_ref(), &inner.retry, &inner.metrics).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!(job = job.name(), "Shutting down periodic job");
                        break;
                    }
                }
            }
        });

        self.track(handle);
    }

    /// Run `job` inline with the scheduler's retry policy.
    pub async fn run_now(&self, job: &dyn Job) -> Result<()> {
        run_with_retry(job, &self.inner.retry, &self.inner.metrics).await
    }

    pub fn is_pending(&self, job: &dyn Job) -> bool {
        self.inner.pending.contains_key(&Self::job_key(job))
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut handles) = self.inner.handles.lock() {
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
    }

    /// Cancel pending delays and wait for running jobs to finish.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(());

        let handles: Vec<_> = match self.inner.handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.await;
        }

        info!("Job scheduler shut down");
    }
}

async fn run_with_retry(job: &dyn Job, retry: &RetryPolicy, metrics: &MetricsRecorder) -> Result<()> {
    let mut retry_count = 0u32;
    let run_id = uuid::Uuid::new_v4();

    loop {
        match job.run().await {
            Ok(()) => {
                metrics.record_job_run(job.name(), "succeeded");
                info!(job = job.name(), key = %job.unique_key(), run_id = %run_id, "Job completed successfully");
                return Ok(());
            }
            Err(e) if e.is_retryable() && retry_count < retry.max_retries => {
                retry_count += 1;
                let delay = retry.backoff_delay(retry_count);
                metrics.record_job_run(job.name(), "retrying");
                warn!(
                    job = job.name(),
                    run_id = %run_id,
                    retry_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Job failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                metrics.record_job_run(job.name(), "failed");
                warn!(job = job.name(), run_id = %run_id, error = %e, "Job failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VigilError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracing_test::traced_test;

    struct CountingJob {
        key: String,
        runs: Arc<AtomicU32>,
        failures_before_success: u32,
        retryable: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn unique_key(&self) -> String {
            self.key.clone()
        }

        async fn run(&self) -> Result<()> {
            let attempt = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures_before_success {
                if self.retryable {
                    return Err(VigilError::database(sqlx::Error::PoolTimedOut, "transient"));
                }
                return Err(VigilError::internal("permanent"));
            }
            Ok(())
        }
    }

    fn job(key: &str, runs: &Arc<AtomicU32>, failures: u32, retryable: bool) -> Arc<CountingJob> {
        Arc::new(CountingJob {
            key: key.to_string(),
            runs: Arc::clone(runs),
            failures_before_success: failures,
            retryable,
        })
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            factor: 2.0,
        }
    }

    #[test]
    fn test_backoff_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_duplicate_schedules_collapse() {
        let scheduler = JobScheduler::new(fast_retry());
        let runs = Arc::new(AtomicU32::new(0));

        assert!(scheduler.schedule(job("users:1", &runs, 0, false), Duration::from_millis(20)));
        assert!(!scheduler.schedule(job("users:1", &runs, 0, false), Duration::from_millis(20)));
        assert!(scheduler.schedule(job("users:2", &runs, 0, false), Duration::from_millis(20)));
        assert_eq!(scheduler.pending_count(), 2);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_retryable_failures_are_retried() {
        let scheduler = JobScheduler::new(fast_retry());
        let runs = Arc::new(AtomicU32::new(0));

        scheduler.run_now(job("k", &runs, 2, true).as_ref()).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let scheduler = JobScheduler::new(fast_retry());
        let runs = Arc::new(AtomicU32::new(0));

        assert!(scheduler.run_now(job("k", &runs, 5, false).as_ref()).await.is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Job failed"));
        assert!(!logs_contain("retrying"));
    }

    #[tokio::test]
    async fn test_shutdown_drops_pending_jobs() {
        let scheduler = JobScheduler::new(fast_retry());
        let runs = Arc::new(AtomicU32::new(0));

        scheduler.schedule(job("later", &runs, 0, false), Duration::from_secs(60));
        scheduler.shutdown().await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }
}
