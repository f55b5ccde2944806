//! # Metrics Collection
//!
//! Prometheus metrics for the secret lifecycle. Recording is a no-op until an
//! exporter is installed, so library code records unconditionally.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use crate::config::ObservabilityConfig;
use crate::errors::{Result, VigilError};

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record secrets persisted by a flush
    pub fn record_secrets_created(&self, type_key: &str, count: usize) {
        let labels = [("type", type_key.to_string())];
        counter!("secrets_created_total", &labels).increment(count as u64);
    }

    /// Record a verification outcome (`success`, `invalid`, `no_active`, `rejected`)
    pub fn record_verification(&self, mode: &str, outcome: &str) {
        let labels = [("mode", mode.to_string()), ("outcome", outcome.to_string())];
        counter!("secret_verifications_total", &labels).increment(1);
    }

    pub fn record_usage_decrement(&self, type_key: &str, exhausted: bool) {
        let labels = [("type", type_key.to_string()), ("exhausted", exhausted.to_string())];
        counter!("secret_usage_decrements_total", &labels).increment(1);
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };
        counter!("secret_cache_lookups_total", "outcome" => outcome).increment(1);
    }

    pub fn update_cache_entries(&self, entries: usize) {
        gauge!("secret_cache_entries").set(entries as f64);
    }

    pub fn record_secrets_purged(&self, type_key: &str, count: u64) {
        let labels = [("type", type_key.to_string())];
        counter!("secrets_purged_total", &labels).increment(count);
    }

    pub fn record_expiring_notifications(&self, type_key: &str, count: usize) {
        let labels = [("type", type_key.to_string())];
        counter!("secret_expiring_notifications_total", &labels).increment(count as u64);
    }

    /// Record a background job run (`succeeded`, `retrying`, `failed`)
    pub fn record_job_run(&self, job: &str, status: &str) {
        let labels = [("job", job.to_string()), ("status", status.to_string())];
        counter!("secret_jobs_total", &labels).increment(1);
    }

    fn describe(&self) {
        describe_counter!("secrets_created_total", Unit::Count, "Secrets persisted");
        describe_counter!(
            "secret_verifications_total",
            Unit::Count,
            "Request-time secret verification outcomes"
        );
        describe_counter!(
            "secret_usage_decrements_total",
            Unit::Count,
            "Usage counter decrements applied after successful verification"
        );
        describe_counter!("secret_cache_lookups_total", Unit::Count, "Active secret cache lookups");
        describe_counter!("secrets_purged_total", Unit::Count, "Secrets hard-deleted by purge");
        describe_counter!(
            "secret_expiring_notifications_total",
            Unit::Count,
            "Expiring-secret notifications emitted"
        );
        describe_counter!("secret_jobs_total", Unit::Count, "Background job runs by status");
    }
}

/// Install the Prometheus exporter when metrics are enabled.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        VigilError::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| VigilError::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    MetricsRecorder::new().describe();

    info!(metrics_addr = %metrics_addr, service_name = %config.service_name, "Metrics collection initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        let recorder = MetricsRecorder::new();
        recorder.record_secrets_created("password", 2);
        recorder.record_verification("all", "success");
        recorder.record_cache_lookup(true);
        recorder.record_job_run("purge_stale_secrets", "succeeded");
    }

    #[test]
    fn test_metrics_disabled_skips_exporter() {
        let config = ObservabilityConfig { enable_metrics: false, ..Default::default() };
        assert!(init_metrics(&config).is_ok());
    }
}
