//! Expiring-secret notification channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::info;

use crate::domain::{OwnerRef, Secret, SecretUuid};
use crate::errors::{Result, VigilError};

/// Emitted once per secret found inside its type's warning window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretExpiringEvent {
    pub secret_id: i64,
    pub uuid: SecretUuid,
    pub owner: OwnerRef,
    pub type_key: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SecretExpiringEvent {
    pub fn new(secret: &Secret, type_key: &str) -> Self {
        Self {
            secret_id: secret.id,
            uuid: secret.uuid.clone(),
            owner: secret.owner(),
            type_key: type_key.to_string(),
            expires_at: secret.expires_at,
        }
    }
}

#[async_trait]
pub trait ExpiringNotifier: Send + Sync {
    async fn secret_expiring(&self, event: SecretExpiringEvent) -> Result<()>;
}

/// Writes one structured log line per expiring secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl ExpiringNotifier for LoggingNotifier {
    async fn secret_expiring(&self, event: SecretExpiringEvent) -> Result<()> {
        info!(
            secret_uuid = %event.uuid,
            owner = %event.owner,
            secret_type = %event.type_key,
            expires_at = ?event.expires_at,
            "Secret is about to expire"
        );
        Ok(())
    }
}

/// Forwards events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<SecretExpiringEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SecretExpiringEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ExpiringNotifier for ChannelNotifier {
    async fn secret_expiring(&self, event: SecretExpiringEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| VigilError::internal("Expiring notification receiver dropped"))
    }
}
