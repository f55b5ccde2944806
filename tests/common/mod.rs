//! Shared setup for integration tests: an in-memory database with migrations
//! applied and a fully wired application context.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use chrono::{DateTime, Duration, Utc};
use vigil::config::{AppConfig, DatabaseConfig, SecretTypeConfig};
use vigil::domain::{NewSecret, OwnerRef, PendingSecrets, Secret, SecretUuid};
use vigil::secrets::{hash_value, SecretInput};
use vigil::AppContext;

pub const STRONG_PASSWORD: &str = "CorrectHorse42";

pub fn password_type() -> SecretTypeConfig {
    SecretTypeConfig::password()
}

/// Plain-text PIN with three uses and no expiry.
pub fn pin_type() -> SecretTypeConfig {
    let mut pin = SecretTypeConfig::new("pin", 1, "PIN");
    pin.hashed = false;
    pin.max_usage_count = Some(3);
    pin.expires_after = None;
    pin.broadcast_expiring_before = None;
    pin
}

/// Globally unique login identifier.
pub fn email_type() -> SecretTypeConfig {
    let mut email = SecretTypeConfig::new("email", 2, "email address");
    email.hashed = false;
    email.hidden = false;
    email.unique_for_all = true;
    email.expires_after = None;
    email.broadcast_expiring_before = None;
    email
}

/// In-memory configuration; the global gate only covers `password` when it is registered.
pub fn test_config(types: Vec<SecretTypeConfig>) -> AppConfig {
    let mut config = AppConfig { database: DatabaseConfig::in_memory(), ..AppConfig::default() };
    config.global_middleware.types.retain(|key| types.iter().any(|t| &t.key == key));
    config.types = types;
    config
}

pub async fn test_context(types: Vec<SecretTypeConfig>) -> AppContext {
    context_with(test_config(types)).await
}

pub async fn context_with(config: AppConfig) -> AppContext {
    config.validate().expect("valid test configuration");
    AppContext::build(config).await.expect("build application context")
}

pub fn user(id: &str) -> OwnerRef {
    OwnerRef::new("users", id)
}

/// Set and flush one value through the regular write path.
pub async fn store(context: &AppContext, owner: &OwnerRef, accessor: &str, value: &str) -> Vec<Secret> {
    let mut pending = PendingSecrets::new(owner.clone());
    context
        .engine
        .set_secret(&mut pending, accessor, &SecretInput::plain(value))
        .await
        .expect("set secret");
    context.engine.flush(&mut pending).await.expect("flush secrets")
}

/// Insert a record directly with explicit timestamps.
pub async fn insert_at(
    context: &AppContext,
    owner: &OwnerRef,
    type_key: &str,
    value: &str,
    created_at: DateTime<Utc>,
) -> Secret {
    let policy = context.engine.registry().by_key(type_key).expect("registered type");
    let stored = if policy.hashed { hash_value(value).expect("hash value") } else { value.to_string() };

    context
        .engine
        .repository()
        .insert(&NewSecret {
            uuid: SecretUuid::new(),
            owner_type: owner.owner_type.clone(),
            owner_id: owner.id().expect("persisted owner").to_string(),
            type_code: policy.code,
            value: stored,
            description: None,
            hashed: policy.hashed,
            usage_left: policy.max_usage_count,
            expires_at: policy.expires_at_from(created_at),
            created_at,
        })
        .await
        .expect("insert secret")
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
