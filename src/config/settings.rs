//! # Configuration Settings
//!
//! Defines the configuration structure for Vigil: storage, observability,
//! caching, the HTTP surface, the global admission gate and the secret types.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::parse_duration;
use crate::errors::{Result, VigilError};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,

    #[validate(nested)]
    pub database: DatabaseConfig,

    #[validate(nested)]
    pub observability: ObservabilityConfig,

    #[validate(nested)]
    pub cache: CacheConfig,

    #[validate(nested)]
    pub global_middleware: GlobalMiddlewareConfig,

    /// Grace period before stale secrets are hard-deleted; `None` keeps them forever
    pub purge_stale_after: Option<String>,

    /// Run rule validation when secrets are set
    pub validation_enabled: bool,

    /// Configured secret types, in lookup order
    #[validate(nested)]
    pub types: Vec<SecretTypeConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            observability: ObservabilityConfig::default(),
            cache: CacheConfig::default(),
            global_middleware: GlobalMiddlewareConfig::default(),
            purge_stale_after: Some("7 days".to_string()),
            validation_enabled: true,
            types: vec![SecretTypeConfig::password()],
        }
    }
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(|errors| {
            VigilError::config(format!("Invalid configuration: {}", VigilError::from(errors)))
        })?;

        self.validate_custom()
    }

    /// Cross-field checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        let mut keys = HashSet::new();
        let mut codes = HashSet::new();
        let mut accessors = HashSet::new();

        for secret_type in &self.types {
            if !keys.insert(secret_type.key.as_str()) {
                return Err(VigilError::config(format!(
                    "Duplicate secret type key '{}'",
                    secret_type.key
                )));
            }
            if !codes.insert(secret_type.code) {
                return Err(VigilError::config(format!(
                    "Duplicate secret type code {} (type '{}')",
                    secret_type.code, secret_type.key
                )));
            }
            if !accessors.insert(secret_type.accessor_name.as_str()) {
                return Err(VigilError::config(format!(
                    "Duplicate accessor name '{}' (type '{}')",
                    secret_type.accessor_name, secret_type.key
                )));
            }
            secret_type.validate_custom()?;
        }

        for key in &self.global_middleware.types {
            if !keys.contains(key.as_str()) {
                return Err(VigilError::config(format!(
                    "Global middleware references unknown secret type '{}'",
                    key
                )));
            }
        }

        self.purge_stale_after()?;

        Ok(())
    }

    pub fn purge_stale_after(&self) -> Result<Option<Duration>> {
        self.purge_stale_after
            .as_deref()
            .map(|raw| parse_duration("purge_stale_after", raw))
            .transpose()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Page size used when a list request does not ask for one
    #[validate(range(min = 1, max = 1000, message = "Default page size must be between 1 and 1000"))]
    pub default_page_size: i64,

    #[validate(range(min = 1, max = 1000, message = "Max page size must be between 1 and 1000"))]
    pub max_page_size: i64,

    /// Header carrying the owner id when an upstream proxy has already authenticated the caller
    pub trusted_owner_header: Option<String>,

    /// Owner type assigned to callers resolved from headers or credentials
    #[validate(length(min = 1, message = "Owner type cannot be empty"))]
    pub owner_type: String,

    /// Upper bound for buffered request bodies inspected by the verification middleware
    #[validate(range(min = 1024, message = "Max body size must be at least 1KB"))]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            default_page_size: 15,
            max_page_size: 100,
            trusted_owner_header: None,
            owner_type: "users".to_string(),
            max_body_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    #[validate(range(min = 0, max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,

    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/vigil.db".to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// In-memory database shared across the pool's connections
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout_seconds: 0,
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Default filter directive when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    pub json_logging: bool,

    pub enable_metrics: bool,

    #[validate(range(min = 1, max = 65535, message = "Metrics port must be between 1 and 65535"))]
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "vigil".to_string(),
            log_level: "info".to_string(),
            json_logging: false,
            enable_metrics: false,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    pub fn metrics_bind_address(&self) -> Option<String> {
        self.enable_metrics.then(|| format!("0.0.0.0:{}", self.metrics_port))
    }
}

/// Secret lookup cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    #[validate(range(min = 1, message = "Cache must hold at least one entry"))]
    pub max_entries: usize,

    /// TTL for lookups whose records never expire; unset means such lookups are not cached
    pub ttl_without_expiry_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 10_000, ttl_without_expiry_seconds: None }
    }
}

impl CacheConfig {
    pub fn ttl_without_expiry(&self) -> Option<Duration> {
        self.ttl_without_expiry_seconds.filter(|secs| *secs > 0).map(Duration::from_secs)
    }
}

/// Which admission check the global gate applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateMode {
    /// Every configured type must have an active secret
    #[serde(rename = "secrets_active")]
    All,
    /// At least one configured type must have an active secret
    #[serde(rename = "secrets_active_or")]
    Any,
}

/// Global admission gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GlobalMiddlewareConfig {
    pub name: GateMode,

    /// Secret type keys checked on every request
    pub types: Vec<String>,

    /// Path patterns (`*` wildcard) reachable without an active secret
    pub except_routes: Vec<String>,
}

impl Default for GlobalMiddlewareConfig {
    fn default() -> Self {
        Self { name: GateMode::All, types: vec!["password".to_string()], except_routes: vec![] }
    }
}

fn default_max_active_count() -> Option<u32> {
    Some(1)
}

fn default_max_history_count() -> Option<u32> {
    Some(4)
}

fn default_expires_after() -> Option<String> {
    Some("90 days".to_string())
}

fn default_broadcast_expiring_before() -> Option<String> {
    Some("10 days".to_string())
}

fn default_true() -> bool {
    true
}

/// Per-type secret configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecretTypeConfig {
    #[validate(length(min = 1, max = 64, message = "Type key must be 1-64 characters"))]
    pub key: String,

    /// Storage discriminator, 0-255
    pub code: u8,

    #[validate(length(min = 1, message = "Display name cannot be empty"))]
    pub display_name: String,

    #[validate(length(min = 1, message = "Accessor name cannot be empty"))]
    pub accessor_name: String,

    /// Plural collection name; derived from the key when omitted
    #[serde(default)]
    pub relationship_name: Option<String>,

    #[serde(default = "default_max_active_count")]
    pub max_active_count: Option<u32>,

    #[serde(default = "default_max_history_count")]
    pub max_history_count: Option<u32>,

    #[serde(default)]
    pub max_usage_count: Option<u8>,

    #[serde(default = "default_expires_after")]
    pub expires_after: Option<String>,

    #[serde(default = "default_broadcast_expiring_before")]
    pub broadcast_expiring_before: Option<String>,

    #[serde(default = "default_true")]
    pub hashed: bool,

    #[serde(default)]
    pub unique_for_all: bool,

    #[serde(default = "default_true")]
    pub hidden: bool,

    #[serde(default)]
    pub append: bool,
}

impl SecretTypeConfig {
    /// Stock password type
    pub fn password() -> Self {
        Self::new("password", 0, "password")
    }

    /// A type with the stock bounds, hashed and hidden
    pub fn new(key: &str, code: u8, display_name: &str) -> Self {
        Self {
            key: key.to_string(),
            code,
            display_name: display_name.to_string(),
            accessor_name: key.to_string(),
            relationship_name: None,
            max_active_count: default_max_active_count(),
            max_history_count: default_max_history_count(),
            max_usage_count: None,
            expires_after: default_expires_after(),
            broadcast_expiring_before: default_broadcast_expiring_before(),
            hashed: true,
            unique_for_all: false,
            hidden: true,
            append: false,
        }
    }

    fn validate_custom(&self) -> Result<()> {
        if self.unique_for_all && self.hashed {
            return Err(VigilError::config(format!(
                "Secret type '{}' cannot be unique_for_all while hashed",
                self.key
            )));
        }

        if self.broadcast_expiring_before.is_some() && self.expires_after.is_none() {
            return Err(VigilError::config(format!(
                "Secret type '{}' sets broadcast_expiring_before without expires_after",
                self.key
            )));
        }

        self.expires_after()?;
        self.broadcast_expiring_before()?;

        Ok(())
    }

    pub fn expires_after(&self) -> Result<Option<Duration>> {
        self.expires_after
            .as_deref()
            .map(|raw| parse_duration(&format!("types.{}.expires_after", self.key), raw))
            .transpose()
    }

    pub fn broadcast_expiring_before(&self) -> Result<Option<Duration>> {
        self.broadcast_expiring_before
            .as_deref()
            .map(|raw| {
                parse_duration(&format!("types.{}.broadcast_expiring_before", self.key), raw)
            })
            .transpose()
    }

    pub fn relationship_name(&self) -> String {
        self.relationship_name.clone().unwrap_or_else(|| format!("{}s", self.key))
    }
}
