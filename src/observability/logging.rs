//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::errors::{Result, VigilError};

/// Create a tracing span for database operations.
///
/// ```rust,ignore
/// let span = db_span!("secrets.insert", owner_type = "users");
/// ```
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for a secret lifecycle operation on one owner and type.
#[macro_export]
macro_rules! secret_span {
    ($operation:expr, $owner:expr, $type_key:expr) => {
        tracing::info_span!(
            "secret_operation",
            operation = %$operation,
            owner = %$owner,
            secret_type = %$type_key,
            correlation_id = %uuid::Uuid::new_v4()
        )
    };
}

/// Install the global subscriber: `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            VigilError::config_with_source(
                format!("Invalid log level '{}'", config.log_level),
                Box::new(e),
            )
        })?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logging {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| {
        VigilError::config_with_source("Failed to install tracing subscriber", Box::new(e))
    })
}

/// Log the effective configuration at startup without leaking connection strings.
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        bind_address = %config.server.bind_address(),
        database = if config.database.is_in_memory() { "sqlite-memory" } else { "sqlite" },
        secret_types = config.types.len(),
        gate_mode = ?config.global_middleware.name,
        gate_types = ?config.global_middleware.types,
        purge_stale_after = ?config.purge_stale_after,
        "Configuration loaded"
    );
}
