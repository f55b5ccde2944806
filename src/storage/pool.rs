//! # Database Connection Pool Management
//!
//! SQLite pool creation with WAL journaling and a busy timeout.

use crate::config::DatabaseConfig;
use crate::errors::{Result, VigilError};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{str::FromStr, time::Duration};

/// Type alias for the database connection pool
pub type DbPool = Pool<Sqlite>;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a database connection pool with the specified configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    validate_config(config)?;

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .test_before_acquire(true);

    if let Some(idle_timeout) = config.idle_timeout() {
        pool_options = pool_options.idle_timeout(idle_timeout);
    }

    // In-memory databases vanish with their last connection; keep one alive for the pool's lifetime.
    if config.is_in_memory() {
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let mut connect_options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| {
            VigilError::database(
                e,
                format!("Invalid SQLite connection string: {}", sanitize_url(&config.url)),
            )
        })?
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .foreign_keys(true);

    if !config.is_in_memory() {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = pool_options.connect_with(connect_options).await.map_err(|e| {
        tracing::error!(
            error = %e,
            url = %sanitize_url(&config.url),
            busy_timeout_ms = SQLITE_BUSY_TIMEOUT.as_millis(),
            "Failed to create SQLite database pool"
        );
        VigilError::database(
            e,
            format!("Failed to connect to database: {}", sanitize_url(&config.url)),
        )
    })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_ms = config.connect_timeout().as_millis(),
        idle_timeout_ms = config.idle_timeout().map(|d| d.as_millis()),
        in_memory = config.is_in_memory(),
        "Database connection pool created"
    );

    if config.auto_migrate {
        tracing::info!("Auto-migration enabled, running database migrations");
        crate::storage::migrations::run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Validate database configuration
fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(VigilError::config("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(VigilError::config("min_connections cannot be greater than max_connections"));
    }

    if !config.url.starts_with("sqlite:") {
        return Err(VigilError::config("Database URL must start with 'sqlite:'"));
    }

    if config.is_in_memory() && config.max_connections > 1 {
        return Err(VigilError::config(
            "In-memory databases require max_connections = 1 so every query sees the same database",
        ));
    }

    Ok(())
}

/// Strip query parameters that may carry credentials or keys
fn sanitize_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?…", base),
        None => url.to_string(),
    }
}
