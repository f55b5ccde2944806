//! # Database Migration Management
//!
//! Schema migrations are embedded in the binary and applied in filename order.
//! Each applied migration is recorded with a checksum in `_vigil_migrations`.

use crate::errors::{Result, VigilError};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{error, info, warn};

/// Embedded migrations as `(filename stem, sql)`, sorted by version
const MIGRATIONS: &[(&str, &str)] = &[(
    "20250101000001_create_secrets_table",
    include_str!("../../migrations/20250101000001_create_secrets_table.sql"),
)];

/// Migration information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: chrono::DateTime<chrono::Utc>,
    pub execution_time: i64,
    pub checksum: Vec<u8>,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");

    create_migration_table(pool).await?;
    let applied = get_applied_migration_versions(pool).await?;

    let mut migrations_run = 0;
    for (filename, sql) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;

        if applied.contains(&version) {
            info!(version = version, "Migration already applied: {}", filename);
            continue;
        }

        info!(version = version, "Running migration: {}", filename);
        let start_time = std::time::Instant::now();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| VigilError::database(e, "Failed to start migration transaction"))?;

        sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
            error!(error = %e, migration = filename, "Migration failed");
            VigilError::database(e, format!("Migration failed: {}", filename))
        })?;

        let execution_time = start_time.elapsed().as_millis() as i64;
        let checksum = calculate_checksum(sql);

        sqlx::query(
            "INSERT INTO _vigil_migrations (version, description, checksum, execution_time, installed_on) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(version)
        .bind(*filename)
        .bind(&checksum)
        .bind(execution_time)
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, migration = filename, "Failed to record migration");
            VigilError::database(e, format!("Failed to record migration: {}", filename))
        })?;

        tx.commit()
            .await
            .map_err(|e| VigilError::database(e, "Failed to commit migration transaction"))?;

        migrations_run += 1;
        info!(version = version, execution_time_ms = execution_time, "Migration completed: {}", filename);
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _vigil_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            checksum BLOB NOT NULL,
            execution_time INTEGER NOT NULL,
            installed_on TEXT NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| VigilError::database(e, "Failed to create migration tracking table"))?;

    Ok(())
}

async fn get_applied_migration_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM _vigil_migrations ORDER BY version")
        .fetch_all(pool)
        .await;

    match rows {
        Ok(rows) => Ok(rows.into_iter().map(|row| row.get::<i64, _>("version")).collect()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("no such table") => {
            Ok(Vec::new())
        }
        Err(e) => Err(VigilError::database(e, "Failed to get applied migrations")),
    }
}

/// Extract version number from migration filename
fn extract_version_from_filename(filename: &str) -> Result<i64> {
    let version_str = filename
        .split('_')
        .next()
        .ok_or_else(|| VigilError::config(format!("Invalid migration filename: {}", filename)))?;

    version_str
        .parse::<i64>()
        .map_err(|_| VigilError::config(format!("Invalid version in filename: {}", filename)))
}

fn calculate_checksum(content: &str) -> Vec<u8> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish().to_le_bytes().to_vec()
}

/// Check that exactly the embedded migrations have been applied
pub async fn validate_migrations(pool: &DbPool) -> Result<bool> {
    let applied_versions = get_applied_migration_versions(pool).await?;
    let expected_versions = MIGRATIONS
        .iter()
        .map(|(filename, _)| extract_version_from_filename(filename))
        .collect::<Result<Vec<_>>>()?;

    for expected in &expected_versions {
        if !applied_versions.contains(expected) {
            warn!(version = expected, "Missing migration");
            return Ok(false);
        }
    }

    for applied in &applied_versions {
        if !expected_versions.contains(applied) {
            warn!(version = applied, "Unexpected migration found");
            return Ok(false);
        }
    }

    Ok(true)
}

/// List all applied migrations
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    let rows = sqlx::query(
        "SELECT version, description, checksum, execution_time, installed_on FROM _vigil_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await;

    match rows {
        Ok(rows) => Ok(rows
            .into_iter()
            .map(|row| MigrationInfo {
                version: row.get("version"),
                description: row.get("description"),
                installed_on: row.get("installed_on"),
                execution_time: row.get("execution_time"),
                checksum: row.get("checksum"),
            })
            .collect()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("no such table") => {
            Ok(Vec::new())
        }
        Err(e) => Err(VigilError::database(e, "Failed to list applied migrations")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> DbPool {
        SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_extract_version_from_filename() {
        assert_eq!(
            extract_version_from_filename("20250101000001_create_secrets_table").unwrap(),
            20250101000001
        );
        assert!(extract_version_from_filename("invalid_filename").is_err());
    }

    #[test]
    fn test_calculate_checksum() {
        let checksum1 = calculate_checksum("CREATE TABLE test (id INTEGER);");
        let checksum2 = calculate_checksum("CREATE TABLE test (id INTEGER);");
        let checksum3 = calculate_checksum("CREATE TABLE other (id INTEGER);");

        assert_eq!(checksum1, checksum2);
        assert_ne!(checksum1, checksum3);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        assert!(list_applied_migrations(&pool).await.unwrap().is_empty());

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let applied = list_applied_migrations(&pool).await.unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());
        assert!(validate_migrations(&pool).await.unwrap());
    }
}
