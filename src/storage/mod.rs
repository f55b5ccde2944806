//! # Storage and Persistence
//!
//! SQLite connectivity, embedded migrations and the secret repository.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use crate::config::DatabaseConfig;

pub use migrations::{
    list_applied_migrations, run_migrations, validate_migrations, MigrationInfo,
};
pub use pool::{create_pool, DbPool};
pub use repositories::{SecretOrder, SecretQuery, SecretRepository, SortColumn};
