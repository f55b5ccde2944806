//! # Command Line Interface
//!
//! Database maintenance, on-demand secret jobs and the HTTP server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::server::{ctrl_c, start_api_server};
use crate::config::{format_duration, AppConfig};
use crate::domain::{OwnerRef, SecretTypePolicy};
use crate::jobs::{check_all_expirations, DispatchExpirationChecksJob};
use crate::observability::{init_observability, log_config_info};
use crate::startup::AppContext;
use crate::storage::{
    create_pool, list_applied_migrations, run_migrations, validate_migrations, MigrationInfo,
};

/// How often the server queues expiration checks
const EXPIRATION_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Typed owner secrets with verification guards")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL override
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Database management commands
    Database {
        #[command(subcommand)]
        command: DatabaseCommands,
    },

    /// Secret maintenance commands
    Secrets {
        #[command(subcommand)]
        command: SecretsCommands,
    },

    /// Run the HTTP API and the daily expiration checks
    Serve,
}

#[derive(Subcommand)]
pub enum DatabaseCommands {
    /// Run pending migrations
    Migrate {
        /// Only report whether migrations are pending
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status
    Status,

    /// List all applied migrations
    List,
}

#[derive(Subcommand)]
pub enum SecretsCommands {
    /// Notify owners whose secrets are about to expire
    CheckExpiration,

    /// Remove one owner's stale secrets now
    Purge {
        /// Owner type, e.g. `users`
        #[arg(long)]
        owner_type: String,

        /// Owner id
        #[arg(long)]
        owner_id: String,
    },

    /// List the registered secret types
    Types,
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    match cli.command {
        Commands::Database { command } => {
            initialise_logging(cli.verbose)?;
            handle_database_command(command, &config).await?
        }
        Commands::Secrets { command } => {
            initialise_logging(cli.verbose)?;
            handle_secrets_command(command, config).await?
        }
        Commands::Serve => serve(config).await?,
    }

    Ok(())
}

fn initialise_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    if tracing::subscriber::set_global_default(FmtSubscriber::builder().with_env_filter(filter).finish())
        .is_err()
    {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }
    Ok(())
}

/// Handle database management commands
async fn handle_database_command(command: DatabaseCommands, config: &AppConfig) -> anyhow::Result<()> {
    let pool = create_pool(&config.database).await?;

    match command {
        DatabaseCommands::Migrate { dry_run } => {
            if dry_run {
                if validate_migrations(&pool).await? {
                    println!("No pending migrations");
                } else {
                    println!("Pending migrations would be applied");
                }
            } else {
                println!("Running database migrations...");
                run_migrations(&pool).await?;
                println!("Migrations completed successfully!");
            }
        }

        DatabaseCommands::Status => {
            if validate_migrations(&pool).await? {
                println!("✅ Database schema is up to date");
            } else {
                println!("⚠️  Database schema has pending migrations");
                std::process::exit(1);
            }
        }

        DatabaseCommands::List => {
            let migrations = list_applied_migrations(&pool).await?;
            if migrations.is_empty() {
                println!("No migrations have been applied");
            } else {
                println!("Applied migrations:");
                print_migrations_table(&migrations);
            }
        }
    }

    Ok(())
}

/// Handle secret maintenance commands
async fn handle_secrets_command(command: SecretsCommands, config: AppConfig) -> anyhow::Result<()> {
    let context = AppContext::build(config).await?;

    match command {
        SecretsCommands::CheckExpiration => {
            let results = check_all_expirations(&context.engine, &context.notifier).await?;
            if results.is_empty() {
                println!("No secret type warns before expiry");
            }
            for (type_key, notified) in results {
                println!("{:<20} {} owner(s) notified", type_key, notified);
            }
        }

        SecretsCommands::Purge { owner_type, owner_id } => {
            let owner = OwnerRef::new(owner_type, owner_id);
            let purged = context.engine.purge_stale_secrets(&owner).await?;
            println!("Purged {} stale secret(s) of {}", purged, owner);
        }

        SecretsCommands::Types => print_types_table(context.engine.registry().types()),
    }

    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    init_observability(&config.observability)?;
    log_config_info(&config);

    let context = AppContext::build(config).await?;
    let router = context.router()?;

    context.scheduler.spawn_periodic(
        Arc::new(DispatchExpirationChecksJob::new(
            context.scheduler.clone(),
            Arc::clone(&context.engine),
            Arc::clone(&context.notifier),
        )),
        EXPIRATION_CHECK_INTERVAL,
    );

    let result = start_api_server(&context.config.server, router, ctrl_c()).await;

    info!(pending_jobs = context.scheduler.pending_count(), "Stopping background jobs");
    context.scheduler.shutdown().await;
    result?;

    info!("Vigil shutdown completed");
    Ok(())
}

/// Print migrations in a formatted table
fn print_migrations_table(migrations: &[MigrationInfo]) {
    println!();
    println!("{:<15} {:<50} {:<25} {:<10}", "Version", "Description", "Applied On", "Time (ms)");
    println!("{}", "-".repeat(100));

    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<25} {:<10}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            migration.execution_time
        );
    }
}

fn print_types_table(types: &[SecretTypePolicy]) {
    println!(
        "{:<16} {:<5} {:<16} {:<7} {:<8} {:<6} {:<12} {:<10}",
        "Key", "Code", "Accessor", "Active", "History", "Usage", "Expires", "Credential"
    );
    println!("{}", "-".repeat(90));

    for policy in types {
        println!(
            "{:<16} {:<5} {:<16} {:<7} {:<8} {:<6} {:<12} {:<10}",
            truncate_string(&policy.key, 15),
            policy.code,
            truncate_string(&policy.accessor_name, 15),
            limit_label(policy.max_active_count),
            limit_label(policy.max_history_count),
            limit_label(policy.max_usage_count),
            policy
                .expires_after
                .and_then(|d| d.to_std().ok())
                .map(format_duration)
                .unwrap_or_else(|| "never".to_string()),
            if policy.is_credential() { "yes" } else { "no" }
        );
    }
}

fn limit_label<N: std::fmt::Display>(limit: Option<N>) -> String {
    limit.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to a maximum length
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_purge_command() {
        let cli = Cli::parse_from([
            "vigil",
            "secrets",
            "purge",
            "--owner-type",
            "users",
            "--owner-id",
            "42",
        ]);
        match cli.command {
            Commands::Secrets { command: SecretsCommands::Purge { owner_type, owner_id } } => {
                assert_eq!(owner_type, "users");
                assert_eq!(owner_id, "42");
            }
            _ => panic!("expected secrets purge"),
        }
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["vigil", "database", "status", "--config", "vigil.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("vigil.yaml")));
        assert!(matches!(cli.command, Commands::Database { command: DatabaseCommands::Status }));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a_very_long_description", 10), "a_very_...");
    }
}
