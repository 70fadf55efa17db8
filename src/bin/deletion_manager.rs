//! Tradelens deletion manager
//!
//! Command-line front end for impact assessment, guarded deletion, backup
//! restore and maintenance statistics over the Tradelens store.
//!
//! # Usage
//! ```sh
//! cargo run --bin deletion-manager -- assess active_trade:42
//! cargo run --bin deletion-manager -- execute chart_analysis:50 --strategy cascade --force --confirm
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tradelens::application::bootstrap::{PersistenceBootstrap, ServicesBootstrap};
use tradelens::config::{Config, LogFormat};
use tradelens::domain::deletion::{DeletableItem, DeletionBackup, DeletionStrategy, LogLevel};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report what deleting the targets would affect
    Assess {
        /// Targets as <type>:<id> (e.g. active_trade:42)
        #[arg(required = true)]
        targets: Vec<DeletableItem>,
    },
    /// Delete the targets with the chosen strategy
    Execute {
        /// Targets as <type>:<id>
        #[arg(required = true)]
        targets: Vec<DeletableItem>,

        /// cascade, preserve or warn_and_stop (defaults to DELETION_DEFAULT_STRATEGY)
        #[arg(short, long)]
        strategy: Option<DeletionStrategy>,

        /// Proceed even when critical dependencies exist
        #[arg(long)]
        force: bool,

        /// Confirm a forced deletion
        #[arg(long)]
        confirm: bool,

        /// Plan only, write nothing
        #[arg(long)]
        dry_run: bool,

        /// Skip the pre-deletion backup
        #[arg(long)]
        no_backup: bool,

        /// Roll back every write if any write fails
        #[arg(long)]
        atomic: bool,

        /// Allow production records to be deleted
        #[arg(long)]
        allow_production: bool,

        /// error, warn, info or debug (defaults to DELETION_LOG_LEVEL)
        #[arg(long)]
        log_level: Option<LogLevel>,

        /// Write the backup taken by this run to a JSON file
        #[arg(long)]
        backup_out: Option<PathBuf>,
    },
    /// Restore records from a backup file written by `execute --backup-out`
    Restore {
        /// Path to the backup JSON
        backup: PathBuf,
    },
    /// Per-type totals, deletable counts and maintenance recommendations
    Stats,
    /// Recent executions from the audit log
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));

    let base = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(base.pretty())
            .init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(base.compact())
            .init(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    init_logging(&config);
    info!(
        "Tradelens deletion manager {} (db={})",
        env!("CARGO_PKG_VERSION"),
        config.database_url
    );

    let persistence = PersistenceBootstrap::init(&config.database_url).await?;
    let service = ServicesBootstrap::init(&config, &persistence);

    match cli.command {
        Commands::Assess { targets } => {
            let report = service.assess_bulk_deletion_impact(&targets).await?;
            print_json(&report)?;
        }
        Commands::Execute {
            targets,
            strategy,
            force,
            confirm,
            dry_run,
            no_backup,
            atomic,
            allow_production,
            log_level,
            backup_out,
        } => {
            let mut request = config.deletion.request_defaults();
            if let Some(strategy) = strategy {
                request.strategy = strategy;
            }
            if let Some(level) = log_level {
                request.log_level = level;
            }
            request.force = force;
            request.confirmed = confirm;
            request.dry_run |= dry_run;
            request.atomic |= atomic;
            if no_backup {
                request.create_backup = false;
            }
            if allow_production {
                request.preserve_production_data = false;
            }

            let result = service.execute_deletion(&targets, &request).await?;

            if let (Some(path), Some(backup)) = (backup_out, &result.backup) {
                let json = serde_json::to_string_pretty(backup)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write backup to {}", path.display()))?;
                info!("Backup written to {}", path.display());
            }

            print_json(&result)?;
            if !result.success {
                std::process::exit(2);
            }
        }
        Commands::Restore { backup } => {
            let raw = std::fs::read_to_string(&backup)
                .with_context(|| format!("Failed to read backup {}", backup.display()))?;
            let backup: DeletionBackup =
                serde_json::from_str(&raw).context("Backup file is not a valid backup")?;
            let restored = service.restore_backup(&backup).await?;
            print_json(&serde_json::json!({
                "operationId": backup.operation_id,
                "restored": restored,
            }))?;
        }
        Commands::Stats => {
            let stats = service.get_deletion_statistics().await?;
            print_json(&stats)?;
        }
        Commands::History { limit } => {
            let entries = service.deletion_history(limit).await?;
            print_json(&entries)?;
        }
    }

    Ok(())
}
