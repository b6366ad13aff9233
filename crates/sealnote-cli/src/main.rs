//! `sealnote` maintenance commands.
//!
//! Operates directly on the SQLite database named by
//! `SEALNOTE_DATABASE_PATH` (or `--database`).
//!
//! # Usage
//!
//! ```text
//! sealnote migrate                        # create or upgrade the schema
//! sealnote sweep                          # delete expired login challenges
//! sealnote verify-note --user 1 --note 3  # re-check one note's hash chain
//! sealnote verify-user --user 1           # re-check every note of a user
//! sealnote gen-secret                     # print a fresh session secret
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sealnote::core::crypto::random_base64;
use sealnote::core::ChainReport;
use sealnote::store::SqliteStore;
use sealnote::{NoteId, Sealnote, ServiceConfig, UserId};
use tracing::{error, info};

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "sealnote", version, about = "sealnote database maintenance")]
struct Cli {
    /// Override the database file.
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema or apply pending migrations.
    Migrate,

    /// Delete login challenges past their expiry.
    Sweep,

    /// Re-verify the hash chain of one note.
    VerifyNote {
        #[arg(short, long)]
        user: u32,

        #[arg(short, long)]
        note: u32,
    },

    /// Re-verify the hash chain of every note a user owns.
    VerifyUser {
        #[arg(short, long)]
        user: u32,
    },

    /// Print a random base64 secret suitable for `SEALNOTE_SESSION_SECRET`.
    GenSecret,
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    setup_tracing(&config.log_level);

    match cli.command {
        Commands::Migrate => cmd_migrate(&config).await,
        Commands::Sweep => cmd_sweep(config).await,
        Commands::VerifyNote { user, note } => {
            cmd_verify_note(config, UserId(user), NoteId(note)).await
        }
        Commands::VerifyUser { user } => cmd_verify_user(config, UserId(user)).await,
        Commands::GenSecret => {
            println!("{}", random_base64::<32>());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open(config: ServiceConfig) -> Result<Sealnote<SqliteStore>> {
    let path = config.database_path.clone();
    Sealnote::<SqliteStore>::open(config).with_context(|| format!("failed to open {}", path.display()))
}

// -----------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------

async fn cmd_migrate(config: &ServiceConfig) -> Result<ExitCode> {
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let version = store.schema_version().await?;
    info!(path = %config.database_path.display(), version, "schema up to date");
    println!("schema version {version}");
    Ok(ExitCode::SUCCESS)
}

async fn cmd_sweep(config: ServiceConfig) -> Result<ExitCode> {
    let service = open(config)?;
    let removed = service.sweep_expired().await?;
    println!("removed {removed} expired challenge(s)");
    Ok(ExitCode::SUCCESS)
}

async fn cmd_verify_note(config: ServiceConfig, user: UserId, note: NoteId) -> Result<ExitCode> {
    let service = open(config)?;
    let report = service.audit_note(user, note).await?;
    Ok(exit_code(print_report(note, &report)))
}

async fn cmd_verify_user(config: ServiceConfig, user: UserId) -> Result<ExitCode> {
    let service = open(config)?;
    let titles = service.list_titles(user).await?;

    let mut all_valid = true;
    for title in &titles {
        let report = service.audit_note(user, title.note_id).await?;
        all_valid &= print_report(title.note_id, &report);
    }
    info!(%user, notes = titles.len(), "verified");
    Ok(exit_code(all_valid))
}

fn exit_code(valid: bool) -> ExitCode {
    if valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print one line per note; returns whether the chain is intact.
fn print_report(note: NoteId, report: &ChainReport) -> bool {
    match &report.broken {
        None => {
            println!(
                "note {note}: ok ({} block(s), tail {})",
                report.length,
                report.tail_hash.as_deref().unwrap_or("-")
            );
            true
        }
        Some(chain_break) => {
            error!(%note, position = chain_break.position, "chain broken");
            println!(
                "note {note}: BROKEN at block {} (expected prev_hash {}, found {})",
                chain_break.position, chain_break.expected, chain_break.found
            );
            false
        }
    }
}
