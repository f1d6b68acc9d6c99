//! Strictly Arena - server binary.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use strictly_arena::{ArenaConfig, SqliteStore};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            db_path,
        } => run_server(config, host, port, db_path).await,
        Command::Migrate { db_path } => run_migrations(db_path),
    }
}

/// Run the WebSocket game server
#[instrument(skip_all)]
async fn run_server(
    config: Option<std::path::PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    db_path: Option<String>,
) -> Result<()> {
    let config = match config {
        Some(path) => ArenaConfig::from_file(&path)?,
        None => {
            info!("No config file given, using defaults");
            ArenaConfig::default()
        }
    }
    .with_env()
    .with_overrides(host, port, db_path);

    if config.tokens().is_empty() {
        tracing::warn!("No tokens configured, every connection will be refused");
    }

    strictly_arena::serve(config).await
}

/// Apply migrations to a database file
#[instrument]
fn run_migrations(db_path: String) -> Result<()> {
    // Opening runs pending migrations.
    SqliteStore::open(db_path)?;
    info!("Migrations applied");
    Ok(())
}
