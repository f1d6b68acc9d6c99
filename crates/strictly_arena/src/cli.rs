//! Command-line interface for strictly_arena.

use clap::{Parser, Subcommand};

/// Strictly Arena - tic-tac-toe matchmaking server
#[derive(Parser, Debug)]
#[command(name = "strictly_arena")]
#[command(about = "Tic-tac-toe matchmaking server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the WebSocket game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file (created if it doesn't exist)
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Apply pending database migrations and exit
    Migrate {
        /// SQLite database file
        #[arg(long, default_value = "strictly_arena.db")]
        db_path: String,
    },
}
