//! # Escape Room CLI Module
//!
//! This module implements the CLI interface for the escape room.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `sessions` - List recorded sessions
//! - `show` - Show one session with its stages
//! - `delete` - Delete a session
//! - `stats` - Recompute and show aggregate statistics
//! - `stages` - Show the stage catalog
//! - `play` - Play in the terminal

mod commands;
pub mod play;

use crate::config::{Backend, CliOverrides, Settings, SyncMode};
use clap::{Parser, Subcommand};
use escape_core::EscapeError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Escape Room - six coding puzzles against the clock
///
/// Runs the session server, inspects recorded sessions and plays the game
/// in a terminal.
#[derive(Parser, Debug)]
#[command(name = "escape-room")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./escape-room.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the session database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// List recorded sessions, newest first
    Sessions {
        /// Show at most this many sessions
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one session with its timer and stages
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session with its timer and stages
    Delete {
        /// Session id
        id: String,
    },

    /// Recompute and show aggregate statistics
    Stats,

    /// Show the stage catalog
    Stages {
        /// Include the hints
        #[arg(long)]
        hints: bool,
    },

    /// Play the escape room in this terminal
    Play {
        /// Player name
        #[arg(short, long)]
        name: String,

        /// Course the player is enrolled in
        #[arg(long)]
        course: String,

        /// Module the session counts for
        #[arg(short, long)]
        module: String,

        /// Custom session length in minutes (1-180)
        #[arg(short = 't', long)]
        minutes: Option<u32>,

        /// Persist through this server instead of the local database
        #[arg(short, long)]
        server: Option<String>,

        /// What to do when a write fails
        #[arg(long, value_enum)]
        sync: Option<SyncMode>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Flags that override the config file and environment.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            database: self.database.clone(),
            backend: self.backend,
            ..CliOverrides::default()
        };
        match &self.command {
            Some(Commands::Server { host, port }) => {
                overrides.host = host.clone();
                overrides.port = *port;
            }
            Some(Commands::Play { server, sync, .. }) => {
                overrides.server_url = server.clone();
                overrides.sync_policy = *sync;
            }
            _ => {}
        }
        overrides
    }
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), EscapeError> {
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides())?;
    let json_mode = cli.json_mode;
    if cli.verbose {
        tracing::info!(backend = ?settings.backend, database = %settings.database.display(), "settings resolved");
    }

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&settings).await,
        Some(Commands::Init { force }) => cmd_init(&settings, force),
        Some(Commands::Sessions { limit }) => cmd_sessions(&settings, json_mode, limit),
        Some(Commands::Show { id }) => cmd_show(&settings, json_mode, &id),
        Some(Commands::Delete { id }) => cmd_delete(&settings, json_mode, &id),
        Some(Commands::Stats) => cmd_stats(&settings, json_mode),
        Some(Commands::Stages { hints }) => cmd_stages(json_mode, hints),
        Some(Commands::Play {
            name,
            course,
            module,
            minutes,
            ..
        }) => {
            let player = escape_core::PlayerProfile {
                name,
                course,
                module,
            };
            tokio::task::spawn_blocking(move || cmd_play(&settings, player, minutes))
                .await
                .map_err(|e| EscapeError::IoError(format!("Play loop aborted: {}", e)))?
        }
        None => {
            // No subcommand - show statistics by default
            cmd_stats(&settings, json_mode)
        }
    }
}
