//! # Escape Room
//!
//! The main binary for the escape room.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) persisting sessions, stages and statistics
//! - CLI interface for inspecting recorded sessions
//! - Terminal play client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  apps/escape-room (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Play client     │     │
//! │  │  (clap)     │    │   (axum)    │    │  (HTTP / local)  │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  escape-core  │                            │
//! │                    │  (THE LOGIC)  │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! escape-room server --host 0.0.0.0 --port 8080
//!
//! # Play against it
//! escape-room play --name Ayesha --course BSCS --module Web --server http://127.0.0.1:8080
//!
//! # Inspect
//! escape-room sessions
//! escape-room stats
//! ```

use clap::Parser;
use escape_room::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // ESCAPE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ESCAPE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "escape_room=info,escape_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ╔═╗╔═╗╔═╗╔═╗╔═╗╔═╗  ╦═╗╔═╗╔═╗╔╦╗
  ║╣ ╚═╗║  ╠═╣╠═╝║╣   ╠╦╝║ ║║ ║║║║
  ╚═╝╚═╝╚═╝╩ ╩╩  ╚═╝  ╩╚═╚═╝╚═╝╩ ╩

  Escape Room v{}

  Six puzzles. One clock.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
