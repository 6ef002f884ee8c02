//! # graphstage - Staging Server and CLI
//!
//! The main binary for graphstage.
//!
//! This application provides:
//! - HTTP REST API server (axum-based) over one staging coordinator
//! - CLI interface for graph operations and operation scripts
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              apps/graphstage (THE BINARY)            │
//! │                                                      │
//! │   ┌─────────────┐            ┌─────────────┐         │
//! │   │    CLI      │            │  HTTP API   │         │
//! │   │   (clap)    │            │   (axum)    │         │
//! │   └──────┬──────┘            └──────┬──────┘         │
//! │          └─────────────┬────────────┘                │
//! │                        ▼                             │
//! │              ┌──────────────────┐                    │
//! │              │ graphstage-core  │                    │
//! │              │  (THE ENGINE)    │                    │
//! │              └──────────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! graphstage server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! graphstage status
//! graphstage apply -f ops.json
//! graphstage query -g urn:people -p ex:knows
//! ```

use clap::Parser;
use graphstage::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // GRAPHSTAGE_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("GRAPHSTAGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "graphstage=debug,graphstage_core=debug,tower_http=debug"
    } else {
        "graphstage=info,graphstage_core=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  graphstage v{}
  staged graph writes: flush or discard
"#,
        env!("CARGO_PKG_VERSION")
    );
}
