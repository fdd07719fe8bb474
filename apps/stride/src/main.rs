//! # Stride - Progression Server
//!
//! The main binary for the Stride progression engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for one-shot profile commands
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  apps/stride (THE BINARY)                │
//! │                                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐  │
//! │  │   CLI       │   │   HTTP API  │   │  Tokio timer  │  │
//! │  │  (clap)     │   │   (axum)    │   │  (deferred)   │  │
//! │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘  │
//! │         └─────────────────┼──────────────────┘          │
//! │                           ▼                             │
//! │                   ┌───────────────┐                     │
//! │                   │  stride-core  │                     │
//! │                   └───────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! stride server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! stride --profile ada onboard --name Ada --grade 10
//! stride --profile ada save robotics-camp
//! stride --profile ada summary
//! ```

use clap::Parser;
use stride::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // STRIDE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STRIDE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stride=info,stride_core=info,tower_http=debug".into());

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
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Stride startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗████████╗██████╗ ██╗██████╗ ███████╗
  ██╔════╝╚══██╔══╝██╔══██╗██║██╔══██╗██╔════╝
  ███████╗   ██║   ██████╔╝██║██║  ██║█████╗
  ╚════██║   ██║   ██╔══██╗██║██║  ██║██╔══╝
  ███████║   ██║   ██║  ██║██║██████╔╝███████╗
  ╚══════╝   ╚═╝   ╚═╝  ╚═╝╚═╝╚═════╝ ╚══════╝

  Progression Engine v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
