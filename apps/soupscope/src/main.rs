//! # Soupscope - BFF Soup Trace Explorer
//!
//! The main binary for exploring primordial-soup simulation traces.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │              apps/soupscope (THE BINARY)           │
//! │                                                    │
//! │   ┌─────────────┐          ┌──────────────────┐    │
//! │   │    CLI      │ ───────▶ │  Text commands   │    │
//! │   │   (clap)    │          │  (repl module)   │    │
//! │   └──────┬──────┘          └────────┬─────────┘    │
//! │          └──────────────┬───────────┘              │
//! │                         ▼                          │
//! │                ┌────────────────┐                  │
//! │                │ soupscope-core │                  │
//! │                │  (THE ENGINE)  │                  │
//! │                └────────────────┘                  │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Interactive exploration
//! soupscope -d trace
//!
//! # Reports
//! soupscope -d trace auto
//! soupscope -d trace table --with-steps -o stats.tsv
//! soupscope -d trace run bff 17 40 500
//! ```

use clap::Parser;
use soupscope::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // SOUPSCOPE_LOG_FORMAT=json enables machine-parseable logs. Logs go to
    // stderr; stdout carries analysis output only.
    let log_format = std::env::var("SOUPSCOPE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "soupscope=info,soupscope_core=info".into());

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

    let cli = cli::Cli::parse();

    let interactive = matches!(cli.command, None | Some(cli::Commands::Repl));
    if interactive && !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  soupscope v{}
  BFF primordial soup trace explorer
"#,
        env!("CARGO_PKG_VERSION")
    );
}
