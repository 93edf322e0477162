//! # UCML - Semantic Type System
//!
//! The command-line driver for the UCML semantic type and composition engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             apps/ucml (THE BINARY)           │
//! │                                              │
//! │  ┌─────────────┐        ┌────────────────┐   │
//! │  │    CLI      │        │   State file   │   │
//! │  │   (clap)    │───────▶│  (canonical)   │   │
//! │  └──────┬──────┘        └────────────────┘   │
//! │         ▼                                    │
//! │  ┌───────────────┐                           │
//! │  │   ucml-core   │                           │
//! │  │  (THE LOGIC)  │                           │
//! │  └───────────────┘                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! ucml init
//! ucml infer '[1, 2, 3]'
//! ucml compose type_int32 type_float64 --rule numeric_operations
//! ucml expand tier1 --complexity 5 --size 512
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ucml::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // UCML_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("UCML_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "ucml=debug,ucml_core=debug"
    } else {
        "ucml=info,ucml_core=info"
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

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the UCML startup banner.
fn print_banner() {
    println!("UCML Semantic Type System v{}", env!("CARGO_PKG_VERSION"));
    println!();
}
