//! Bran - natural-language BI assistant
//!
//! Main entry point for the Bran CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{aliases, ask, doctor};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Bran - natural-language BI assistant
#[derive(Parser)]
#[command(name = "bran")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a one-shot question
    Ask(ask::AskArgs),

    /// Manage saved resource aliases
    Aliases(aliases::AliasesArgs),

    /// Check configuration and connectivity
    Doctor(doctor::DoctorArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "bran=debug,bran_agent=debug,bran_llm=debug,bran_tools=debug,bran_store=debug,info"
    } else {
        "bran=info,bran_agent=info,bran_llm=info,bran_tools=info,warn"
    };

    let log_dir = bran_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "bran.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "bran=trace,bran_agent=trace,bran_llm=trace,bran_tools=trace,bran_store=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Aliases(args) => aliases::run(args, &ctx).await,
        Commands::Doctor(args) => doctor::run(args, &ctx).await,
    }
}
