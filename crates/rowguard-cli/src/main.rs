//! Rowguard CLI
//!
//! Command-line interface for Rowguard access-control administration.

#![warn(clippy::all)]
#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use rowguard_cli::CliConfig;
use rowguard_cli::cli::Args;
use rowguard_cli::commands::run;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = CliConfig::load(args.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    rowguard_core::config::install(config.access.clone())?;
    tracing::debug!(?config, "configuration loaded");

    let stdout = std::io::stdout();
    run(&args, &config, &mut stdout.lock())?;
    Ok(())
}
