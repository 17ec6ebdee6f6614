//! Tether CLI binary.
//!
//! This is the entry point for the `tether` command-line tool. It loads the
//! configuration, initializes logging via `tracing`, parses arguments with
//! `clap`, and dispatches to the appropriate command handler.

mod cli;
mod commands;

use miette::Result;
use tracing_subscriber::EnvFilter;

use tether_core::config::TetherConfig;

fn main() -> Result<()> {
    let args = cli::parse();
    let config = match &args.config {
        Some(path) => TetherConfig::from_path(path)?,
        None => TetherConfig::load()?,
    };

    let fallback = if args.verbose {
        "debug"
    } else {
        config.log.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    commands::dispatch(args, &config)
}
