//! CLI argument definitions for Tether.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "tether",
    version,
    about = "Resolve capability/requirement universes",
    long_about = "Tether wires resources to the capabilities that satisfy their requirements, \
                  honouring uses constraints, fragments and optional resources."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file to use instead of ~/.tether/config.toml
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the mandatory and optional resources of a universe
    Resolve {
        /// Universe manifest (defaults to the nearest Tether.toml)
        universe: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Maximum tree depth for `--format tree`
        #[arg(short, long)]
        depth: Option<usize>,
        /// Show the wire path leading to a resource
        #[arg(long)]
        why: Option<String>,
        /// Show what is wired to a resource
        #[arg(short, long)]
        invert: Option<String>,
    },

    /// Resolve a dynamic package import of an already resolved resource
    Dynamic {
        /// Universe manifest (defaults to the nearest Tether.toml)
        universe: Option<PathBuf>,
        /// Name of the resource carrying the dynamic requirement
        #[arg(short, long)]
        requirer: String,
        /// Package to import
        #[arg(short, long)]
        package: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Validate a universe manifest without resolving it
    Check {
        /// Universe manifest (defaults to the nearest Tether.toml)
        universe: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Tree,
    Json,
}

pub fn parse() -> Cli {
    Cli::parse()
}
