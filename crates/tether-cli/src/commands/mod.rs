//! Command dispatch and handler modules.

mod check;
mod dynamic;
mod resolve;

use std::path::PathBuf;

use miette::Result;

use tether_core::config::TetherConfig;
use tether_core::manifest::{LoadedUniverse, Universe};
use tether_core::{Repository, ResourceId, WireMap};
use tether_resolver::{Resolver, WireGraph};
use tether_util::errors::TetherError;

use crate::cli::{Cli, Command, Format};

const UNIVERSE_FILE: &str = "Tether.toml";

/// Route a parsed CLI invocation to the appropriate command handler.
pub fn dispatch(cli: Cli, config: &TetherConfig) -> Result<()> {
    let resolver = Resolver::new(config.resolver.clone());
    match cli.command {
        Command::Resolve {
            universe,
            format,
            depth,
            why,
            invert,
        } => resolve::exec(
            &resolver,
            universe,
            format,
            depth,
            why.as_deref(),
            invert.as_deref(),
        ),
        Command::Dynamic {
            universe,
            requirer,
            package,
            format,
        } => dynamic::exec(&resolver, universe, &requirer, &package, format),
        Command::Check { universe } => check::exec(universe),
    }
}

/// Load the given universe, or the nearest `Tether.toml` above the current
/// directory.
fn load_universe(path: Option<PathBuf>) -> Result<LoadedUniverse> {
    let path = match path {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().map_err(TetherError::Io)?;
            tether_util::fs::find_upwards(&cwd, UNIVERSE_FILE).ok_or_else(|| {
                TetherError::Manifest {
                    message: format!("Could not find {UNIVERSE_FILE} in this or any parent directory"),
                }
            })?
        }
    };
    tracing::debug!(path = %path.display(), "loading universe");
    let universe = Universe::from_path(&path)?;
    Ok(universe.load()?)
}

/// Print wires in the requested format.
fn print_wires(
    repo: &Repository,
    wires: &WireMap,
    roots: &[ResourceId],
    format: Format,
    depth: Option<usize>,
) -> Result<()> {
    match format {
        Format::Text => {
            if wires.is_empty() {
                println!("Nothing to resolve.");
                return Ok(());
            }
            println!("Resolved {} resource(s):", wires.len());
            for (resource, list) in wires {
                println!("{}", repo.resource(*resource));
                for wire in list {
                    println!(
                        "  {} -> {} {}",
                        repo.requirement(wire.requirement),
                        repo.resource(wire.provider),
                        repo.capability(wire.capability)
                    );
                }
            }
        }
        Format::Tree => {
            let graph = WireGraph::from_wires(repo, wires, roots);
            print!("{}", graph.print_tree(depth));
        }
        Format::Json => {
            let graph = WireGraph::from_wires(repo, wires, roots);
            let json = graph.to_json().map_err(|e| TetherError::Generic {
                message: format!("Failed to serialize wires: {e}"),
            })?;
            println!("{json}");
        }
    }
    Ok(())
}
