//! Handler for `tether resolve`.

use std::path::PathBuf;

use miette::Result;

use tether_resolver::{RepositoryContext, ResolveContext, Resolver, WireGraph};
use tether_util::errors::TetherError;

use crate::cli::Format;

pub fn exec(
    resolver: &Resolver,
    universe: Option<PathBuf>,
    format: Format,
    depth: Option<usize>,
    why: Option<&str>,
    invert: Option<&str>,
) -> Result<()> {
    let loaded = super::load_universe(universe)?;
    let ctx = RepositoryContext::from_universe(loaded, resolver)?;
    let wires = resolver.resolve(&ctx)?;
    let repo = ctx.repository();

    let mut roots = ctx.mandatory_resources();
    roots.extend(
        ctx.optional_resources()
            .into_iter()
            .filter(|r| wires.contains_key(r)),
    );
    let skipped: Vec<String> = ctx
        .optional_resources()
        .into_iter()
        .filter(|r| !wires.contains_key(r) && !ctx.is_resolved(*r))
        .map(|r| repo.resource(r).to_string())
        .collect();

    if why.is_some() || invert.is_some() {
        let graph = WireGraph::from_wires(repo, &wires, &roots);
        if let Some(target) = why {
            let path = graph.find_path(target).ok_or_else(|| TetherError::Generic {
                message: format!("`{target}` is not wired from any root"),
            })?;
            let rendered: Vec<String> = path.iter().map(|n| n.to_string()).collect();
            println!("{}", rendered.join(" -> "));
        }
        if let Some(target) = invert {
            let tree = graph.print_inverted_tree(target);
            if tree.is_empty() {
                return Err(TetherError::Generic {
                    message: format!("`{target}` is not part of the resolution"),
                }
                .into());
            }
            print!("{tree}");
        }
        return Ok(());
    }

    super::print_wires(repo, &wires, &roots, format, depth)?;
    if format == Format::Text && !skipped.is_empty() {
        println!("Skipped optional: {}", skipped.join(", "));
    }
    Ok(())
}
