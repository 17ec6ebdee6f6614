//! Handler for `tether dynamic`.

use std::path::PathBuf;

use miette::Result;
use tracing::debug;

use tether_core::namespace::PACKAGE;
use tether_resolver::{RepositoryContext, ResolveContext, Resolver};
use tether_util::errors::TetherError;

use crate::cli::Format;

/// Resolve the universe, commit the result, then dynamically import
/// `package` for `requirer` through its matching dynamic requirement.
pub fn exec(
    resolver: &Resolver,
    universe: Option<PathBuf>,
    requirer: &str,
    package: &str,
    format: Format,
) -> Result<()> {
    let loaded = super::load_universe(universe)?;
    let mut ctx = RepositoryContext::from_universe(loaded, resolver)?;
    let wires = resolver.resolve(&ctx)?;
    ctx.commit(&wires);
    debug!(resources = ctx.wires().len(), "static wiring committed");

    let repo = ctx.repository();
    let id = repo.find(requirer).ok_or_else(|| TetherError::Generic {
        message: format!("No resource named `{requirer}`"),
    })?;
    let requirement = repo
        .resource(id)
        .requirements
        .iter()
        .copied()
        .find(|r| {
            let req = repo.requirement(*r);
            req.is_dynamic()
                && req.namespace == PACKAGE
                && repo
                    .capability_ids()
                    .filter(|c| repo.capability(*c).name() == Some(package))
                    .any(|c| repo.matches(*r, c))
        })
        .ok_or_else(|| TetherError::Generic {
            message: format!("`{requirer}` has no dynamic requirement matching package `{package}`"),
        })?;

    let candidates: Vec<_> = ctx
        .find_providers(requirement)
        .into_iter()
        .filter(|c| repo.capability(*c).name() == Some(package))
        .collect();
    let delta = resolver.resolve_dynamic(&ctx, id, requirement, &candidates)?;
    super::print_wires(repo, &delta, &[id], format, None)
}
