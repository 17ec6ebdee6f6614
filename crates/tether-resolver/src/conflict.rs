//! `uses` constraint violations and their human-readable reports.

use std::fmt::Write;

use tether_core::{HostedCapability, HostedRequirement, Repository};

/// One way a package reaches a resource: the providing capability and the
/// chain of requirements through which it became visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSide {
    pub capability: HostedCapability,
    /// Requirements from the resource outwards. Empty when the capability is
    /// the resource's own export.
    pub chain: Vec<HostedRequirement>,
}

/// Two different providers of the same package visible to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesConflict {
    pub resource: tether_core::ResourceId,
    pub package: String,
    /// How the resource sees the package directly; `None` when it exports
    /// the package itself.
    pub direct: Option<ConflictSide>,
    /// The incompatible provider reached through `uses` constraints.
    pub used: ConflictSide,
}

impl UsesConflict {
    /// The requirement to blame for the conflict: the head of the `uses` chain,
    /// falling back to the direct chain.
    pub fn requirement(&self) -> Option<HostedRequirement> {
        self.used
            .chain
            .first()
            .or_else(|| self.direct.as_ref().and_then(|d| d.chain.first()))
            .copied()
    }

    /// Render the conflict with resource names and requirement chains.
    pub fn describe(&self, repo: &Repository) -> String {
        let resource = repo.resource(self.resource);
        let used_by = repo.resource(self.used.capability.provider);
        let mut out = String::new();
        match &self.direct {
            None => {
                let _ = write!(
                    out,
                    "{resource} exports package '{}' and is also exposed to it from {used_by}",
                    self.package
                );
                let _ = write!(out, "\n\nChain:\n{}", render_chain(repo, &self.used));
            }
            Some(direct) => {
                let direct_by = repo.resource(direct.capability.provider);
                let _ = write!(
                    out,
                    "{resource} is exposed to package '{}' from resources {direct_by} and {used_by} via two dependency chains",
                    self.package
                );
                let _ = write!(out, "\n\nChain 1:\n{}", render_chain(repo, direct));
                let _ = write!(out, "\n\nChain 2:\n{}", render_chain(repo, &self.used));
            }
        }
        out
    }
}

fn render_chain(repo: &Repository, side: &ConflictSide) -> String {
    let mut lines = Vec::new();
    for link in &side.chain {
        let req = repo.requirement(link.requirement);
        lines.push(format!("  {}", repo.resource(link.requirer)));
        lines.push(format!("    requires: {req}"));
        lines.push("     |".to_string());
    }
    let cap = repo.capability(side.capability.capability);
    lines.push(format!("  {}", repo.resource(side.capability.provider)));
    lines.push(format!("    provides: {cap}"));
    lines.join("\n")
}
