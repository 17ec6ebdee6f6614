use std::collections::BTreeSet;

use miette::Diagnostic;
use thiserror::Error;

use tether_core::namespace::HOST;
use tether_core::{HostedRequirement, Repository, RequirementId, ResourceId};

use crate::conflict::UsesConflict;

/// Errors returned by [`crate::Resolver`].
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ResolutionError {
    /// Mandatory requirements could not be satisfied by any candidate permutation.
    #[error("Unable to resolve {} requirement(s):\n{}", .requirements.len(), render(.requirements))]
    #[diagnostic(help("Every listed requirement needs a provider that is itself resolvable and consistent with its `uses` constraints"))]
    Unresolved {
        requirements: Vec<UnresolvedRequirement>,
    },

    /// A dynamic resolve was requested in a situation that does not allow one.
    #[error("Invalid dynamic context: {reason}")]
    InvalidDynamicContext { reason: String },

    /// The search tried `limit` permutations without finding a consistent one.
    #[error("Gave up after {limit} candidate permutations:\n{}", render(.unresolved))]
    #[diagnostic(help("Raise `max-permutations` under [resolver] in the configuration"))]
    PermutationLimit {
        limit: usize,
        unresolved: Vec<UnresolvedRequirement>,
    },
}

impl ResolutionError {
    /// Requirements reported by this error, if any.
    pub fn unresolved(&self) -> &[UnresolvedRequirement] {
        match self {
            ResolutionError::Unresolved { requirements } => requirements,
            ResolutionError::PermutationLimit { unresolved, .. } => unresolved,
            ResolutionError::InvalidDynamicContext { .. } => &[],
        }
    }
}

fn render(requirements: &[UnresolvedRequirement]) -> String {
    requirements
        .iter()
        .map(|r| format!("  - {}", r.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A requirement that could not be satisfied, with the reason rendered at the
/// time the failure was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRequirement {
    /// The resource carrying the requirement (the host for fragment payload).
    pub resource: ResourceId,
    pub requirement: RequirementId,
    pub reason: String,
    pub conflict: Option<UsesConflict>,
}

/// Why a resource or permutation failed. Internal; rendered into
/// [`UnresolvedRequirement`]s when the search gives up.
#[derive(Debug, Clone)]
pub(crate) enum Cause {
    MissingRequirement {
        requirement: HostedRequirement,
        cause: Option<Box<Cause>>,
    },
    FragmentNotSelected {
        fragment: ResourceId,
    },
    DynamicImportFailed {
        requirement: HostedRequirement,
    },
    UsesViolation(Box<UsesConflict>),
}

impl Cause {
    /// The requirements this failure is directly about.
    pub fn unresolved(&self, repo: &Repository) -> Vec<HostedRequirement> {
        match self {
            Cause::MissingRequirement { requirement, .. } => vec![*requirement],
            Cause::DynamicImportFailed { requirement } => vec![*requirement],
            Cause::UsesViolation(conflict) => conflict.requirement().into_iter().collect(),
            Cause::FragmentNotSelected { fragment } => host_requirement(repo, *fragment)
                .into_iter()
                .collect(),
        }
    }

    fn render_into(&self, repo: &Repository, out: &mut Vec<UnresolvedRequirement>) {
        match self {
            Cause::MissingRequirement { requirement, cause } => {
                let req = repo.requirement(requirement.requirement);
                let reason = match cause {
                    None => format!(
                        "Unable to resolve {}: missing requirement {req}",
                        repo.resource(requirement.requirer)
                    ),
                    Some(_) => format!(
                        "Unable to resolve {}: missing requirement {req} (no candidate could be resolved)",
                        repo.resource(requirement.requirer)
                    ),
                };
                out.push(entry(*requirement, reason, None));
                if let Some(cause) = cause {
                    cause.render_into(repo, out);
                }
            }
            Cause::FragmentNotSelected { fragment } => {
                if let Some(requirement) = host_requirement(repo, *fragment) {
                    let reason = format!(
                        "Unable to resolve {}: fragment was not selected for attachment to a host",
                        repo.resource(*fragment)
                    );
                    out.push(entry(requirement, reason, None));
                }
            }
            Cause::DynamicImportFailed { requirement } => {
                let reason = format!(
                    "Unable to resolve {}: dynamic requirement {} has no resolvable candidate",
                    repo.resource(requirement.requirer),
                    repo.requirement(requirement.requirement)
                );
                out.push(entry(*requirement, reason, None));
            }
            Cause::UsesViolation(conflict) => {
                if let Some(requirement) = conflict.requirement() {
                    let reason = format!(
                        "Uses constraint violation. {}",
                        conflict.describe(repo)
                    );
                    out.push(entry(requirement, reason, Some((**conflict).clone())));
                }
            }
        }
    }
}

fn entry(
    requirement: HostedRequirement,
    reason: String,
    conflict: Option<UsesConflict>,
) -> UnresolvedRequirement {
    UnresolvedRequirement {
        resource: requirement.requirer,
        requirement: requirement.requirement,
        reason,
        conflict,
    }
}

fn host_requirement(repo: &Repository, fragment: ResourceId) -> Option<HostedRequirement> {
    repo.resource(fragment)
        .requirements
        .iter()
        .copied()
        .find(|r| repo.requirement(*r).namespace == HOST)
        .map(|requirement| HostedRequirement {
            requirer: fragment,
            requirement,
        })
}

/// Every unresolved requirement met during one search, in first-seen order.
#[derive(Debug, Default)]
pub(crate) struct Unresolved {
    entries: Vec<UnresolvedRequirement>,
    seen: BTreeSet<(ResourceId, RequirementId)>,
}

impl Unresolved {
    pub fn record(&mut self, repo: &Repository, cause: &Cause) {
        let mut rendered = Vec::new();
        cause.render_into(repo, &mut rendered);
        for item in rendered {
            if self.seen.insert((item.resource, item.requirement)) {
                self.entries.push(item);
            }
        }
    }

    pub fn into_error(self) -> ResolutionError {
        ResolutionError::Unresolved {
            requirements: self.entries,
        }
    }

    pub fn into_entries(self) -> Vec<UnresolvedRequirement> {
        self.entries
    }
}
