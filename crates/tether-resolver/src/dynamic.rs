//! Dynamic (incremental) resolution of a single package requirement for an
//! already resolved resource.

use tracing::debug;

use tether_core::namespace::{HOST, PACKAGE};
use tether_core::{
    CapabilityId, HostedCapability, HostedRequirement, RequirementId, ResourceId, WireMap,
};

use crate::context::ResolveContext;
use crate::error::{Cause, ResolutionError, Unresolved};
use crate::resolver::{DynamicRequest, Resolver, Session};

impl Resolver {
    /// Resolve `requirement` of the resolved resource `requirer` against
    /// `candidates`, which the caller has already matched and ranked.
    ///
    /// Only package requirements can be resolved this way. The returned map
    /// holds the single new wire of the requirer's host plus the wires of any
    /// provider that had to be resolved to satisfy it; existing wirings are
    /// never changed.
    pub fn resolve_dynamic(
        &self,
        ctx: &dyn ResolveContext,
        requirer: ResourceId,
        requirement: RequirementId,
        candidates: &[CapabilityId],
    ) -> Result<WireMap, ResolutionError> {
        let repo = ctx.repository();
        let wirings = ctx.wirings();
        let req = repo.requirement(requirement);

        if req.namespace != PACKAGE {
            return Err(invalid(format!(
                "namespace '{}' does not allow dynamic resolution",
                req.namespace
            )));
        }
        if req.resource != requirer {
            return Err(invalid(format!(
                "requirement {req} is not declared by {}",
                repo.resource(requirer)
            )));
        }
        if let Some(cap) = candidates
            .iter()
            .map(|c| repo.capability(*c))
            .find(|c| !c.is_package())
        {
            return Err(invalid(format!("candidate {cap} is not a package capability")));
        }

        let host = if repo.is_fragment(requirer) {
            wirings
                .get(&requirer)
                .and_then(|w| {
                    w.required
                        .iter()
                        .find(|wire| repo.requirement(wire.requirement).namespace == HOST)
                })
                .map(|wire| wire.provider)
                .ok_or_else(|| {
                    invalid(format!(
                        "fragment {} is not attached to a resolved host",
                        repo.resource(requirer)
                    ))
                })?
        } else {
            requirer
        };
        let Some(wiring) = wirings.get(&host) else {
            return Err(invalid(format!("{} is not resolved", repo.resource(host))));
        };

        let hosted = HostedRequirement {
            requirer: host,
            requirement,
        };
        let Some(first) = candidates.first() else {
            let mut unresolved = Unresolved::default();
            unresolved.record(repo, &Cause::DynamicImportFailed { requirement: hosted });
            return Err(unresolved.into_error());
        };
        if let Some(package) = repo.capability(*first).name() {
            if wiring.sees_package(repo, package) {
                return Err(invalid(format!(
                    "{} already has access to package '{package}'",
                    repo.resource(host)
                )));
            }
        }

        // A fragment that is not resolved can only offer its capabilities
        // through a host that is resolved in this same pass.
        let attachable = candidates.iter().any(|cap| {
            let declarer = repo.capability(*cap).resource;
            !repo.is_fragment(declarer)
                || wirings.contains_key(&declarer)
                || has_unresolved_host(ctx, declarer)
        });
        if !attachable {
            return Err(invalid(
                "every candidate comes from a fragment whose hosts are already resolved".to_string(),
            ));
        }

        debug!(
            requirer = %repo.resource(requirer),
            requirement = %req,
            candidates = candidates.len(),
            "starting dynamic resolve"
        );
        let request = DynamicRequest {
            requirement: hosted,
            candidates: candidates
                .iter()
                .map(|c| HostedCapability::declared(repo, *c))
                .collect(),
        };
        Session::new(
            ctx,
            self.config().max_permutations,
            vec![host],
            Vec::new(),
            Some(request),
        )
        .run()
    }
}

fn invalid(reason: String) -> ResolutionError {
    ResolutionError::InvalidDynamicContext { reason }
}

fn has_unresolved_host(ctx: &dyn ResolveContext, fragment: ResourceId) -> bool {
    let repo = ctx.repository();
    repo.resource(fragment)
        .requirements
        .iter()
        .filter(|r| repo.requirement(**r).namespace == HOST)
        .flat_map(|r| ctx.find_providers(*r))
        .any(|cap| !ctx.wirings().contains_key(&repo.capability(cap).resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RepositoryContext;
    use tether_core::attribute::Directives;
    use tether_core::namespace::{DIRECTIVE_RESOLUTION, RESOLUTION_DYNAMIC};
    use tether_core::{Repository, ResourceBuilder, Version};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn dynamic_import(builder: ResourceBuilder, package: &str) -> ResourceBuilder {
        let mut directives = Directives::new();
        directives.insert(DIRECTIVE_RESOLUTION.to_string(), RESOLUTION_DYNAMIC.to_string());
        let filter = format!("(package={package})");
        builder.requirement(PACKAGE, Some(filter.as_str()), directives)
    }

    #[test]
    fn non_package_namespace_is_rejected() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).require_bundle("B"))
            .unwrap();
        let mut ctx = RepositoryContext::new(repo).with_mandatory(vec![a]);
        let req = ctx.repository().resource(a).requirements[0];
        let mut wires = WireMap::new();
        wires.insert(a, Vec::new());
        ctx.commit(&wires);

        let err = Resolver::default()
            .resolve_dynamic(&ctx, a, req, &[])
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidDynamicContext { .. }));
    }

    #[test]
    fn unresolved_requirer_is_rejected() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let b = repo
            .add(dynamic_import(ResourceBuilder::new("B", v("1.0")), "foo"))
            .unwrap();
        let ctx = RepositoryContext::new(repo);
        let req = ctx.repository().resource(b).requirements[0];
        let cap = ctx.repository().resource(a).capabilities[3];

        let err = Resolver::default()
            .resolve_dynamic(&ctx, b, req, &[cap])
            .unwrap_err();
        assert!(err.to_string().contains("is not resolved"));
    }

    #[test]
    fn empty_candidates_report_the_requirement() {
        let mut repo = Repository::new();
        let b = repo
            .add(dynamic_import(ResourceBuilder::new("B", v("1.0")), "foo"))
            .unwrap();
        let mut ctx = RepositoryContext::new(repo).with_mandatory(vec![b]);
        let wires = Resolver::default().resolve(&ctx).unwrap();
        ctx.commit(&wires);
        let req = ctx.repository().resource(b).requirements[0];

        let err = Resolver::default()
            .resolve_dynamic(&ctx, b, req, &[])
            .unwrap_err();
        let entries = err.unresolved();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].requirement, req);
    }
}
