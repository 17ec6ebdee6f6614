//! The resolver's view of the outside world.
//!
//! A [`ResolveContext`] tells the engine which resources to resolve, which
//! capabilities can satisfy a requirement (already ranked), and which wirings
//! exist from earlier resolves. The engine only reads from it.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use tracing::debug;

use tether_core::attribute::Value;
use tether_core::manifest::LoadedUniverse;
use tether_core::namespace::ATTR_VERSION;
use tether_core::{
    CapabilityId, HostedCapability, Repository, RequirementId, ResourceId, Version, WireMap,
    Wiring,
};

use crate::error::ResolutionError;
use crate::resolver::Resolver;

/// Inputs of a resolve, supplied by the caller.
///
/// Implementations must be deterministic: the same context must always
/// return the same resources and the same candidate order.
pub trait ResolveContext {
    fn repository(&self) -> &Repository;

    /// Resources that must resolve, in processing order.
    fn mandatory_resources(&self) -> Vec<ResourceId>;

    /// Resources resolved when possible and silently dropped otherwise.
    fn optional_resources(&self) -> Vec<ResourceId> {
        Vec::new()
    }

    /// Capabilities matching `requirement`, best first. The engine never
    /// re-sorts this list.
    fn find_providers(&self, requirement: RequirementId) -> Vec<CapabilityId>;

    /// Insert a capability that a fragment contributes to a host into a
    /// ranked candidate list, returning the index it was placed at.
    fn insert_hosted_capability(
        &self,
        candidates: &mut Vec<HostedCapability>,
        hosted: HostedCapability,
    ) -> usize {
        candidates.push(hosted);
        candidates.len() - 1
    }

    /// Whether `requirement` takes part in resolution at all.
    fn is_effective(&self, _requirement: RequirementId) -> bool {
        true
    }

    /// Wirings of already resolved resources. Never modified by a resolve.
    fn wirings(&self) -> &BTreeMap<ResourceId, Wiring>;
}

/// In-memory [`ResolveContext`] over a [`Repository`].
///
/// Providers are ranked resolved-first, then by descending capability
/// version (falling back to the resource version), then by ascending
/// resource index.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    repository: Repository,
    mandatory: Vec<ResourceId>,
    optional: Vec<ResourceId>,
    wires: WireMap,
    wirings: BTreeMap<ResourceId, Wiring>,
}

impl RepositoryContext {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            mandatory: Vec::new(),
            optional: Vec::new(),
            wires: WireMap::new(),
            wirings: BTreeMap::new(),
        }
    }

    pub fn with_mandatory(mut self, resources: Vec<ResourceId>) -> Self {
        self.mandatory = resources;
        self
    }

    pub fn with_optional(mut self, resources: Vec<ResourceId>) -> Self {
        self.optional = resources;
        self
    }

    /// Build a context from a loaded universe. Resources flagged `resolved`
    /// are resolved first and committed as existing wirings.
    pub fn from_universe(
        universe: LoadedUniverse,
        resolver: &Resolver,
    ) -> Result<Self, ResolutionError> {
        let mut ctx = Self::new(universe.repository).with_mandatory(universe.resolved.clone());
        if !universe.resolved.is_empty() {
            let wires = resolver.resolve(&ctx)?;
            debug!(resources = wires.len(), "committed pre-resolved resources");
            ctx.commit(&wires);
        }
        Ok(ctx
            .with_mandatory(universe.mandatory)
            .with_optional(universe.optional))
    }

    /// Record the wires of a successful resolve. Wires for a resource that is
    /// already wired are appended, so a dynamic delta extends existing state.
    pub fn commit(&mut self, wires: &WireMap) {
        for (resource, list) in wires {
            self.wires.entry(*resource).or_default().extend(list.iter().copied());
        }
        self.wirings = Wiring::build_all(&self.repository, &self.wires);
    }

    /// Every committed wire.
    pub fn wires(&self) -> &WireMap {
        &self.wires
    }

    pub fn is_resolved(&self, resource: ResourceId) -> bool {
        self.wirings.contains_key(&resource)
    }

    fn rank(&self, hosted: HostedCapability) -> (bool, Reverse<Version>, ResourceId) {
        let cap = self.repository.capability(hosted.capability);
        let version = cap
            .attributes
            .get(ATTR_VERSION)
            .and_then(Value::as_version)
            .cloned()
            .unwrap_or_else(|| self.repository.resource(hosted.provider).version.clone());
        (
            !self.is_resolved(hosted.provider),
            Reverse(version),
            hosted.provider,
        )
    }

    fn compare(&self, a: HostedCapability, b: HostedCapability) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }
}

impl ResolveContext for RepositoryContext {
    fn repository(&self) -> &Repository {
        &self.repository
    }

    fn mandatory_resources(&self) -> Vec<ResourceId> {
        self.mandatory.clone()
    }

    fn optional_resources(&self) -> Vec<ResourceId> {
        self.optional.clone()
    }

    fn find_providers(&self, requirement: RequirementId) -> Vec<CapabilityId> {
        let repo = &self.repository;
        let mut providers: Vec<HostedCapability> = repo
            .providers(requirement)
            .into_iter()
            .map(|cap| HostedCapability::declared(repo, cap))
            .filter(|hosted| match self.wirings.get(&hosted.provider) {
                // Resolved hosts only offer what their wiring exposes.
                Some(wiring) if !repo.is_fragment(hosted.provider) => {
                    wiring.capabilities.contains(hosted)
                }
                _ => true,
            })
            .collect();
        providers.sort_by(|a, b| self.compare(*a, *b));
        providers.into_iter().map(|h| h.capability).collect()
    }

    fn insert_hosted_capability(
        &self,
        candidates: &mut Vec<HostedCapability>,
        hosted: HostedCapability,
    ) -> usize {
        let index = candidates
            .iter()
            .position(|existing| self.compare(hosted, *existing) == Ordering::Less)
            .unwrap_or(candidates.len());
        candidates.insert(index, hosted);
        index
    }

    fn wirings(&self) -> &BTreeMap<ResourceId, Wiring> {
        &self.wirings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{ResourceBuilder, Wire};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn higher_versions_rank_first() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let b = repo
            .add(ResourceBuilder::new("B", v("1.0")).export("foo", v("2.0"), &[]))
            .unwrap();
        let c = repo.add(ResourceBuilder::new("C", v("1.0")).import("foo")).unwrap();
        let ctx = RepositoryContext::new(repo);

        let req = ctx.repository().resource(c).requirements[0];
        let owners: Vec<ResourceId> = ctx
            .find_providers(req)
            .into_iter()
            .map(|cap| ctx.repository().capability(cap).resource)
            .collect();
        assert_eq!(owners, vec![b, a]);
    }

    #[test]
    fn resolved_providers_rank_first() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("2.0"), &[]))
            .unwrap();
        let b = repo
            .add(ResourceBuilder::new("B", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let c = repo.add(ResourceBuilder::new("C", v("1.0")).import("foo")).unwrap();
        let mut ctx = RepositoryContext::new(repo);
        let mut wires = WireMap::new();
        wires.insert(b, Vec::new());
        ctx.commit(&wires);

        let req = ctx.repository().resource(c).requirements[0];
        let owners: Vec<ResourceId> = ctx
            .find_providers(req)
            .into_iter()
            .map(|cap| ctx.repository().capability(cap).resource)
            .collect();
        assert_eq!(owners, vec![b, a]);
    }

    #[test]
    fn hosted_capability_is_inserted_by_rank() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("3.0"), &[]))
            .unwrap();
        let b = repo
            .add(ResourceBuilder::new("B", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let h = repo.add(ResourceBuilder::new("H", v("1.0"))).unwrap();
        let f = repo
            .add(
                ResourceBuilder::new("F", v("1.0"))
                    .fragment()
                    .host("H")
                    .export("foo", v("2.0"), &[]),
            )
            .unwrap();
        let ctx = RepositoryContext::new(repo);
        let repo = ctx.repository();

        let mut list = vec![
            HostedCapability::declared(repo, repo.resource(a).capabilities[3]),
            HostedCapability::declared(repo, repo.resource(b).capabilities[3]),
        ];
        let hosted = HostedCapability {
            provider: h,
            capability: repo.resource(f).capabilities[1],
        };
        assert_eq!(ctx.insert_hosted_capability(&mut list, hosted), 1);
        assert_eq!(list[1], hosted);
    }

    #[test]
    fn commit_appends_wires() {
        let mut repo = Repository::new();
        let a = repo
            .add(
                ResourceBuilder::new("A", v("1.0"))
                    .export("foo", v("1.0"), &[])
                    .export("bar", v("1.0"), &[]),
            )
            .unwrap();
        let b = repo
            .add(ResourceBuilder::new("B", v("1.0")).import("foo").import("bar"))
            .unwrap();
        let mut ctx = RepositoryContext::new(repo);
        let (foo, bar, reqs) = {
            let repo = ctx.repository();
            (
                repo.resource(a).capabilities[3],
                repo.resource(a).capabilities[4],
                repo.resource(b).requirements.clone(),
            )
        };

        let mut first = WireMap::new();
        first.insert(a, Vec::new());
        first.insert(
            b,
            vec![Wire {
                requirer: b,
                requirement: reqs[0],
                provider: a,
                capability: foo,
            }],
        );
        ctx.commit(&first);
        let mut delta = WireMap::new();
        delta.insert(
            b,
            vec![Wire {
                requirer: b,
                requirement: reqs[1],
                provider: a,
                capability: bar,
            }],
        );
        ctx.commit(&delta);

        assert_eq!(ctx.wires()[&b].len(), 2);
        assert_eq!(ctx.wirings()[&b].required.len(), 2);
        assert!(ctx.is_resolved(a));
    }
}
