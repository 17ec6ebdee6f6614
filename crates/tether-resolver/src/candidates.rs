//! Candidate maps: which capabilities may satisfy which requirement.
//!
//! A [`Candidates`] value is one point in the search space. Populating it
//! walks the transitive closure of the root resources, asks the context for
//! providers, drops resources that cannot resolve, and finally attaches
//! fragments to hosts so that fragment capabilities and payload requirements
//! appear under the host. Permutations are cheap clones that differ from
//! their parent by the candidates they removed (the delta).

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

use tracing::{debug, trace};

use tether_core::namespace::{self, HOST, IDENTITY, PACKAGE};
use tether_core::{
    HostedCapability, HostedRequirement, Repository, RequirementId, ResourceId,
};

use crate::context::ResolveContext;
use crate::error::Cause;

/// Capabilities removed from each requirement's list relative to the initial
/// candidate map. Two permutations with equal deltas are the same search point.
pub(crate) type Delta = BTreeMap<HostedRequirement, BTreeSet<HostedCapability>>;

#[derive(Debug, Clone)]
enum Populated {
    Pending {
        remaining: VecDeque<RequirementId>,
        found: Vec<(RequirementId, Vec<HostedCapability>)>,
    },
    Success,
    Failed(Cause),
}

enum Step {
    Skip,
    Complete(Vec<(RequirementId, Vec<HostedCapability>)>),
    Process(RequirementId),
}

/// State fixed once candidates are prepared and shared by every permutation.
#[derive(Debug, Clone, Default)]
struct Shared {
    mandatory: BTreeSet<ResourceId>,
    populated: BTreeMap<ResourceId, Populated>,
    host_fragments: BTreeMap<ResourceId, Vec<ResourceId>>,
    fragment_host: BTreeMap<ResourceId, ResourceId>,
    /// Exports that an import of the same package may replace.
    substitutable: BTreeMap<HostedCapability, HostedRequirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Substitution {
    Unprocessed,
    Processing,
    Substituted,
    Exported,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Candidates {
    shared: Rc<Shared>,
    candidates: BTreeMap<HostedRequirement, Vec<HostedCapability>>,
    dependents: BTreeMap<HostedCapability, BTreeSet<HostedRequirement>>,
    delta: Delta,
}

fn is_effective(ctx: &dyn ResolveContext, requirement: RequirementId) -> bool {
    ctx.is_effective(requirement) && !ctx.repository().requirement(requirement).is_dynamic()
}

fn requirements_range(
    resource: ResourceId,
) -> std::ops::RangeInclusive<HostedRequirement> {
    HostedRequirement {
        requirer: resource,
        requirement: RequirementId(0),
    }..=HostedRequirement {
        requirer: resource,
        requirement: RequirementId(usize::MAX),
    }
}

fn capabilities_range(resource: ResourceId) -> std::ops::RangeInclusive<HostedCapability> {
    HostedCapability {
        provider: resource,
        capability: tether_core::CapabilityId(0),
    }..=HostedCapability {
        provider: resource,
        capability: tether_core::CapabilityId(usize::MAX),
    }
}

impl Candidates {
    pub fn new() -> Self {
        Self::default()
    }

    fn shared_mut(&mut self) -> &mut Shared {
        Rc::make_mut(&mut self.shared)
    }

    pub fn set_mandatory(&mut self, resources: impl IntoIterator<Item = ResourceId>) {
        self.shared_mut().mandatory.extend(resources);
    }

    /// Populate candidates for `resources` and everything they reach.
    ///
    /// Resources that cannot be populated are marked failed and removed,
    /// together with every resource that depended on them alone.
    pub fn populate(&mut self, ctx: &dyn ResolveContext, resources: &[ResourceId]) {
        let repo = ctx.repository();
        let mut to_remove = BTreeSet::new();
        let mut to_populate: VecDeque<ResourceId> = resources.iter().copied().collect();

        while let Some(&resource) = to_populate.front() {
            match self.next_step(ctx, resource) {
                Step::Skip => {
                    to_populate.pop_front();
                }
                Step::Complete(found) => {
                    to_populate.pop_front();
                    for (requirement, caps) in found {
                        let key = HostedRequirement {
                            requirer: resource,
                            requirement,
                        };
                        self.add_candidates(key, caps);
                    }
                    trace!(resource = %repo.resource(resource), "populated");
                }
                Step::Process(requirement) => {
                    if !is_effective(ctx, requirement) {
                        continue;
                    }
                    let mut caps: Vec<HostedCapability> = ctx
                        .find_providers(requirement)
                        .into_iter()
                        .map(|c| HostedCapability::declared(repo, c))
                        .collect();
                    let mut next = Vec::new();
                    let thrown =
                        self.process_candidates(ctx, &mut next, resource, requirement, &mut caps);

                    if caps.is_empty() && !repo.requirement(requirement).is_optional() {
                        let cause = Cause::MissingRequirement {
                            requirement: HostedRequirement {
                                requirer: resource,
                                requirement,
                            },
                            cause: thrown.map(Box::new),
                        };
                        debug!(
                            resource = %repo.resource(resource),
                            requirement = %repo.requirement(requirement),
                            "no candidates for requirement"
                        );
                        self.shared_mut()
                            .populated
                            .insert(resource, Populated::Failed(cause));
                        to_remove.insert(resource);
                        to_populate.pop_front();
                    } else {
                        if !caps.is_empty() {
                            if let Some(Populated::Pending { found, .. }) =
                                self.shared_mut().populated.get_mut(&resource)
                            {
                                found.push((requirement, caps));
                            }
                        }
                        for provider in next.into_iter().rev() {
                            to_populate.push_front(provider);
                        }
                    }
                }
            }
        }

        while let Some(resource) = to_remove.pop_first() {
            self.remove(repo, resource, &mut to_remove);
        }
    }

    fn next_step(&mut self, ctx: &dyn ResolveContext, resource: ResourceId) -> Step {
        let repo = ctx.repository();
        let resolved_fragment =
            repo.is_fragment(resource) && ctx.wirings().contains_key(&resource);
        let state = self
            .shared_mut()
            .populated
            .entry(resource)
            .or_insert_with(|| {
                // A resolved fragment stays on the hosts it is wired to.
                if resolved_fragment {
                    Populated::Success
                } else {
                    Populated::Pending {
                        remaining: repo.resource(resource).requirements.iter().copied().collect(),
                        found: Vec::new(),
                    }
                }
            });
        let Populated::Pending { remaining, found } = state else {
            return Step::Skip;
        };
        match remaining.pop_front() {
            Some(requirement) => Step::Process(requirement),
            None => {
                let found = std::mem::take(found);
                *state = Populated::Success;
                Step::Complete(found)
            }
        }
    }

    /// Filter the providers of a requirement carried by `requirer`, queueing
    /// unpopulated providers and replacing resolved fragment capabilities by
    /// the capabilities their hosts offer. Returns the first failure met.
    fn process_candidates(
        &self,
        ctx: &dyn ResolveContext,
        to_populate: &mut Vec<ResourceId>,
        requirer: ResourceId,
        requirement: RequirementId,
        caps: &mut Vec<HostedCapability>,
    ) -> Option<Cause> {
        let repo = ctx.repository();
        let wirings = ctx.wirings();
        if repo.requirement(requirement).namespace == HOST {
            caps.retain(|c| !wirings.contains_key(&c.provider));
        }

        let mut thrown = None;
        let mut fragment_caps = Vec::new();
        caps.retain(|cap| {
            let provider = cap.provider;
            let fragment = repo.is_fragment(provider);
            if fragment {
                fragment_caps.push(*cap);
            }
            if (fragment || !wirings.contains_key(&provider)) && provider != requirer {
                match self.shared.populated.get(&provider) {
                    Some(Populated::Failed(cause)) => {
                        if thrown.is_none() {
                            thrown = Some(cause.clone());
                        }
                        return false;
                    }
                    Some(Populated::Success) => {}
                    Some(Populated::Pending { .. }) | None => to_populate.push(provider),
                }
            }
            true
        });

        for fragment_cap in fragment_caps {
            let cap = repo.capability(fragment_cap.capability);
            if cap.namespace == IDENTITY {
                continue;
            }
            let Some(wiring) = wirings.get(&fragment_cap.provider) else {
                continue;
            };
            for wire in &wiring.required {
                if repo.requirement(wire.requirement).namespace != HOST {
                    continue;
                }
                let hosted = HostedCapability {
                    provider: wire.provider,
                    capability: fragment_cap.capability,
                };
                let offered = !cap.is_package()
                    || wirings
                        .get(&wire.provider)
                        .is_some_and(|w| w.capabilities.contains(&hosted));
                if offered {
                    caps.retain(|c| *c != fragment_cap);
                    ctx.insert_hosted_capability(caps, hosted);
                }
            }
        }

        thrown
    }

    fn add_candidates(&mut self, key: HostedRequirement, caps: Vec<HostedCapability>) {
        for cap in &caps {
            self.dependents.entry(*cap).or_default().insert(key);
        }
        self.candidates.insert(key, caps);
    }

    /// Drop every requirement carried by and capability offered by `resource`.
    /// Requirers left without candidates are marked failed and queued.
    fn remove(
        &mut self,
        repo: &Repository,
        resource: ResourceId,
        unresolved: &mut BTreeSet<ResourceId>,
    ) {
        let requirements: Vec<HostedRequirement> = self
            .candidates
            .range(requirements_range(resource))
            .map(|(k, _)| *k)
            .collect();
        for key in requirements {
            if let Some(caps) = self.candidates.remove(&key) {
                for cap in caps {
                    if let Some(dependents) = self.dependents.get_mut(&cap) {
                        dependents.remove(&key);
                    }
                }
            }
        }

        let capabilities: Vec<HostedCapability> = self
            .dependents
            .range(capabilities_range(resource))
            .map(|(k, _)| *k)
            .collect();
        for cap in capabilities {
            let Some(dependents) = self.dependents.remove(&cap) else {
                continue;
            };
            for dependent in dependents {
                let Some(list) = self.candidates.get_mut(&dependent) else {
                    continue;
                };
                list.retain(|c| *c != cap);
                if !list.is_empty() {
                    continue;
                }
                self.candidates.remove(&dependent);
                if repo.requirement(dependent.requirement).is_optional() {
                    continue;
                }
                let cause = self.failure(cap.provider).cloned().map(Box::new);
                let shared = self.shared_mut();
                if let Some(state) = shared.populated.get_mut(&dependent.requirer) {
                    *state = Populated::Failed(Cause::MissingRequirement {
                        requirement: dependent,
                        cause,
                    });
                }
                unresolved.insert(dependent.requirer);
            }
        }
    }

    fn remove_resource(&mut self, repo: &Repository, resource: ResourceId, cause: Cause) {
        self.shared_mut()
            .populated
            .insert(resource, Populated::Failed(cause));
        let mut unresolved = BTreeSet::new();
        self.remove(repo, resource, &mut unresolved);
        while let Some(next) = unresolved.pop_first() {
            self.remove(repo, next, &mut unresolved);
        }
    }

    /// Attach fragments to hosts and check that every mandatory resource is
    /// still populated.
    ///
    /// Each fragment attaches to the first host in its candidate list. When
    /// several fragments with the same name compete for one host, the highest
    /// version wins and the others move on to their next host, failing when
    /// none remain.
    pub fn prepare(&mut self, ctx: &dyn ResolveContext) -> Result<(), Vec<Cause>> {
        let repo = ctx.repository();
        self.select_fragments(repo);

        let mut attached: BTreeMap<ResourceId, Vec<ResourceId>> = BTreeMap::new();
        for (key, caps) in &self.candidates {
            if !repo.is_fragment(key.requirer)
                || repo.requirement(key.requirement).namespace != HOST
            {
                continue;
            }
            if let Some(host) = caps.first() {
                attached.entry(host.provider).or_default().push(key.requirer);
            }
        }

        for (host, fragments) in &attached {
            for fragment in fragments {
                for capability in repo.resource(*fragment).capabilities.iter().copied() {
                    if repo.capability(capability).namespace == IDENTITY {
                        continue;
                    }
                    let original = HostedCapability {
                        provider: *fragment,
                        capability,
                    };
                    let hosted = HostedCapability {
                        provider: *host,
                        capability,
                    };
                    let Some(dependents) = self.dependents.remove(&original) else {
                        continue;
                    };
                    for dependent in &dependents {
                        if let Some(list) = self.candidates.get_mut(dependent) {
                            if let Some(index) = list.iter().position(|c| *c == original) {
                                list.remove(index);
                            }
                            ctx.insert_hosted_capability(list, hosted);
                        }
                    }
                    self.dependents.entry(hosted).or_default().extend(dependents);
                }
            }
        }

        for (host, fragments) in &attached {
            for fragment in fragments {
                for requirement in repo.resource(*fragment).requirements.iter().copied() {
                    if !namespace::is_payload(&repo.requirement(requirement).namespace) {
                        continue;
                    }
                    let original = HostedRequirement {
                        requirer: *fragment,
                        requirement,
                    };
                    let hosted = HostedRequirement {
                        requirer: *host,
                        requirement,
                    };
                    let Some(caps) = self.candidates.remove(&original) else {
                        continue;
                    };
                    for cap in &caps {
                        if let Some(dependents) = self.dependents.get_mut(cap) {
                            dependents.remove(&original);
                            dependents.insert(hosted);
                        }
                    }
                    self.candidates.insert(hosted, caps);
                }
                debug!(
                    fragment = %repo.resource(*fragment),
                    host = %repo.resource(*host),
                    "attached fragment"
                );
            }
        }

        let shared = self.shared_mut();
        for (host, fragments) in &attached {
            for fragment in fragments {
                shared.fragment_host.insert(*fragment, *host);
            }
        }
        shared.host_fragments = attached;

        let causes: Vec<Cause> = self
            .shared
            .mandatory
            .iter()
            .filter_map(|r| match self.shared.populated.get(r) {
                Some(Populated::Failed(cause)) => Some(cause.clone()),
                _ => None,
            })
            .collect();
        if !causes.is_empty() {
            return Err(causes);
        }

        self.populate_substitutables(repo);
        Ok(())
    }

    fn select_fragments(&mut self, repo: &Repository) {
        loop {
            let mut contenders: BTreeMap<(ResourceId, &str), Vec<HostedRequirement>> =
                BTreeMap::new();
            for (key, caps) in &self.candidates {
                if !repo.is_fragment(key.requirer)
                    || repo.requirement(key.requirement).namespace != HOST
                {
                    continue;
                }
                if let Some(host) = caps.first() {
                    let name = repo.resource(key.requirer).name.as_str();
                    contenders.entry((host.provider, name)).or_default().push(*key);
                }
            }

            let mut losers = Vec::new();
            for keys in contenders.into_values() {
                let Some(winner) = keys.iter().copied().max_by(|a, b| {
                    repo.resource(a.requirer)
                        .version
                        .cmp(&repo.resource(b.requirer).version)
                        .then(b.requirer.cmp(&a.requirer))
                }) else {
                    continue;
                };
                losers.extend(keys.into_iter().filter(|k| *k != winner));
            }
            if losers.is_empty() {
                return;
            }

            for loser in losers {
                let Some(list) = self.candidates.get_mut(&loser) else {
                    continue;
                };
                let host = list.remove(0);
                if let Some(dependents) = self.dependents.get_mut(&host) {
                    dependents.remove(&loser);
                }
                if list.is_empty() {
                    self.candidates.remove(&loser);
                    debug!(fragment = %repo.resource(loser.requirer), "fragment not selected");
                    self.remove_resource(
                        repo,
                        loser.requirer,
                        Cause::FragmentNotSelected {
                            fragment: loser.requirer,
                        },
                    );
                }
            }
        }
    }

    fn populate_substitutables(&mut self, repo: &Repository) {
        let populated: Vec<ResourceId> = self
            .shared
            .populated
            .iter()
            .filter(|(r, state)| matches!(state, Populated::Success) && !repo.is_fragment(**r))
            .map(|(r, _)| *r)
            .collect();

        let mut substitutable = BTreeMap::new();
        for resource in populated {
            let mut exports: BTreeMap<&str, Vec<HostedCapability>> = BTreeMap::new();
            for hosted in self.capabilities_of(repo, resource) {
                let cap = repo.capability(hosted.capability);
                if !cap.is_package() {
                    continue;
                }
                if let Some(name) = cap.name() {
                    exports.entry(name).or_default().push(hosted);
                }
            }
            if exports.is_empty() {
                continue;
            }
            for key in self.requirements_of(repo, resource) {
                if repo.requirement(key.requirement).namespace != PACKAGE {
                    continue;
                }
                let Some(substitutes) = self.candidates.get(&key).filter(|l| !l.is_empty()) else {
                    continue;
                };
                let Some(name) = repo.capability(substitutes[0].capability).name() else {
                    continue;
                };
                let Some(exported) = exports.get(name) else {
                    continue;
                };
                if !substitutes.iter().all(|s| exported.contains(s)) {
                    for export in exported {
                        substitutable.insert(*export, key);
                    }
                }
            }
        }
        self.shared_mut().substitutable = substitutable;
    }

    /// Requirements that may substitute one of their resource's exports.
    pub fn substitutable_requirements(&self) -> Vec<HostedRequirement> {
        let unique: BTreeSet<HostedRequirement> =
            self.shared.substitutable.values().copied().collect();
        unique.into_iter().collect()
    }

    /// Remove substituted exports from the head of every candidate list.
    pub fn check_substitutes(&mut self, repo: &Repository) -> Result<(), Cause> {
        let mut statuses: BTreeMap<HostedCapability, Substitution> = self
            .shared
            .substitutable
            .keys()
            .map(|c| (*c, Substitution::Unprocessed))
            .collect();
        let substitutable: Vec<HostedCapability> =
            self.shared.substitutable.keys().copied().collect();
        for cap in &substitutable {
            self.is_substituted(*cap, &mut statuses);
        }

        for cap in substitutable {
            let Some(dependents) = self.dependents.get(&cap) else {
                continue;
            };
            let dependents: Vec<HostedRequirement> = dependents.iter().copied().collect();
            for dependent in dependents {
                let Some(list) = self.candidates.get_mut(&dependent) else {
                    continue;
                };
                while let Some(first) = list.first() {
                    match statuses.get(first).copied().unwrap_or(Substitution::Exported) {
                        Substitution::Exported => break,
                        _ => {
                            list.remove(0);
                        }
                    }
                }
                if list.is_empty() {
                    if repo.requirement(dependent.requirement).is_optional() {
                        self.candidates.remove(&dependent);
                    } else {
                        return Err(Cause::MissingRequirement {
                            requirement: dependent,
                            cause: None,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn is_substituted(
        &self,
        cap: HostedCapability,
        statuses: &mut BTreeMap<HostedCapability, Substitution>,
    ) -> bool {
        match statuses.get(&cap) {
            None | Some(Substitution::Exported) => return false,
            Some(Substitution::Substituted) => return true,
            Some(Substitution::Processing) => {
                // Cycle: the export that started it stays exported.
                statuses.insert(cap, Substitution::Exported);
                return false;
            }
            Some(Substitution::Unprocessed) => {}
        }
        let Some(requirement) = self.shared.substitutable.get(&cap) else {
            return false;
        };
        statuses.insert(cap, Substitution::Processing);
        if let Some(substitutes) = self.candidates.get(requirement) {
            for substitute in substitutes {
                if substitute.provider == cap.provider {
                    statuses.insert(cap, Substitution::Exported);
                    return false;
                }
                if !self.is_substituted(*substitute, statuses) {
                    statuses.insert(cap, Substitution::Substituted);
                    return true;
                }
            }
        }
        statuses.insert(cap, Substitution::Exported);
        false
    }

    /// Seed candidates for a dynamic requirement of an already resolved host.
    pub fn populate_dynamic(
        &mut self,
        ctx: &dyn ResolveContext,
        host: ResourceId,
        requirement: HostedRequirement,
        mut caps: Vec<HostedCapability>,
    ) -> Result<(), Cause> {
        self.shared_mut().mandatory.insert(host);

        let mut next = Vec::new();
        let thrown =
            self.process_candidates(ctx, &mut next, host, requirement.requirement, &mut caps);
        self.add_candidates(requirement, caps.clone());
        self.populate(ctx, &next);

        let remaining = self.candidates.get(&requirement);
        caps.retain(|c| remaining.is_some_and(|l| l.contains(c)));
        if caps.is_empty() {
            return Err(thrown.unwrap_or(Cause::DynamicImportFailed { requirement }));
        }
        self.shared_mut().populated.insert(host, Populated::Success);
        Ok(())
    }

    /// A copy of this candidate map with the first candidate of `requirement`
    /// removed, if that is allowed.
    pub fn permutate(&self, repo: &Repository, requirement: HostedRequirement) -> Option<Self> {
        if repo.requirement(requirement.requirement).is_multiple()
            || !self.can_remove(repo, requirement)
        {
            return None;
        }
        let mut permutation = self.clone();
        permutation.remove_first(requirement);
        Some(permutation)
    }

    pub fn can_remove(&self, repo: &Repository, requirement: HostedRequirement) -> bool {
        self.candidates.get(&requirement).is_some_and(|l| {
            l.len() > 1 || repo.requirement(requirement.requirement).is_optional()
        })
    }

    pub fn remove_first(&mut self, requirement: HostedRequirement) -> Option<HostedCapability> {
        let list = self.candidates.get_mut(&requirement)?;
        if list.is_empty() {
            return None;
        }
        let removed = list.remove(0);
        if list.is_empty() {
            self.candidates.remove(&requirement);
        }
        self.delta.entry(requirement).or_default().insert(removed);
        Some(removed)
    }

    /// Remove `caps` from the candidates of `requirement`, returning how many
    /// candidates remain.
    pub fn clear_candidates(
        &mut self,
        requirement: HostedRequirement,
        caps: &BTreeSet<HostedCapability>,
    ) -> usize {
        let Some(list) = self.candidates.get_mut(&requirement) else {
            return 0;
        };
        list.retain(|c| !caps.contains(c));
        let remaining = list.len();
        self.delta
            .entry(requirement)
            .or_default()
            .extend(caps.iter().copied());
        remaining
    }

    pub fn candidates(&self, requirement: HostedRequirement) -> Option<&[HostedCapability]> {
        self.candidates.get(&requirement).map(Vec::as_slice)
    }

    pub fn first(&self, requirement: HostedRequirement) -> Option<HostedCapability> {
        self.candidates.get(&requirement).and_then(|l| l.first().copied())
    }

    pub fn delta(&self) -> &Delta {
        &self.delta
    }

    pub fn is_populated(&self, resource: ResourceId) -> bool {
        matches!(self.shared.populated.get(&resource), Some(Populated::Success))
    }

    pub fn failure(&self, resource: ResourceId) -> Option<&Cause> {
        match self.shared.populated.get(&resource) {
            Some(Populated::Failed(cause)) => Some(cause),
            _ => None,
        }
    }

    pub fn host_of(&self, fragment: ResourceId) -> Option<ResourceId> {
        self.shared.fragment_host.get(&fragment).copied()
    }

    pub fn fragments_of(&self, host: ResourceId) -> &[ResourceId] {
        self.shared
            .host_fragments
            .get(&host)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Requirements carried by `resource`, including attached fragment payload.
    pub fn requirements_of(
        &self,
        repo: &Repository,
        resource: ResourceId,
    ) -> Vec<HostedRequirement> {
        let own = repo.resource(resource).requirements.iter().copied();
        let payload = self.fragments_of(resource).iter().flat_map(|f| {
            repo.resource(*f)
                .requirements
                .iter()
                .copied()
                .filter(|r| namespace::is_payload(&repo.requirement(*r).namespace))
        });
        own.chain(payload)
            .map(|requirement| HostedRequirement {
                requirer: resource,
                requirement,
            })
            .collect()
    }

    /// Capabilities offered by `resource`, including attached fragment ones.
    pub fn capabilities_of(
        &self,
        repo: &Repository,
        resource: ResourceId,
    ) -> Vec<HostedCapability> {
        let own = repo.resource(resource).capabilities.iter().copied();
        let attached = self.fragments_of(resource).iter().flat_map(|f| {
            repo.resource(*f)
                .capabilities
                .iter()
                .copied()
                .filter(|c| repo.capability(*c).namespace != IDENTITY)
        });
        own.chain(attached)
            .map(|capability| HostedCapability {
                provider: resource,
                capability,
            })
            .collect()
    }

    /// Hosts whose package spaces must be checked: the populated roots, with
    /// attached fragments replaced by their host.
    pub fn root_hosts(&self, repo: &Repository, roots: &[ResourceId]) -> Vec<ResourceId> {
        let mut seen = BTreeSet::new();
        let mut hosts = Vec::new();
        for root in roots {
            if !self.is_populated(*root) {
                continue;
            }
            let host = if repo.is_fragment(*root) {
                match self.host_of(*root) {
                    Some(host) => host,
                    None => continue,
                }
            } else {
                *root
            };
            if seen.insert(host) {
                hosts.push(host);
            }
        }
        hosts
    }
}
