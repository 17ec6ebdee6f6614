//! The backtracking search.
//!
//! A resolve starts from one fully populated candidate map. Each permutation
//! is checked for package-space consistency; a conflict queues new
//! permutations that drop the blamed candidates, and the search continues
//! with the next queued permutation until one is consistent or none remain.
//! Permutations derived from the one being checked are tried before older
//! ones, and a permutation whose delta was already tried is skipped.

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, trace};

use tether_core::config::ResolverConfig;
use tether_core::namespace::{self, BUNDLE, HOST, IDENTITY, PACKAGE};
use tether_core::{HostedCapability, HostedRequirement, ResourceId, Wire, WireMap};

use crate::candidates::{Candidates, Delta};
use crate::conflict::{ConflictSide, UsesConflict};
use crate::context::ResolveContext;
use crate::error::{Cause, ResolutionError, Unresolved};
use crate::packages::{Blame, PackageSpaces, UsedBlames};

/// Resolves the resources of a [`ResolveContext`] into wires.
///
/// The resolver keeps no state between calls; one value can serve any number
/// of contexts.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the context's mandatory and optional resources.
    ///
    /// Returns the new wires of every resource that got resolved. Optional
    /// resources that cannot be resolved are left out without error.
    pub fn resolve(&self, ctx: &dyn ResolveContext) -> Result<WireMap, ResolutionError> {
        let mandatory = ctx.mandatory_resources();
        let optional = ctx.optional_resources();
        debug!(
            mandatory = mandatory.len(),
            optional = optional.len(),
            "starting resolve"
        );
        Session::new(ctx, self.config.max_permutations, mandatory, optional, None).run()
    }
}

/// The dynamic requirement being resolved and its caller-supplied candidates.
#[derive(Debug, Clone)]
pub(crate) struct DynamicRequest {
    pub requirement: HostedRequirement,
    pub candidates: Vec<HostedCapability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermutationKind {
    Uses,
    Import,
    Substitute,
}

enum Search {
    Found(Candidates),
    /// Every permutation failed; carries the smallest set of resources blamed
    /// by a single permutation.
    Exhausted(BTreeSet<ResourceId>),
}

struct Frame {
    resource: ResourceId,
    requirements: Vec<HostedRequirement>,
    next: usize,
    permutations: usize,
}

pub(crate) struct Session<'a> {
    ctx: &'a dyn ResolveContext,
    limit: Option<usize>,
    mandatory: Vec<ResourceId>,
    optional: Vec<ResourceId>,
    dynamic: Option<DynamicRequest>,

    uses: VecDeque<Candidates>,
    uses_index: usize,
    imports: VecDeque<Candidates>,
    import_index: usize,
    substitutes: VecDeque<Candidates>,
    substitute_index: usize,

    processed: BTreeSet<Delta>,
    mutated: BTreeSet<HostedRequirement>,
    sub_mutated: BTreeSet<HostedRequirement>,
    multiple_card: Option<Candidates>,
    tried: usize,
}

impl<'a> Session<'a> {
    pub fn new(
        ctx: &'a dyn ResolveContext,
        limit: Option<usize>,
        mandatory: Vec<ResourceId>,
        optional: Vec<ResourceId>,
        dynamic: Option<DynamicRequest>,
    ) -> Self {
        Self {
            ctx,
            limit,
            mandatory,
            optional,
            dynamic,
            uses: VecDeque::new(),
            uses_index: 0,
            imports: VecDeque::new(),
            import_index: 0,
            substitutes: VecDeque::new(),
            substitute_index: 0,
            processed: BTreeSet::new(),
            mutated: BTreeSet::new(),
            sub_mutated: BTreeSet::new(),
            multiple_card: None,
            tried: 0,
        }
    }

    pub fn run(mut self) -> Result<WireMap, ResolutionError> {
        let ctx = self.ctx;
        let repo = ctx.repository();
        loop {
            self.clear_permutations();
            let mut unresolved = Unresolved::default();

            let initial = match self.initial_candidates() {
                Ok(cands) => cands,
                Err(causes) => {
                    for cause in &causes {
                        unresolved.record(repo, cause);
                    }
                    return Err(unresolved.into_error());
                }
            };
            self.add_permutation(PermutationKind::Uses, Some(initial));

            match self.find_valid_candidates(&mut unresolved)? {
                Search::Found(cands) => {
                    let cands = self.multiple_card.take().unwrap_or(cands);
                    let wires = self.wire_map(&cands);
                    debug!(
                        resources = wires.len(),
                        permutations = self.tried,
                        "resolve succeeded"
                    );
                    return Ok(wires);
                }
                Search::Exhausted(faulty) => {
                    let before = self.optional.len();
                    self.optional.retain(|r| !faulty.contains(r));
                    let dropped = before - self.optional.len();
                    if dropped == 0 {
                        debug!(permutations = self.tried, "resolve failed");
                        return Err(unresolved.into_error());
                    }
                    debug!(dropped, "retrying without faulty optional resources");
                }
            }
        }
    }

    fn initial_candidates(&self) -> Result<Candidates, Vec<Cause>> {
        let ctx = self.ctx;
        let repo = ctx.repository();
        let mut cands = Candidates::new();
        match &self.dynamic {
            Some(dynamic) => {
                let host = dynamic.requirement.requirer;
                cands
                    .populate_dynamic(ctx, host, dynamic.requirement, dynamic.candidates.clone())
                    .map_err(|cause| vec![cause])?;
            }
            None => {
                let wirings = ctx.wirings();
                let to_populate: Vec<ResourceId> = self
                    .mandatory
                    .iter()
                    .chain(&self.optional)
                    .copied()
                    .filter(|r| repo.is_fragment(*r) || !wirings.contains_key(r))
                    .collect();
                cands.set_mandatory(self.mandatory.iter().copied());
                cands.populate(ctx, &to_populate);
            }
        }
        cands.prepare(ctx)?;
        Ok(cands)
    }

    fn roots(&self) -> Vec<ResourceId> {
        match &self.dynamic {
            Some(dynamic) => vec![dynamic.requirement.requirer],
            None => self.mandatory.iter().chain(&self.optional).copied().collect(),
        }
    }

    fn find_valid_candidates(
        &mut self,
        unresolved: &mut Unresolved,
    ) -> Result<Search, ResolutionError> {
        let repo = self.ctx.repository();
        let mut faulty: Option<BTreeSet<ResourceId>> = None;
        loop {
            if let Some(limit) = self.limit {
                if self.tried >= limit && self.permutation_count() > 0 {
                    debug!(limit, "permutation limit reached");
                    return Err(ResolutionError::PermutationLimit {
                        limit,
                        unresolved: std::mem::take(unresolved).into_entries(),
                    });
                }
            }
            let Some(mut cands) = self.next_permutation() else {
                return Ok(Search::Exhausted(faulty.unwrap_or_default()));
            };
            self.tried += 1;
            trace!(permutation = self.tried, removed = cands.delta().len(), "checking permutation");

            let mut current = BTreeSet::new();
            let causes = self.check_consistency(&mut cands, &mut current)?;
            if causes.is_empty() {
                return Ok(Search::Found(cands));
            }
            for cause in &causes {
                unresolved.record(repo, cause);
            }
            if !current.is_empty() && self.prefer_faulty(faulty.as_ref(), &current) {
                faulty = Some(current);
            }
        }
    }

    /// Whether `current` should replace `best` as the set of resources to
    /// drop on retry. Sets naming an optional resource win over sets that
    /// only blame mandatory ones, then the smaller set wins.
    fn prefer_faulty(
        &self,
        best: Option<&BTreeSet<ResourceId>>,
        current: &BTreeSet<ResourceId>,
    ) -> bool {
        let Some(best) = best else {
            return true;
        };
        let droppable =
            |set: &BTreeSet<ResourceId>| set.iter().any(|r| self.optional.contains(r));
        match (droppable(best), droppable(current)) {
            (false, true) => true,
            (true, false) => false,
            _ => current.len() < best.len(),
        }
    }

    fn check_consistency(
        &mut self,
        cands: &mut Candidates,
        faulty: &mut BTreeSet<ResourceId>,
    ) -> Result<Vec<Cause>, ResolutionError> {
        let ctx = self.ctx;
        let repo = ctx.repository();

        for requirement in cands.substitutable_requirements() {
            self.permutate_if_needed(PermutationKind::Substitute, requirement, cands);
        }
        if let Err(cause) = cands.check_substitutes(repo) {
            return Ok(vec![cause]);
        }

        let hosts = cands.root_hosts(repo, &self.roots());
        let dynamic = self.dynamic.as_ref().map(|d| d.requirement);
        let spaces = PackageSpaces::calculate(ctx, cands, &hosts, dynamic)?;

        let mut checked = BTreeSet::new();
        let mut causes = Vec::new();
        for host in hosts {
            let Err(cause) = self.check_space(host, cands, &spaces, &mut checked) else {
                continue;
            };
            // Blame the fragment when the failing requirement came from one.
            let resource = cause
                .unresolved(repo)
                .into_iter()
                .map(|r| repo.requirement(r.requirement).resource)
                .find(|declarer| *declarer != host)
                .unwrap_or(host);
            faulty.insert(resource);
            causes.push(cause);
        }
        Ok(causes)
    }

    /// Check `root` and, depth first, every resource it is wired to.
    fn check_space(
        &mut self,
        root: ResourceId,
        cands: &Candidates,
        spaces: &PackageSpaces,
        checked: &mut BTreeSet<ResourceId>,
    ) -> Result<(), Cause> {
        let repo = self.ctx.repository();
        let dynamic = self.dynamic.is_some();
        let mut stack = Vec::new();
        if let Some(frame) = self.enter(root, dynamic, cands, spaces, checked)? {
            stack.push(frame);
        }

        loop {
            let Some(frame) = stack.last_mut() else {
                return Ok(());
            };
            let resource = frame.resource;
            let Some(requirement) = frame.requirements.get(frame.next).copied() else {
                stack.pop();
                continue;
            };
            frame.next += 1;

            let Some(cap) = cands.first(requirement) else {
                continue;
            };
            if cap.provider == resource {
                continue;
            }
            match self.enter(cap.provider, false, cands, spaces, checked) {
                Ok(Some(child)) => stack.push(child),
                Ok(None) => {}
                Err(cause) => {
                    // Backtrack on the requirement that led to the failing
                    // resource unless something below already queued a
                    // permutation.
                    while let Some(frame) = stack.pop() {
                        if frame.permutations == self.permutation_count() {
                            let requirement = frame.requirements[frame.next - 1];
                            debug!(
                                resource = %repo.resource(frame.resource),
                                requirement = %repo.requirement(requirement.requirement),
                                "backtracking"
                            );
                            let permutation = cands.permutate(repo, requirement);
                            self.add_permutation(PermutationKind::Import, permutation);
                        }
                    }
                    return Err(cause);
                }
            }
        }
    }

    fn enter(
        &mut self,
        resource: ResourceId,
        dynamic: bool,
        cands: &Candidates,
        spaces: &PackageSpaces,
        checked: &mut BTreeSet<ResourceId>,
    ) -> Result<Option<Frame>, Cause> {
        let ctx = self.ctx;
        let wiring = ctx.wirings().get(&resource);
        if (!dynamic && wiring.is_some()) || checked.contains(&resource) {
            return Ok(None);
        }
        self.check_own(resource, cands, spaces)?;
        checked.insert(resource);

        let requirements = match wiring {
            Some(wiring) => wiring
                .requirements
                .iter()
                .map(|r| HostedRequirement {
                    requirer: resource,
                    requirement: *r,
                })
                .collect(),
            None => cands.requirements_of(ctx.repository(), resource),
        };
        Ok(Some(Frame {
            resource,
            requirements,
            next: 0,
            permutations: self.permutation_count(),
        }))
    }

    /// Compare one resource's imports and exports with the packages its
    /// `uses` constraints expose it to.
    fn check_own(
        &mut self,
        resource: ResourceId,
        cands: &Candidates,
        spaces: &PackageSpaces,
    ) -> Result<(), Cause> {
        let repo = self.ctx.repository();
        let Some(packages) = spaces.get(resource) else {
            return Ok(());
        };

        // A fragment may import a package its host imports from someone else.
        for (package, blames) in &packages.imported {
            let Some((source, rest)) = blames.split_first() else {
                continue;
            };
            let Some(other) = rest
                .iter()
                .find(|b| b.capability.provider != source.capability.provider)
            else {
                continue;
            };
            self.add_permutation(
                PermutationKind::Import,
                cands.permutate(repo, other.requirements[0]),
            );
            self.add_permutation(
                PermutationKind::Import,
                cands.permutate(repo, source.requirements[0]),
            );
            let conflict = UsesConflict {
                resource,
                package: package.clone(),
                direct: Some(side(source)),
                used: side(other),
            };
            debug!(
                resource = %repo.resource(resource),
                package = %package,
                "conflicting imports from a fragment"
            );
            return Err(Cause::UsesViolation(Box::new(conflict)));
        }

        let mut permutation: Option<Candidates> = None;
        let mut mutated = BTreeSet::new();
        let mut conflict: Option<UsesConflict> = None;

        for (package, export) in &packages.exported {
            let Some(used) = packages.used.get(package) else {
                continue;
            };
            for used_blames in used {
                if spaces.compatible(export.capability, used_blames.capability) {
                    continue;
                }
                for used_blame in &used_blames.blames {
                    if self.check_multiple(used_blames, used_blame, cands) {
                        continue;
                    }
                    let permutation = permutation.get_or_insert_with(|| cands.clone());
                    if conflict.is_none() {
                        conflict = Some(UsesConflict {
                            resource,
                            package: package.clone(),
                            direct: None,
                            used: side(used_blame),
                        });
                    }
                    mutate_blame(repo, permutation, used_blame, &mut mutated);
                }
            }

            if let Some(conflict) = conflict {
                if !mutated.is_empty() {
                    self.add_permutation(PermutationKind::Uses, permutation);
                }
                debug!(
                    resource = %repo.resource(resource),
                    package = %package,
                    "uses conflict between an export and an import"
                );
                return Err(Cause::UsesViolation(Box::new(conflict)));
            }
        }

        for (package, requirement_blames) in packages.imported_and_required() {
            let Some(used) = packages.used.get(package) else {
                continue;
            };
            for used_blames in used {
                if spaces.compatible_any(requirement_blames, used_blames.capability) {
                    continue;
                }
                for used_blame in &used_blames.blames {
                    if self.check_multiple(used_blames, used_blame, cands) {
                        continue;
                    }
                    let permutation = permutation.get_or_insert_with(|| cands.clone());
                    if conflict.is_none() {
                        conflict = Some(UsesConflict {
                            resource,
                            package: package.to_string(),
                            direct: Some(side(&requirement_blames[0])),
                            used: side(used_blame),
                        });
                    }
                    mutate_blame(repo, permutation, used_blame, &mut mutated);
                }

                if let Some(conflict) = conflict {
                    if !mutated.is_empty() {
                        self.add_permutation(PermutationKind::Uses, permutation);
                    }
                    // Also try another provider for the direct import, once.
                    for blame in requirement_blames {
                        let requirement = blame.requirements[0];
                        if !mutated.contains(&requirement) {
                            self.permutate_if_needed(PermutationKind::Import, requirement, cands);
                        }
                    }
                    debug!(
                        resource = %repo.resource(resource),
                        package = %package,
                        "uses conflict between imports"
                    );
                    return Err(Cause::UsesViolation(Box::new(conflict)));
                }
            }
        }

        Ok(())
    }

    /// For a multiple-cardinality root requirement, drop the candidates that
    /// brought in the conflicting package. Returns whether any remain.
    fn check_multiple(&mut self, used: &UsedBlames, blame: &Blame, cands: &Candidates) -> bool {
        let repo = self.ctx.repository();
        let Some(root) = blame.requirements.first().copied() else {
            return false;
        };
        if !repo.requirement(root.requirement).is_multiple() {
            return false;
        }
        let permutation = self.multiple_card.get_or_insert_with(|| cands.clone());
        let remaining = permutation.clear_candidates(root, &used.root_causes(root));
        trace!(
            requirement = %repo.requirement(root.requirement),
            remaining,
            "dropped conflicting candidates of a multiple requirement"
        );
        remaining > 0
    }

    fn permutate_if_needed(
        &mut self,
        kind: PermutationKind,
        requirement: HostedRequirement,
        cands: &Candidates,
    ) {
        let repo = self.ctx.repository();
        if cands.candidates(requirement).map_or(true, |l| l.len() <= 1) {
            return;
        }
        let fresh = match kind {
            PermutationKind::Substitute => self.sub_mutated.insert(requirement),
            PermutationKind::Uses | PermutationKind::Import => self.mutated.insert(requirement),
        };
        if fresh {
            self.add_permutation(kind, cands.permutate(repo, requirement));
        }
    }

    fn add_permutation(&mut self, kind: PermutationKind, permutation: Option<Candidates>) {
        let Some(permutation) = permutation else {
            return;
        };
        let (queue, index) = match kind {
            PermutationKind::Uses => (&mut self.uses, &mut self.uses_index),
            PermutationKind::Import => (&mut self.imports, &mut self.import_index),
            PermutationKind::Substitute => (&mut self.substitutes, &mut self.substitute_index),
        };
        let at = (*index).min(queue.len());
        queue.insert(at, permutation);
        *index = at + 1;
        trace!(kind = ?kind, queued = queue.len(), "permutation queued");
    }

    fn next_permutation(&mut self) -> Option<Candidates> {
        loop {
            let next = self
                .uses
                .pop_front()
                .or_else(|| self.imports.pop_front())
                .or_else(|| self.substitutes.pop_front())?;
            if self.processed.insert(next.delta().clone()) {
                self.multiple_card = None;
                self.uses_index = 0;
                self.import_index = 0;
                self.substitute_index = 0;
                self.mutated.clear();
                return Some(next);
            }
        }
    }

    fn permutation_count(&self) -> usize {
        self.uses.len() + self.imports.len() + self.substitutes.len()
    }

    fn clear_permutations(&mut self) {
        self.uses.clear();
        self.imports.clear();
        self.substitutes.clear();
        self.uses_index = 0;
        self.import_index = 0;
        self.substitute_index = 0;
        self.multiple_card = None;
        self.processed.clear();
        self.mutated.clear();
    }

    fn wire_map(&self, cands: &Candidates) -> WireMap {
        let ctx = self.ctx;
        let mut wires = WireMap::new();
        match &self.dynamic {
            Some(dynamic) => {
                let host = dynamic.requirement.requirer;
                let Some(cap) = cands.first(dynamic.requirement) else {
                    return wires;
                };
                if !ctx.wirings().contains_key(&cap.provider) {
                    self.populate_wire_map(cands, cap.provider, &mut wires);
                }
                wires.insert(
                    host,
                    vec![Wire {
                        requirer: host,
                        requirement: dynamic.requirement.requirement,
                        provider: cap.provider,
                        capability: cap.capability,
                    }],
                );
            }
            None => {
                for root in self.roots() {
                    if cands.is_populated(root) {
                        self.populate_wire_map(cands, root, &mut wires);
                    }
                }
            }
        }
        wires
    }

    fn populate_wire_map(&self, cands: &Candidates, start: ResourceId, wires: &mut WireMap) {
        let ctx = self.ctx;
        let repo = ctx.repository();
        let wirings = ctx.wirings();
        let mut queue = vec![start];

        while let Some(next) = queue.pop() {
            let resource = match cands.host_of(next) {
                Some(host) => host,
                None => next,
            };
            if wirings.contains_key(&resource) || wires.contains_key(&resource) {
                continue;
            }
            wires.insert(resource, Vec::new());

            let mut package = Vec::new();
            let mut bundle = Vec::new();
            let mut other = Vec::new();
            for key in cands.requirements_of(repo, resource) {
                let req = repo.requirement(key.requirement);
                let Some(list) = cands.candidates(key) else {
                    continue;
                };
                for cand in list {
                    let cap = repo.capability(cand.capability);
                    if !(namespace::is_wiring_namespace(&cap.namespace) && cand.provider == resource)
                    {
                        queue.push(cand.provider);
                        let provider = if req.namespace == IDENTITY {
                            cap.resource
                        } else {
                            cand.provider
                        };
                        let wire = Wire {
                            requirer: resource,
                            requirement: key.requirement,
                            provider,
                            capability: cand.capability,
                        };
                        trace!(
                            requirer = %repo.resource(resource),
                            provider = %repo.resource(provider),
                            capability = %cap,
                            "candidate chosen"
                        );
                        match req.namespace.as_str() {
                            PACKAGE => package.push(wire),
                            BUNDLE => bundle.push(wire),
                            _ => other.push(wire),
                        }
                    }
                    if !req.is_multiple() {
                        break;
                    }
                }
            }
            package.append(&mut bundle);
            package.append(&mut other);
            wires.insert(resource, package);

            for fragment in cands.fragments_of(resource) {
                let first_time = !wires.contains_key(fragment);
                let mut fragment_wires = wires.remove(fragment).unwrap_or_default();
                for requirement in repo.resource(*fragment).requirements.iter().copied() {
                    let req = repo.requirement(requirement);
                    if namespace::is_payload(&req.namespace) {
                        continue;
                    }
                    if req.namespace == HOST {
                        let host_cap = repo
                            .resource(resource)
                            .capabilities
                            .iter()
                            .copied()
                            .find(|c| repo.capability(*c).namespace == HOST);
                        if let Some(capability) = host_cap {
                            fragment_wires.push(Wire {
                                requirer: *fragment,
                                requirement,
                                provider: resource,
                                capability,
                            });
                        }
                    } else if first_time && !wirings.contains_key(fragment) {
                        let key = HostedRequirement {
                            requirer: *fragment,
                            requirement,
                        };
                        if let Some(cand) = cands.first(key) {
                            queue.push(cand.provider);
                            fragment_wires.push(Wire {
                                requirer: *fragment,
                                requirement,
                                provider: cand.provider,
                                capability: cand.capability,
                            });
                        }
                    }
                }
                wires.insert(*fragment, fragment_wires);
            }
        }
    }
}

fn side(blame: &Blame) -> ConflictSide {
    ConflictSide {
        capability: blame.capability,
        chain: blame.requirements.clone(),
    }
}

/// Remove the first candidate of the requirement closest to the conflicting
/// provider that still has alternatives.
fn mutate_blame(
    repo: &tether_core::Repository,
    permutation: &mut Candidates,
    blame: &Blame,
    mutated: &mut BTreeSet<HostedRequirement>,
) {
    for requirement in blame.requirements.iter().rev() {
        if repo.requirement(requirement.requirement).is_multiple() {
            continue;
        }
        if mutated.contains(requirement) {
            break;
        }
        if permutation.can_remove(repo, *requirement) {
            permutation.remove_first(*requirement);
            mutated.insert(*requirement);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RepositoryContext;
    use tether_core::{Repository, ResourceBuilder, Version};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn provider_of(
        wires: &WireMap,
        requirer: ResourceId,
        package: &str,
        repo: &Repository,
    ) -> ResourceId {
        wires[&requirer]
            .iter()
            .find(|w| repo.capability(w.capability).name() == Some(package))
            .map(|w| w.provider)
            .unwrap()
    }

    #[test]
    fn single_import_is_wired() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let b = repo.add(ResourceBuilder::new("B", v("1.0")).import("foo")).unwrap();
        let ctx = RepositoryContext::new(repo).with_mandatory(vec![b]);

        let wires = Resolver::default().resolve(&ctx).unwrap();
        assert_eq!(wires[&b].len(), 1);
        assert_eq!(wires[&b][0].provider, a);
        assert!(wires[&a].is_empty());
    }

    #[test]
    fn uses_conflict_switches_provider() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let b = repo
            .add(
                ResourceBuilder::new("B", v("1.0"))
                    .export("foo", v("1.0"), &[])
                    .export("bar", v("1.0"), &["foo"]),
            )
            .unwrap();
        let c = repo
            .add(ResourceBuilder::new("C", v("1.0")).import("foo").import("bar"))
            .unwrap();
        let ctx = RepositoryContext::new(repo).with_mandatory(vec![c]);

        let wires = Resolver::default().resolve(&ctx).unwrap();
        let repo = ctx.repository();
        assert_eq!(provider_of(&wires, c, "foo", repo), b);
        assert_eq!(provider_of(&wires, c, "bar", repo), b);
        assert!(!wires.contains_key(&a));
    }

    #[test]
    fn permutation_limit_stops_the_search() {
        let mut repo = Repository::new();
        repo.add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        repo.add(
            ResourceBuilder::new("B", v("1.0"))
                .export("foo", v("1.0"), &[])
                .export("bar", v("1.0"), &["foo"]),
        )
        .unwrap();
        let c = repo
            .add(ResourceBuilder::new("C", v("1.0")).import("foo").import("bar"))
            .unwrap();
        let ctx = RepositoryContext::new(repo).with_mandatory(vec![c]);

        let resolver = Resolver::new(ResolverConfig {
            max_permutations: Some(1),
        });
        let err = resolver.resolve(&ctx).unwrap_err();
        assert!(matches!(err, ResolutionError::PermutationLimit { limit: 1, .. }));
        assert!(!err.unresolved().is_empty());
    }

    #[test]
    fn fragment_gets_host_wire() {
        let mut repo = Repository::new();
        let h = repo.add(ResourceBuilder::new("H", v("1.0"))).unwrap();
        let f = repo
            .add(
                ResourceBuilder::new("F", v("1.0"))
                    .fragment()
                    .host("H")
                    .export("extra", v("1.0"), &[]),
            )
            .unwrap();
        let ctx = RepositoryContext::new(repo).with_mandatory(vec![h, f]);

        let wires = Resolver::default().resolve(&ctx).unwrap();
        assert_eq!(wires[&f].len(), 1);
        assert_eq!(wires[&f][0].provider, h);
        assert!(wires[&h].is_empty());
    }
}
