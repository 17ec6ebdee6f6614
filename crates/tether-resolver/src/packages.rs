//! Package spaces.
//!
//! For every resource reachable from the roots of a permutation this module
//! computes which package capabilities the resource exports, imports, obtains
//! through bundle requirements, and is exposed to through `uses` constraints.
//! The resolver compares these sets to detect class-space conflicts.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tether_core::namespace::{BUNDLE, PACKAGE};
use tether_core::{HostedCapability, HostedRequirement, Repository, ResourceId};

use crate::candidates::Candidates;
use crate::context::ResolveContext;
use crate::error::ResolutionError;

/// A requirement paired with the capability currently selected for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WireCandidate {
    pub requirement: HostedRequirement,
    pub capability: HostedCapability,
}

/// A capability together with the requirement chain that made it visible.
/// Exports carry an empty chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Blame {
    pub capability: HostedCapability,
    pub requirements: Vec<HostedRequirement>,
}

/// Every chain through which one provider of a package is used.
#[derive(Debug, Clone)]
pub(crate) struct UsedBlames {
    pub capability: HostedCapability,
    pub blames: Vec<Blame>,
    root_causes: BTreeMap<HostedRequirement, BTreeSet<HostedCapability>>,
}

impl UsedBlames {
    fn new(capability: HostedCapability) -> Self {
        Self {
            capability,
            blames: Vec::new(),
            root_causes: BTreeMap::new(),
        }
    }

    fn add(&mut self, repo: &Repository, blame: Blame, root_cause: Option<HostedCapability>) {
        if let (Some(cause), Some(root)) = (root_cause, blame.requirements.first()) {
            // Multiple-cardinality roots remember which candidate pulled the
            // used capability in, so that only that candidate is dropped.
            if repo.requirement(root.requirement).is_multiple() {
                self.root_causes.entry(*root).or_default().insert(cause);
            }
        }
        self.blames.push(blame);
    }

    pub fn root_causes(&self, requirement: HostedRequirement) -> BTreeSet<HostedCapability> {
        self.root_causes
            .get(&requirement)
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum Source {
    Package(String),
    Itself,
    Nothing,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Packages {
    pub exported: BTreeMap<String, Blame>,
    pub imported: BTreeMap<String, Vec<Blame>>,
    pub required: BTreeMap<String, Vec<Blame>>,
    pub used: BTreeMap<String, Vec<UsedBlames>>,
    package_sources: BTreeMap<String, BTreeSet<HostedCapability>>,
    sources: BTreeMap<HostedCapability, Source>,
}

impl Packages {
    /// Imported packages shadow packages of the same name from required bundles.
    pub fn imported_and_required(&self) -> BTreeMap<&str, &[Blame]> {
        let mut all: BTreeMap<&str, &[Blame]> = self
            .required
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        for (name, blames) in &self.imported {
            all.insert(name.as_str(), blames.as_slice());
        }
        all
    }
}

/// State of one resource's `uses` traversal.
struct UsesWalk {
    current: ResourceId,
    used: BTreeMap<String, Vec<UsedBlames>>,
    visited: BTreeSet<HostedCapability>,
}

/// Package spaces of every resource reachable from a set of hosts.
#[derive(Debug, Default)]
pub(crate) struct PackageSpaces {
    spaces: BTreeMap<ResourceId, Packages>,
}

impl PackageSpaces {
    /// Compute the package spaces for the permutation `cands`, starting at
    /// `hosts`. `dynamic` is the requirement being dynamically resolved, if any.
    pub fn calculate(
        ctx: &dyn ResolveContext,
        cands: &Candidates,
        hosts: &[ResourceId],
        dynamic: Option<HostedRequirement>,
    ) -> Result<Self, ResolutionError> {
        let repo = ctx.repository();
        let wirings = ctx.wirings();

        let mut wire_candidates: BTreeMap<ResourceId, Vec<WireCandidate>> = BTreeMap::new();
        let mut queue: VecDeque<ResourceId> = hosts.iter().copied().collect();
        while let Some(resource) = queue.pop_front() {
            if wire_candidates.contains_key(&resource) {
                continue;
            }
            let list = wire_candidates_of(ctx, cands, resource, dynamic);
            queue.extend(list.iter().map(|w| w.capability.provider));
            wire_candidates.insert(resource, list);
        }

        let mut spaces: BTreeMap<ResourceId, Packages> = wire_candidates
            .keys()
            .map(|r| {
                let packages = Packages {
                    exported: exported_packages(ctx, cands, *r),
                    ..Packages::default()
                };
                (*r, packages)
            })
            .collect();

        let mut merged = Vec::with_capacity(spaces.len());
        for (resource, list) in &wire_candidates {
            let mut imported: BTreeMap<String, Vec<Blame>> = BTreeMap::new();
            let mut required: BTreeMap<String, Vec<Blame>> = BTreeMap::new();
            for wire in list {
                if Some(wire.requirement) == dynamic {
                    let cap = repo.capability(wire.capability.capability);
                    let name = cap.name().unwrap_or_default();
                    let own = &spaces[resource];
                    if own.exported.contains_key(name)
                        || imported.contains_key(name)
                        || required.contains_key(name)
                    {
                        return Err(ResolutionError::InvalidDynamicContext {
                            reason: format!(
                                "Resource {} cannot dynamically import package '{name}' since it already has access to it",
                                repo.resource(*resource)
                            ),
                        });
                    }
                }
                merge_candidate_packages(
                    ctx,
                    cands,
                    &spaces,
                    &mut imported,
                    &mut required,
                    wire.requirement,
                    wire.capability,
                );
            }
            merged.push((*resource, imported, required));
        }
        for (resource, imported, required) in merged {
            if let Some(packages) = spaces.get_mut(&resource) {
                packages.imported = imported;
                packages.required = required;
            }
        }

        compute_sources(ctx, cands, &mut spaces);

        let mut this = Self { spaces };
        let mut uses = Vec::new();
        for (resource, list) in &wire_candidates {
            let dynamic_importing = dynamic.is_some_and(|d| {
                d.requirer == *resource && list.iter().any(|w| w.requirement == d)
            });
            if wirings.contains_key(resource) && !dynamic_importing {
                continue;
            }
            uses.push((*resource, this.compute_uses(repo, *resource, list)));
        }
        for (resource, used) in uses {
            if let Some(packages) = this.spaces.get_mut(&resource) {
                packages.used = used;
            }
        }
        Ok(this)
    }

    pub fn get(&self, resource: ResourceId) -> Option<&Packages> {
        self.spaces.get(&resource)
    }

    /// Package capabilities that are equivalent to `cap` as far as class
    /// spaces go: every capability with the same package name on its
    /// provider, plus what those obtain through required bundles.
    pub fn sources(&self, cap: HostedCapability) -> Cow<'_, BTreeSet<HostedCapability>> {
        sources_in(&self.spaces, cap)
    }

    pub fn compatible(&self, current: HostedCapability, candidate: HostedCapability) -> bool {
        if current == candidate {
            return true;
        }
        let candidate = self.sources(candidate);
        let current = self.sources(current);
        current.is_superset(&candidate) || candidate.is_superset(&current)
    }

    pub fn compatible_any(&self, current: &[Blame], candidate: HostedCapability) -> bool {
        match current {
            [] => true,
            [one] => self.compatible(one.capability, candidate),
            many => {
                let current: BTreeSet<HostedCapability> = many
                    .iter()
                    .flat_map(|b| self.sources(b.capability).into_owned())
                    .collect();
                let candidate = self.sources(candidate);
                current.is_superset(&candidate) || candidate.is_superset(&current)
            }
        }
    }

    fn compute_uses(
        &self,
        repo: &Repository,
        resource: ResourceId,
        wire_candidates: &[WireCandidate],
    ) -> BTreeMap<String, Vec<UsedBlames>> {
        let mut walk = UsesWalk {
            current: resource,
            used: BTreeMap::new(),
            visited: BTreeSet::new(),
        };
        let Some(packages) = self.spaces.get(&resource) else {
            return walk.used;
        };

        for wire in wire_candidates {
            let namespace = repo.requirement(wire.requirement.requirement).namespace.as_str();
            if namespace == BUNDLE || namespace == PACKAGE {
                continue;
            }
            self.merge_uses(
                repo,
                &mut walk,
                wire.capability,
                vec![wire.requirement],
                Some(wire.capability),
            );
        }
        for blames in packages.imported.values().chain(packages.required.values()) {
            for blame in blames {
                let root = blame.requirements[..1].to_vec();
                self.merge_uses(repo, &mut walk, blame.capability, root, None);
            }
        }
        walk.used
    }

    /// Follow the `uses` constraints of `cap` transitively, recording every
    /// package provider they expose `current` to.
    fn merge_uses(
        &self,
        repo: &Repository,
        walk: &mut UsesWalk,
        cap: HostedCapability,
        requirements: Vec<HostedRequirement>,
        root_cause: Option<HostedCapability>,
    ) {
        let mut stack: Vec<(HostedCapability, Vec<HostedRequirement>, Option<String>)> =
            vec![(cap, requirements, None)];

        while let Some((cap, requirements, package)) = stack.pop() {
            if let Some(package) = package {
                let entries = walk.used.entry(package).or_default();
                let index = match entries.iter().position(|u| u.capability == cap) {
                    Some(index) => index,
                    None => {
                        entries.push(UsedBlames::new(cap));
                        entries.len() - 1
                    }
                };
                let blame = Blame {
                    capability: cap,
                    requirements: requirements.clone(),
                };
                entries[index].add(repo, blame, root_cause);
            }

            if cap.provider == walk.current || !walk.visited.insert(cap) {
                continue;
            }

            let mut children = Vec::new();
            for source in self.sources(cap).iter() {
                let uses = repo.capability(source.capability).uses();
                if uses.is_empty() {
                    continue;
                }
                let Some(source_packages) = self.spaces.get(&source.provider) else {
                    continue;
                };
                for package in uses {
                    let blames: &[Blame] = match source_packages.exported.get(&package) {
                        Some(export) => std::slice::from_ref(export),
                        None => match source_packages
                            .required
                            .get(&package)
                            .or_else(|| source_packages.imported.get(&package))
                        {
                            Some(blames) => blames,
                            None => continue,
                        },
                    };
                    for blame in blames {
                        let mut chain = requirements.clone();
                        if let Some(last) = blame.requirements.last() {
                            chain.push(*last);
                        }
                        children.push((blame.capability, chain, Some(package.clone())));
                    }
                }
            }
            stack.extend(children.into_iter().rev());
        }
    }
}

fn sources_in(
    spaces: &BTreeMap<ResourceId, Packages>,
    cap: HostedCapability,
) -> Cow<'_, BTreeSet<HostedCapability>> {
    let Some(packages) = spaces.get(&cap.provider) else {
        return Cow::Owned(BTreeSet::new());
    };
    match packages.sources.get(&cap) {
        Some(Source::Package(name)) => packages
            .package_sources
            .get(name)
            .map(Cow::Borrowed)
            .unwrap_or_default(),
        Some(Source::Itself) => Cow::Owned(BTreeSet::from([cap])),
        Some(Source::Nothing) | None => Cow::Owned(BTreeSet::new()),
    }
}

fn wire_candidates_of(
    ctx: &dyn ResolveContext,
    cands: &Candidates,
    resource: ResourceId,
    dynamic: Option<HostedRequirement>,
) -> Vec<WireCandidate> {
    let repo = ctx.repository();
    if let Some(wiring) = ctx.wirings().get(&resource) {
        let mut list: Vec<WireCandidate> = wiring
            .required
            .iter()
            .map(|w| WireCandidate {
                requirement: w.hosted_requirement(),
                capability: w.hosted(),
            })
            .collect();
        // The dynamic requirement goes last.
        if let Some(dynamic) = dynamic.filter(|d| d.requirer == resource) {
            if let Some(capability) = cands.first(dynamic) {
                list.push(WireCandidate {
                    requirement: dynamic,
                    capability,
                });
            }
        }
        return list;
    }

    let mut list = Vec::new();
    for key in cands.requirements_of(repo, resource) {
        let requirement = repo.requirement(key.requirement);
        if requirement.is_dynamic() {
            continue;
        }
        let Some(caps) = cands.candidates(key) else {
            continue;
        };
        if requirement.is_multiple() {
            list.extend(caps.iter().map(|c| WireCandidate {
                requirement: key,
                capability: *c,
            }));
        } else if let Some(first) = caps.first() {
            list.push(WireCandidate {
                requirement: key,
                capability: *first,
            });
        }
    }
    list
}

/// Capabilities a resource offers in this permutation: the wiring's for a
/// resolved resource, the hosted view otherwise.
fn offered(
    ctx: &dyn ResolveContext,
    cands: &Candidates,
    resource: ResourceId,
) -> (Vec<HostedCapability>, bool) {
    match ctx.wirings().get(&resource) {
        Some(wiring) => (wiring.capabilities.clone(), true),
        None => (cands.capabilities_of(ctx.repository(), resource), false),
    }
}

fn exported_packages(
    ctx: &dyn ResolveContext,
    cands: &Candidates,
    resource: ResourceId,
) -> BTreeMap<String, Blame> {
    let repo = ctx.repository();
    let (caps, resolved) = offered(ctx, cands, resource);
    let mut exports = BTreeMap::new();
    for hosted in caps {
        let cap = repo.capability(hosted.capability);
        if !cap.is_package() {
            continue;
        }
        if let Some(name) = cap.name() {
            exports.insert(
                name.to_string(),
                Blame {
                    capability: hosted,
                    requirements: Vec::new(),
                },
            );
        }
    }

    // Wirings already drop substituted exports.
    if !resolved && !exports.is_empty() {
        for key in cands.requirements_of(repo, resource) {
            if repo.requirement(key.requirement).namespace != PACKAGE {
                continue;
            }
            if let Some(first) = cands.first(key) {
                if let Some(name) = repo.capability(first.capability).name() {
                    exports.remove(name);
                }
            }
        }
    }
    exports
}

fn merge_candidate_packages(
    ctx: &dyn ResolveContext,
    cands: &Candidates,
    spaces: &BTreeMap<ResourceId, Packages>,
    imported: &mut BTreeMap<String, Vec<Blame>>,
    required: &mut BTreeMap<String, Vec<Blame>>,
    requirement: HostedRequirement,
    capability: HostedCapability,
) {
    let repo = ctx.repository();
    let mut cycles = BTreeSet::new();
    let mut visited_bundles = BTreeSet::new();
    let mut stack = vec![capability];

    while let Some(hosted) = stack.pop() {
        if !cycles.insert(hosted) {
            continue;
        }
        let cap = repo.capability(hosted.capability);
        if cap.is_package() {
            if let Some(name) = cap.name() {
                imported.entry(name.to_string()).or_default().push(Blame {
                    capability: hosted,
                    requirements: vec![requirement],
                });
            }
            continue;
        }
        if cap.namespace != BUNDLE {
            continue;
        }

        if visited_bundles.insert(hosted.provider) {
            if let Some(target) = spaces.get(&hosted.provider) {
                for (name, export) in &target.exported {
                    required.entry(name.clone()).or_default().push(Blame {
                        capability: export.capability,
                        requirements: vec![requirement],
                    });
                }
            }
        }

        // Packages of bundles the target re-exports are visible too.
        let mut reexported = Vec::new();
        match ctx.wirings().get(&hosted.provider) {
            Some(wiring) => {
                for wire in &wiring.required {
                    let req = repo.requirement(wire.requirement);
                    if req.namespace == BUNDLE && req.is_reexport() {
                        reexported.push(wire.hosted());
                    }
                }
            }
            None => {
                for key in cands.requirements_of(repo, hosted.provider) {
                    let req = repo.requirement(key.requirement);
                    if req.namespace == BUNDLE && req.is_reexport() {
                        if let Some(first) = cands.first(key) {
                            reexported.push(first);
                        }
                    }
                }
            }
        }
        stack.extend(reexported.into_iter().rev());
    }
}

fn compute_sources(
    ctx: &dyn ResolveContext,
    cands: &Candidates,
    spaces: &mut BTreeMap<ResourceId, Packages>,
) {
    let repo = ctx.repository();
    for (resource, packages) in spaces.iter_mut() {
        let (caps, _) = offered(ctx, cands, *resource);
        for hosted in caps {
            let cap = repo.capability(hosted.capability);
            let source = match cap.name() {
                Some(name) if cap.is_package() => {
                    packages
                        .package_sources
                        .entry(name.to_string())
                        .or_default()
                        .insert(hosted);
                    Source::Package(name.to_string())
                }
                _ if !cap.uses().is_empty() => Source::Itself,
                _ => Source::Nothing,
            };
            packages.sources.insert(hosted, source);
        }
    }

    // Split packages: a package also exported by a required bundle has that
    // bundle's sources too. Iterate until no set grows.
    loop {
        let mut additions: Vec<(ResourceId, String, Vec<HostedCapability>)> = Vec::new();
        for (resource, packages) in spaces.iter() {
            for (name, own) in &packages.package_sources {
                let Some(blames) = packages.required.get(name) else {
                    continue;
                };
                let mut extra = BTreeSet::new();
                for blame in blames {
                    extra.insert(blame.capability);
                    extra.extend(sources_in(spaces, blame.capability).iter().copied());
                }
                let extra: Vec<HostedCapability> =
                    extra.into_iter().filter(|c| !own.contains(c)).collect();
                if !extra.is_empty() {
                    additions.push((*resource, name.clone(), extra));
                }
            }
        }
        if additions.is_empty() {
            return;
        }
        for (resource, name, extra) in additions {
            if let Some(set) = spaces
                .get_mut(&resource)
                .and_then(|p| p.package_sources.get_mut(&name))
            {
                set.extend(extra);
            }
        }
    }
}
