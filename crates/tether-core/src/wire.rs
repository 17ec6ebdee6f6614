//! Wires (resolved bindings) and the per-resource wirings derived from them.

use std::collections::{BTreeMap, BTreeSet};

use crate::namespace::{self, HOST, IDENTITY};
use crate::repository::{CapabilityId, Repository, RequirementId, ResourceId};

/// A capability as offered by a particular provider. For fragment
/// capabilities attached to a host, `provider` is the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostedCapability {
    pub provider: ResourceId,
    pub capability: CapabilityId,
}

impl HostedCapability {
    /// A capability offered by the resource that declares it.
    pub fn declared(repo: &Repository, capability: CapabilityId) -> Self {
        Self {
            provider: repo.capability(capability).resource,
            capability,
        }
    }
}

/// A requirement as carried by a particular requirer. For fragment payload
/// requirements attached to a host, `requirer` is the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostedRequirement {
    pub requirer: ResourceId,
    pub requirement: RequirementId,
}

impl HostedRequirement {
    /// A requirement carried by the resource that declares it.
    pub fn declared(repo: &Repository, requirement: RequirementId) -> Self {
        Self {
            requirer: repo.requirement(requirement).resource,
            requirement,
        }
    }
}

/// A resolved binding from a requirement to a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wire {
    pub requirer: ResourceId,
    pub requirement: RequirementId,
    pub provider: ResourceId,
    pub capability: CapabilityId,
}

impl Wire {
    pub fn hosted(&self) -> HostedCapability {
        HostedCapability {
            provider: self.provider,
            capability: self.capability,
        }
    }

    pub fn hosted_requirement(&self) -> HostedRequirement {
        HostedRequirement {
            requirer: self.requirer,
            requirement: self.requirement,
        }
    }
}

/// Result of a resolve: newly created wires per resource.
pub type WireMap = BTreeMap<ResourceId, Vec<Wire>>;

/// The resolved view of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wiring {
    pub resource: ResourceId,
    /// Wires from this resource's requirements.
    pub required: Vec<Wire>,
    /// Capabilities this resource effectively offers: its own plus those of
    /// attached fragments, minus exports substituted by an import.
    pub capabilities: Vec<HostedCapability>,
    /// Requirements this resource effectively carries, including fragment
    /// payload requirements for a host.
    pub requirements: Vec<RequirementId>,
    /// Fragments attached to this host.
    pub fragments: Vec<ResourceId>,
}

impl Wiring {
    /// Derive the wirings of every resource in `wires`.
    pub fn build_all(repo: &Repository, wires: &WireMap) -> BTreeMap<ResourceId, Wiring> {
        let mut fragments: BTreeMap<ResourceId, Vec<ResourceId>> = BTreeMap::new();
        for (resource, list) in wires {
            if !repo.is_fragment(*resource) {
                continue;
            }
            for wire in list {
                if repo.requirement(wire.requirement).namespace == HOST {
                    fragments.entry(wire.provider).or_default().push(*resource);
                }
            }
        }

        wires
            .iter()
            .map(|(resource, list)| {
                let attached = fragments.get(resource).cloned().unwrap_or_default();
                let wiring = Self::build(repo, *resource, list, &attached);
                (*resource, wiring)
            })
            .collect()
    }

    fn build(
        repo: &Repository,
        resource: ResourceId,
        required: &[Wire],
        fragments: &[ResourceId],
    ) -> Wiring {
        let res = repo.resource(resource);

        if res.is_fragment() {
            let requirements = res
                .requirements
                .iter()
                .copied()
                .filter(|r| !namespace::is_payload(&repo.requirement(*r).namespace))
                .collect();
            return Wiring {
                resource,
                required: required.to_vec(),
                capabilities: Vec::new(),
                requirements,
                fragments: Vec::new(),
            };
        }

        let imported: BTreeSet<&str> = required
            .iter()
            .filter(|w| w.provider != resource)
            .map(|w| repo.capability(w.capability))
            .filter(|c| c.is_package())
            .filter_map(|c| c.name())
            .collect();

        let mut capabilities = Vec::new();
        let mut requirements = res.requirements.clone();
        let own = res.capabilities.iter().copied();
        let attached = fragments.iter().flat_map(|f| {
            repo.resource(*f)
                .capabilities
                .iter()
                .copied()
                .filter(|c| repo.capability(*c).namespace != IDENTITY)
        });
        for capability in own.chain(attached) {
            let cap = repo.capability(capability);
            if cap.is_package() && cap.name().is_some_and(|n| imported.contains(n)) {
                continue;
            }
            capabilities.push(HostedCapability {
                provider: resource,
                capability,
            });
        }
        for fragment in fragments {
            requirements.extend(
                repo.resource(*fragment)
                    .requirements
                    .iter()
                    .copied()
                    .filter(|r| namespace::is_payload(&repo.requirement(*r).namespace)),
            );
        }

        Wiring {
            resource,
            required: required.to_vec(),
            capabilities,
            requirements,
            fragments: fragments.to_vec(),
        }
    }

    /// Whether this resource already sees `package` through a wire or exports it.
    pub fn sees_package(&self, repo: &Repository, package: &str) -> bool {
        let wired = self.required.iter().any(|w| {
            let cap = repo.capability(w.capability);
            cap.is_package() && cap.name() == Some(package)
        });
        wired
            || self.capabilities.iter().any(|h| {
                let cap = repo.capability(h.capability);
                cap.is_package() && cap.name() == Some(package)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceBuilder;
    use crate::version::Version;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn wire(repo: &Repository, requirer: ResourceId, req_index: usize, cap: CapabilityId) -> Wire {
        Wire {
            requirer,
            requirement: repo.resource(requirer).requirements[req_index],
            provider: repo.capability(cap).resource,
            capability: cap,
        }
    }

    #[test]
    fn fragment_capabilities_are_hosted() {
        let mut repo = Repository::new();
        let a = repo.add(ResourceBuilder::new("A", v("1.0"))).unwrap();
        let f = repo
            .add(
                ResourceBuilder::new("F", v("1.0"))
                    .fragment()
                    .host("A")
                    .export("frag.pkg", v("1.0"), &[])
                    .import("other"),
            )
            .unwrap();
        let host_cap = repo.resource(a).capabilities[2];
        let mut wires = WireMap::new();
        wires.insert(a, vec![]);
        wires.insert(f, vec![wire(&repo, f, 0, host_cap)]);

        let wirings = Wiring::build_all(&repo, &wires);
        let host = &wirings[&a];
        assert_eq!(host.fragments, vec![f]);
        let frag_export = repo.resource(f).capabilities[1];
        assert!(host.capabilities.contains(&HostedCapability {
            provider: a,
            capability: frag_export,
        }));
        assert!(host.requirements.contains(&repo.resource(f).requirements[1]));
        assert!(host.sees_package(&repo, "frag.pkg"));

        let frag = &wirings[&f];
        assert!(frag.capabilities.is_empty());
        assert_eq!(frag.requirements, vec![repo.resource(f).requirements[0]]);
    }

    #[test]
    fn imported_exports_are_substituted() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let b = repo
            .add(
                ResourceBuilder::new("B", v("1.0"))
                    .export("foo", v("1.0"), &[])
                    .import("foo"),
            )
            .unwrap();
        let a_foo = repo.resource(a).capabilities[3];
        let b_foo = repo.resource(b).capabilities[3];
        let mut wires = WireMap::new();
        wires.insert(b, vec![wire(&repo, b, 0, a_foo)]);

        let wirings = Wiring::build_all(&repo, &wires);
        let exposed: Vec<CapabilityId> =
            wirings[&b].capabilities.iter().map(|h| h.capability).collect();
        assert!(!exposed.contains(&b_foo));
        assert!(wirings[&b].sees_package(&repo, "foo"));
    }
}
