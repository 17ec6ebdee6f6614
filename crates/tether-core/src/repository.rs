//! Arena holding every resource, capability and requirement of a universe.
//!
//! Entities refer to each other by index newtypes so that resolver state can
//! be copied and compared cheaply.

use std::fmt;

use tracing::trace;

use crate::capability::Capability;
use crate::error::ModelError;
use crate::namespace::HOST;
use crate::requirement::Requirement;
use crate::resource::{Resource, ResourceBuilder};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Index of a resource in a [`Repository`].
    ResourceId,
    "r"
);
id_type!(
    /// Index of a capability in a [`Repository`].
    CapabilityId,
    "c"
);
id_type!(
    /// Index of a requirement in a [`Repository`].
    RequirementId,
    "q"
);

/// Owns all model entities. Ids handed out by one repository are only valid
/// for that repository.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    resources: Vec<Resource>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. Requirement directives are validated here; nothing is
    /// added when validation fails.
    pub fn add(&mut self, builder: ResourceBuilder) -> Result<ResourceId, ModelError> {
        let id = ResourceId(self.resources.len());

        let mut requirements = Vec::with_capacity(builder.requirements.len());
        for decl in &builder.requirements {
            let req = Requirement::new(id, decl.namespace.clone(), decl.directives.clone())?;
            requirements.push(req);
        }
        if builder.fragment && !requirements.iter().any(|r| r.namespace == HOST) {
            return Err(ModelError::InvalidResource {
                resource: builder.name.clone(),
                reason: "fragment has no host requirement".to_string(),
            });
        }

        let mut cap_ids = Vec::new();
        for decl in builder
            .implicit_capabilities()
            .into_iter()
            .chain(builder.capabilities.iter().cloned())
        {
            cap_ids.push(CapabilityId(self.capabilities.len()));
            self.capabilities.push(Capability {
                resource: id,
                namespace: decl.namespace,
                attributes: decl.attributes,
                directives: decl.directives,
            });
        }

        let mut req_ids = Vec::with_capacity(requirements.len());
        for req in requirements {
            req_ids.push(RequirementId(self.requirements.len()));
            self.requirements.push(req);
        }

        trace!(
            resource = %builder.name,
            capabilities = cap_ids.len(),
            requirements = req_ids.len(),
            "added resource"
        );
        self.resources.push(Resource {
            name: builder.name,
            version: builder.version,
            fragment: builder.fragment,
            capabilities: cap_ids,
            requirements: req_ids,
        });
        Ok(id)
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn capability(&self, id: CapabilityId) -> &Capability {
        &self.capabilities[id.0]
    }

    pub fn requirement(&self, id: RequirementId) -> &Requirement {
        &self.requirements[id.0]
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        (0..self.resources.len()).map(ResourceId)
    }

    pub fn capability_ids(&self) -> impl Iterator<Item = CapabilityId> + '_ {
        (0..self.capabilities.len()).map(CapabilityId)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Find a resource by symbolic name, preferring the highest version.
    pub fn find(&self, name: &str) -> Option<ResourceId> {
        self.resource_ids()
            .filter(|id| self.resource(*id).name == name)
            .max_by(|a, b| {
                self.resource(*a)
                    .version
                    .cmp(&self.resource(*b).version)
                    .then(b.cmp(a))
            })
    }

    pub fn is_fragment(&self, id: ResourceId) -> bool {
        self.resource(id).fragment
    }

    /// Whether `capability` satisfies `requirement`.
    pub fn matches(&self, requirement: RequirementId, capability: CapabilityId) -> bool {
        self.requirement(requirement)
            .matches(self.capability(capability))
    }

    /// Every capability matching `requirement`, in repository order.
    pub fn providers(&self, requirement: RequirementId) -> Vec<CapabilityId> {
        let req = self.requirement(requirement);
        self.capability_ids()
            .filter(|c| req.matches(self.capability(*c)))
            .collect()
    }

    /// Package capabilities declared by `resource` with the given name.
    pub fn exports_named(&self, resource: ResourceId, package: &str) -> Vec<CapabilityId> {
        self.resource(resource)
            .capabilities
            .iter()
            .copied()
            .filter(|c| {
                let cap = self.capability(*c);
                cap.is_package() && cap.name() == Some(package)
            })
            .collect()
    }

    /// The requirement's owning resource, rendered for messages.
    pub fn describe_requirement(&self, requirement: RequirementId) -> String {
        let req = self.requirement(requirement);
        format!("{} {}", self.resource(req.resource), req)
    }

    pub fn describe_capability(&self, capability: CapabilityId) -> String {
        let cap = self.capability(capability);
        format!("{} {}", self.resource(cap.resource), cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Directives;
    use crate::version::Version;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn implicit_capabilities() {
        let mut repo = Repository::new();
        let a = repo.add(ResourceBuilder::new("A", v("1.0"))).unwrap();
        let namespaces: Vec<&str> = repo
            .resource(a)
            .capabilities
            .iter()
            .map(|c| repo.capability(*c).namespace.as_str())
            .collect();
        assert_eq!(namespaces, vec!["identity", "bundle", "host"]);

        let f = repo
            .add(ResourceBuilder::new("F", v("1.0")).fragment().host("A"))
            .unwrap();
        assert_eq!(repo.resource(f).capabilities.len(), 1);
        assert!(repo.is_fragment(f));
    }

    #[test]
    fn fragment_without_host_is_rejected() {
        let mut repo = Repository::new();
        let err = repo
            .add(ResourceBuilder::new("F", v("1.0")).fragment())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidResource { .. }));
        assert!(repo.is_empty());
    }

    #[test]
    fn invalid_filter_adds_nothing() {
        let mut repo = Repository::new();
        let err = repo
            .add(ResourceBuilder::new("A", v("1.0")).requirement(
                "package",
                Some("(package=foo"),
                Directives::new(),
            ))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidFilter { .. }));
        assert_eq!(repo.capability_ids().count(), 0);
    }

    #[test]
    fn providers_in_repository_order() {
        let mut repo = Repository::new();
        let a = repo
            .add(ResourceBuilder::new("A", v("1.0")).export("foo", v("1.0"), &[]))
            .unwrap();
        let b = repo
            .add(ResourceBuilder::new("B", v("1.0")).export("foo", v("2.0"), &[]))
            .unwrap();
        let c = repo.add(ResourceBuilder::new("C", v("1.0")).import("foo")).unwrap();

        let req = repo.resource(c).requirements[0];
        let owners: Vec<ResourceId> = repo
            .providers(req)
            .into_iter()
            .map(|cap| repo.capability(cap).resource)
            .collect();
        assert_eq!(owners, vec![a, b]);
    }

    #[test]
    fn find_prefers_highest_version() {
        let mut repo = Repository::new();
        repo.add(ResourceBuilder::new("A", v("1.0"))).unwrap();
        let newer = repo.add(ResourceBuilder::new("A", v("2.0"))).unwrap();
        assert_eq!(repo.find("A"), Some(newer));
        assert_eq!(repo.find("missing"), None);
    }
}
