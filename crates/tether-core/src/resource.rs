use std::fmt;

use crate::attribute::{Attributes, Directives, Value};
use crate::namespace::{
    ATTR_TYPE, ATTR_VERSION, BUNDLE, DIRECTIVE_FILTER, HOST, IDENTITY, TYPE_FRAGMENT,
    TYPE_RESOURCE,
};
use crate::repository::{CapabilityId, RequirementId};
use crate::version::Version;

/// A resolvable unit: an identity plus the capabilities it offers and the
/// requirements it needs, in declaration order.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub version: Version,
    pub fragment: bool,
    pub capabilities: Vec<CapabilityId>,
    pub requirements: Vec<RequirementId>,
}

impl Resource {
    pub fn is_fragment(&self) -> bool {
        self.fragment
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// A capability or requirement declaration that has not been added to a
/// repository yet.
#[derive(Debug, Clone)]
pub(crate) struct Declaration {
    pub namespace: String,
    pub attributes: Attributes,
    pub directives: Directives,
}

/// Builder for a [`Resource`]; consumed by [`crate::Repository::add`].
///
/// Every resource receives an `identity` capability. Non-fragments also get
/// `bundle` and `host` capabilities named after the resource, so that bundle
/// requirements and fragments can target them.
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    pub(crate) name: String,
    pub(crate) version: Version,
    pub(crate) fragment: bool,
    pub(crate) capabilities: Vec<Declaration>,
    pub(crate) requirements: Vec<Declaration>,
}

impl ResourceBuilder {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            fragment: false,
            capabilities: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Mark the resource as a fragment. Fragments need a `host` requirement.
    pub fn fragment(mut self) -> Self {
        self.fragment = true;
        self
    }

    /// Declare a capability.
    pub fn capability(
        mut self,
        namespace: impl Into<String>,
        attributes: Attributes,
        directives: Directives,
    ) -> Self {
        self.capabilities.push(Declaration {
            namespace: namespace.into(),
            attributes,
            directives,
        });
        self
    }

    /// Declare a requirement. A `filter` is stored as the `filter` directive.
    pub fn requirement(
        mut self,
        namespace: impl Into<String>,
        filter: Option<&str>,
        mut directives: Directives,
    ) -> Self {
        if let Some(filter) = filter {
            directives.insert(DIRECTIVE_FILTER.to_string(), filter.to_string());
        }
        self.requirements.push(Declaration {
            namespace: namespace.into(),
            attributes: Attributes::new(),
            directives,
        });
        self
    }

    /// Export a package at a version, with an optional `uses` list.
    pub fn export(self, package: &str, version: Version, uses: &[&str]) -> Self {
        let mut attributes = Attributes::new();
        attributes.insert(crate::namespace::PACKAGE.to_string(), Value::from(package));
        attributes.insert(ATTR_VERSION.to_string(), Value::Version(version));
        let mut directives = Directives::new();
        if !uses.is_empty() {
            directives.insert(crate::namespace::DIRECTIVE_USES.to_string(), uses.join(","));
        }
        self.capability(crate::namespace::PACKAGE, attributes, directives)
    }

    /// Import a package by name.
    pub fn import(self, package: &str) -> Self {
        let filter = format!("({}={package})", crate::namespace::PACKAGE);
        self.requirement(crate::namespace::PACKAGE, Some(&filter), Directives::new())
    }

    /// Attach to the named host.
    pub fn host(self, host: &str) -> Self {
        let filter = format!("({HOST}={host})");
        self.requirement(HOST, Some(&filter), Directives::new())
    }

    /// Require the named bundle.
    pub fn require_bundle(self, bundle: &str) -> Self {
        let filter = format!("({BUNDLE}={bundle})");
        self.requirement(BUNDLE, Some(&filter), Directives::new())
    }

    /// Capabilities every resource carries, ahead of the declared ones.
    pub(crate) fn implicit_capabilities(&self) -> Vec<Declaration> {
        let mut identity = Attributes::new();
        identity.insert(IDENTITY.to_string(), Value::from(self.name.as_str()));
        identity.insert(ATTR_VERSION.to_string(), Value::Version(self.version.clone()));
        let kind = if self.fragment { TYPE_FRAGMENT } else { TYPE_RESOURCE };
        identity.insert(ATTR_TYPE.to_string(), Value::from(kind));

        let mut out = vec![Declaration {
            namespace: IDENTITY.to_string(),
            attributes: identity,
            directives: Directives::new(),
        }];
        if !self.fragment {
            for ns in [BUNDLE, HOST] {
                let mut attributes = Attributes::new();
                attributes.insert(ns.to_string(), Value::from(self.name.as_str()));
                attributes.insert(ATTR_VERSION.to_string(), Value::Version(self.version.clone()));
                out.push(Declaration {
                    namespace: ns.to_string(),
                    attributes,
                    directives: Directives::new(),
                });
            }
        }
        out
    }
}
