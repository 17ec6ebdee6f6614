use std::fmt;

use crate::attribute::Directives;
use crate::capability::Capability;
use crate::error::ModelError;
use crate::filter::Filter;
use crate::namespace::{
    CARDINALITY_MULTIPLE, CARDINALITY_SINGLE, DIRECTIVE_CARDINALITY, DIRECTIVE_FILTER,
    DIRECTIVE_RESOLUTION, DIRECTIVE_VISIBILITY, RESOLUTION_DYNAMIC, RESOLUTION_MANDATORY,
    RESOLUTION_OPTIONAL, VISIBILITY_REEXPORT,
};
use crate::repository::ResourceId;

/// How many providers a requirement is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Single,
    Multiple,
}

/// Whether a requirement must be satisfied for its resource to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    Mandatory,
    Optional,
    /// Only resolved on demand through dynamic resolution.
    Dynamic,
}

/// Something a resource needs: a namespace plus an optional filter over
/// capability attributes.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub resource: ResourceId,
    pub namespace: String,
    pub directives: Directives,
    pub filter: Option<Filter>,
    pub cardinality: Cardinality,
    pub resolution: Resolution,
}

impl Requirement {
    /// Build a requirement, parsing the `filter`, `cardinality` and
    /// `resolution` directives.
    pub fn new(
        resource: ResourceId,
        namespace: impl Into<String>,
        directives: Directives,
    ) -> Result<Self, ModelError> {
        let filter = directives
            .get(DIRECTIVE_FILTER)
            .map(|f| Filter::parse(f))
            .transpose()?;

        let cardinality = match directives.get(DIRECTIVE_CARDINALITY).map(String::as_str) {
            None | Some(CARDINALITY_SINGLE) => Cardinality::Single,
            Some(CARDINALITY_MULTIPLE) => Cardinality::Multiple,
            Some(other) => return Err(bad_directive(DIRECTIVE_CARDINALITY, other)),
        };

        let resolution = match directives.get(DIRECTIVE_RESOLUTION).map(String::as_str) {
            None | Some(RESOLUTION_MANDATORY) => Resolution::Mandatory,
            Some(RESOLUTION_OPTIONAL) => Resolution::Optional,
            Some(RESOLUTION_DYNAMIC) => Resolution::Dynamic,
            Some(other) => return Err(bad_directive(DIRECTIVE_RESOLUTION, other)),
        };

        Ok(Self {
            resource,
            namespace: namespace.into(),
            directives,
            filter,
            cardinality,
            resolution,
        })
    }

    pub fn is_optional(&self) -> bool {
        self.resolution == Resolution::Optional
    }

    pub fn is_dynamic(&self) -> bool {
        self.resolution == Resolution::Dynamic
    }

    pub fn is_multiple(&self) -> bool {
        self.cardinality == Cardinality::Multiple
    }

    /// A bundle requirement whose target's packages are re-exported.
    pub fn is_reexport(&self) -> bool {
        self.directives
            .get(DIRECTIVE_VISIBILITY)
            .is_some_and(|v| v == VISIBILITY_REEXPORT)
    }

    /// Whether `capability` satisfies this requirement.
    ///
    /// Namespaces must be equal, the filter (if any) must match the
    /// capability's attributes, and the filter must mention every attribute
    /// the capability declares mandatory.
    pub fn matches(&self, capability: &Capability) -> bool {
        if self.namespace != capability.namespace {
            return false;
        }
        let mandatory = capability.mandatory_attributes();
        match &self.filter {
            None => mandatory.is_empty(),
            Some(filter) => {
                if !filter.matches(&capability.attributes) {
                    return false;
                }
                if mandatory.is_empty() {
                    return true;
                }
                let referenced = filter.attributes();
                mandatory.iter().all(|attr| referenced.contains(attr))
            }
        }
    }
}

fn bad_directive(directive: &str, value: &str) -> ModelError {
    ModelError::InvalidDirective {
        directive: directive.to_string(),
        value: value.to_string(),
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.namespace)?;
        if let Some(filter) = &self.filter {
            write!(f, " {filter}")?;
        }
        match self.resolution {
            Resolution::Mandatory => {}
            Resolution::Optional => f.write_str(" (optional)")?,
            Resolution::Dynamic => f.write_str(" (dynamic)")?,
        }
        if self.cardinality == Cardinality::Multiple {
            f.write_str(" (multiple)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attributes, Value};
    use crate::version::Version;

    fn directives(pairs: &[(&str, &str)]) -> Directives {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn package(name: &str, version: &str, extra: &[(&str, &str)]) -> Capability {
        let mut attributes = Attributes::new();
        attributes.insert("package".into(), Value::from(name));
        attributes.insert("version".into(), Value::Version(Version::parse(version).unwrap()));
        Capability {
            resource: ResourceId(0),
            namespace: "package".into(),
            attributes,
            directives: directives(extra),
        }
    }

    #[test]
    fn defaults() {
        let req = Requirement::new(ResourceId(1), "package", Directives::new()).unwrap();
        assert_eq!(req.cardinality, Cardinality::Single);
        assert_eq!(req.resolution, Resolution::Mandatory);
        assert!(req.filter.is_none());
        assert!(!req.is_reexport());
    }

    #[test]
    fn directives_are_parsed() {
        let req = Requirement::new(
            ResourceId(1),
            "package",
            directives(&[
                ("filter", "(package=foo)"),
                ("cardinality", "multiple"),
                ("resolution", "optional"),
            ]),
        )
        .unwrap();
        assert!(req.is_multiple());
        assert!(req.is_optional());
        assert!(req.filter.is_some());
    }

    #[test]
    fn bad_directive_values_are_rejected() {
        let err = Requirement::new(ResourceId(1), "package", directives(&[("resolution", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidDirective { .. }));
        let err = Requirement::new(ResourceId(1), "package", directives(&[("filter", "(broken")]))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidFilter { .. }));
    }

    #[test]
    fn matches_namespace_and_filter() {
        let req = Requirement::new(
            ResourceId(1),
            "package",
            directives(&[("filter", "(&(package=foo)(version>=1.0))")]),
        )
        .unwrap();
        assert!(req.matches(&package("foo", "1.2", &[])));
        assert!(!req.matches(&package("foo", "0.9", &[])));
        assert!(!req.matches(&package("bar", "1.2", &[])));

        let mut other_ns = package("foo", "1.2", &[]);
        other_ns.namespace = "bundle".into();
        assert!(!req.matches(&other_ns));
    }

    #[test]
    fn mandatory_attributes_must_be_referenced() {
        let cap = package("foo", "1.0", &[("mandatory", "vendor")]);
        let mut cap = cap;
        cap.attributes.insert("vendor".into(), Value::from("acme"));

        let loose = Requirement::new(
            ResourceId(1),
            "package",
            directives(&[("filter", "(package=foo)")]),
        )
        .unwrap();
        assert!(!loose.matches(&cap));

        let strict = Requirement::new(
            ResourceId(1),
            "package",
            directives(&[("filter", "(&(package=foo)(vendor=acme))")]),
        )
        .unwrap();
        assert!(strict.matches(&cap));
    }
}
