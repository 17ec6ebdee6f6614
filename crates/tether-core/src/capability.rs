use std::fmt;

use crate::attribute::{Attributes, Directives, Value};
use crate::namespace::{self, DIRECTIVE_MANDATORY, DIRECTIVE_USES};
use crate::repository::ResourceId;

/// Something a resource offers, in a namespace, described by attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub resource: ResourceId,
    pub namespace: String,
    pub attributes: Attributes,
    pub directives: Directives,
}

impl Capability {
    /// Packages named by the `uses` directive.
    pub fn uses(&self) -> Vec<String> {
        self.directives
            .get(DIRECTIVE_USES)
            .map(|v| namespace::split_list(v))
            .unwrap_or_default()
    }

    /// Attributes a matching requirement filter must mention.
    pub fn mandatory_attributes(&self) -> Vec<String> {
        self.directives
            .get(DIRECTIVE_MANDATORY)
            .map(|v| namespace::split_list(v))
            .unwrap_or_default()
    }

    /// The value of the attribute named after the namespace, e.g. the package
    /// name of a `package` capability.
    pub fn name(&self) -> Option<&str> {
        self.attributes.get(&self.namespace).and_then(Value::as_str)
    }

    pub fn is_package(&self) -> bool {
        self.namespace == namespace::PACKAGE
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.namespace)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}
