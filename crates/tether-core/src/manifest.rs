//! TOML universe manifests.
//!
//! A universe lists resources with their declared capabilities and
//! requirements:
//!
//! ```toml
//! [[resource]]
//! name = "B"
//! version = "1.0.0"
//!
//! [[resource.capability]]
//! namespace = "package"
//! attributes = { package = "foo", version = "1.0.0" }
//! directives = { uses = "bar" }
//!
//! [[resource.requirement]]
//! namespace = "package"
//! filter = "(package=foo)"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use tether_util::errors::TetherError;

use crate::attribute::{Attributes, Directives, Value};
use crate::error::ModelError;
use crate::namespace::{ATTR_VERSION, DIRECTIVE_CARDINALITY, DIRECTIVE_RESOLUTION};
use crate::repository::{Repository, ResourceId};
use crate::resource::ResourceBuilder;
use crate::version::{Version, VersionRange};

/// The parsed representation of a universe manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
}

/// One `[[resource]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub fragment: bool,
    /// Optional resources are resolved when possible and dropped otherwise.
    #[serde(default = "default_true")]
    pub mandatory: bool,
    /// Resolved before the main resolve and treated as existing wirings.
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, rename = "capability")]
    pub capabilities: Vec<CapabilityEntry>,
    #[serde(default, rename = "requirement")]
    pub requirements: Vec<RequirementEntry>,
}

/// One `[[resource.capability]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub namespace: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub directives: BTreeMap<String, String>,
}

/// One `[[resource.requirement]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementEntry {
    pub namespace: String,
    #[serde(default)]
    pub filter: Option<String>,
    /// Version range such as `[1.0,2.0)`, ANDed into the filter.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub cardinality: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub directives: BTreeMap<String, String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

fn default_true() -> bool {
    true
}

/// A universe turned into a repository plus the resolve roles of its resources.
#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub repository: Repository,
    pub mandatory: Vec<ResourceId>,
    pub optional: Vec<ResourceId>,
    pub resolved: Vec<ResourceId>,
}

impl Universe {
    /// Load and parse a universe manifest from the given path.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        let content = tether_util::fs::read_file(path)?;
        Self::from_str(&content)
    }

    /// Parse a universe manifest from a string.
    pub fn from_str(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            TetherError::Manifest {
                message: format!("Failed to parse universe: {e}"),
            }
            .into()
        })
    }

    /// Build the repository. Resources keep manifest order.
    pub fn load(&self) -> Result<LoadedUniverse, ModelError> {
        let mut repository = Repository::new();
        let mut mandatory = Vec::new();
        let mut optional = Vec::new();
        let mut resolved = Vec::new();

        for entry in &self.resources {
            let id = repository.add(entry.builder()?)?;
            if entry.resolved {
                resolved.push(id);
            } else if entry.mandatory {
                mandatory.push(id);
            } else {
                optional.push(id);
            }
        }

        Ok(LoadedUniverse {
            repository,
            mandatory,
            optional,
            resolved,
        })
    }
}

impl ResourceEntry {
    fn builder(&self) -> Result<ResourceBuilder, ModelError> {
        let mut builder = ResourceBuilder::new(self.name.clone(), Version::parse(&self.version)?);
        if self.fragment {
            builder = builder.fragment();
        }
        for cap in &self.capabilities {
            let mut attributes = Attributes::new();
            for (key, value) in &cap.attributes {
                attributes.insert(key.clone(), convert(&self.name, key, value)?);
            }
            let directives: Directives = cap.directives.clone();
            builder = builder.capability(cap.namespace.clone(), attributes, directives);
        }
        for req in &self.requirements {
            let mut directives: Directives = req.directives.clone();
            if let Some(cardinality) = &req.cardinality {
                directives.insert(DIRECTIVE_CARDINALITY.to_string(), cardinality.clone());
            }
            if let Some(resolution) = &req.resolution {
                directives.insert(DIRECTIVE_RESOLUTION.to_string(), resolution.clone());
            }
            let filter = match (&req.filter, &req.version) {
                (filter, None) => filter.clone(),
                (None, Some(range)) => Some(VersionRange::parse(range)?.to_filter(ATTR_VERSION)),
                (Some(filter), Some(range)) => Some(format!(
                    "(&{filter}{})",
                    VersionRange::parse(range)?.to_filter(ATTR_VERSION)
                )),
            };
            builder = builder.requirement(req.namespace.clone(), filter.as_deref(), directives);
        }
        Ok(builder)
    }
}

fn convert(resource: &str, key: &str, value: &toml::Value) -> Result<Value, ModelError> {
    Ok(match value {
        toml::Value::String(s) if key == ATTR_VERSION => Value::Version(Version::parse(s)?),
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(n) => Value::Long(*n),
        toml::Value::Float(d) => Value::Double(*d),
        toml::Value::Boolean(b) => Value::String(b.to_string()),
        toml::Value::Array(items) => Value::List(
            items
                .iter()
                .map(|item| convert(resource, key, item))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Datetime(_) | toml::Value::Table(_) => {
            return Err(ModelError::InvalidResource {
                resource: resource.to_string(),
                reason: format!("attribute `{key}` has an unsupported type"),
            })
        }
    })
}
