//! Core data types for the Tether resolver.
//!
//! This crate defines the resolution model: an arena of resources with their
//! capabilities and requirements, wires and wirings, typed attribute values,
//! versions and version ranges, LDAP-style filters and the matching rule that
//! ties requirements to capabilities. It also holds the configuration and the
//! TOML universe manifest used by the command-line tool.
//!
//! This crate performs no resolution itself and has no knowledge of search
//! state; see `tether-resolver` for that.

pub mod attribute;
pub mod capability;
pub mod config;
pub mod error;
pub mod filter;
pub mod manifest;
pub mod namespace;
pub mod repository;
pub mod requirement;
pub mod resource;
pub mod version;
pub mod wire;

pub use capability::Capability;
pub use error::ModelError;
pub use repository::{CapabilityId, Repository, RequirementId, ResourceId};
pub use requirement::{Cardinality, Requirement, Resolution};
pub use resource::{Resource, ResourceBuilder};
pub use version::{Version, VersionRange};
pub use wire::{HostedCapability, HostedRequirement, Wire, WireMap, Wiring};
