use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while building the resolution model.
///
/// These are caller configuration errors: they surface when a resource,
/// requirement or manifest is constructed, never during a resolve.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ModelError {
    /// A requirement filter could not be parsed.
    #[error("Invalid filter `{filter}` at offset {offset}: {reason}")]
    #[diagnostic(help("Filters use LDAP syntax, e.g. (&(package=org.foo)(version>=1.0))"))]
    InvalidFilter {
        filter: String,
        offset: usize,
        reason: String,
    },

    /// A version or version range string could not be parsed.
    #[error("Invalid version `{version}`: {reason}")]
    InvalidVersion { version: String, reason: String },

    /// A directive carries a value outside its allowed set.
    #[error("Invalid value `{value}` for directive `{directive}`")]
    InvalidDirective { directive: String, value: String },

    /// A resource description is inconsistent (e.g. a fragment without a host requirement).
    #[error("Invalid resource `{resource}`: {reason}")]
    InvalidResource { resource: String, reason: String },
}
