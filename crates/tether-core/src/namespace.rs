//! Well-known namespaces, attributes and directives.
//!
//! Namespaces are open-ended strings; these are the ones the resolver gives
//! special meaning to.

/// Exported/imported packages. The package name is the attribute of the same name.
pub const PACKAGE: &str = "package";
/// Whole-resource requirements (require-bundle style).
pub const BUNDLE: &str = "bundle";
/// Fragment-to-host attachment.
pub const HOST: &str = "host";
/// Resource identity; fragments carry `type=fragment`.
pub const IDENTITY: &str = "identity";
/// Execution environment; never a fragment payload.
pub const EXECUTION_ENVIRONMENT: &str = "ee";

pub const ATTR_VERSION: &str = "version";
pub const ATTR_TYPE: &str = "type";
pub const TYPE_FRAGMENT: &str = "fragment";
pub const TYPE_RESOURCE: &str = "resource";

pub const DIRECTIVE_FILTER: &str = "filter";
pub const DIRECTIVE_USES: &str = "uses";
pub const DIRECTIVE_MANDATORY: &str = "mandatory";
pub const DIRECTIVE_CARDINALITY: &str = "cardinality";
pub const DIRECTIVE_RESOLUTION: &str = "resolution";
pub const DIRECTIVE_VISIBILITY: &str = "visibility";

pub const CARDINALITY_MULTIPLE: &str = "multiple";
pub const CARDINALITY_SINGLE: &str = "single";
pub const RESOLUTION_MANDATORY: &str = "mandatory";
pub const RESOLUTION_OPTIONAL: &str = "optional";
pub const RESOLUTION_DYNAMIC: &str = "dynamic";
pub const VISIBILITY_REEXPORT: &str = "reexport";

/// Namespaces for which a resource never wires to itself.
pub fn is_wiring_namespace(namespace: &str) -> bool {
    matches!(namespace, PACKAGE | BUNDLE | HOST)
}

/// Whether a fragment requirement in `namespace` is merged into its host.
pub fn is_payload(namespace: &str) -> bool {
    !matches!(namespace, HOST | EXECUTION_ENVIRONMENT)
}

/// Split a comma-separated directive value, trimming blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
