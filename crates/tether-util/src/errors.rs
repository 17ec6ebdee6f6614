use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for Tether operations outside the resolver core.
#[derive(Debug, Error, Diagnostic)]
pub enum TetherError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed universe manifest (e.g. Tether.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check the universe manifest for syntax errors"))]
    Manifest { message: String },

    /// Invalid configuration file.
    #[error("Config error: {message}")]
    #[diagnostic(help("Check ~/.tether/config.toml or the file passed with --config"))]
    Config { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type TetherResult<T> = miette::Result<T>;
