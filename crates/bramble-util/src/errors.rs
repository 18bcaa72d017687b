use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for Bramble operations outside the resolver core.
#[derive(Debug, Error, Diagnostic)]
pub enum BrambleError {
    /// A recipe could not be loaded or failed validation.
    #[error("Recipe error: {message}")]
    #[diagnostic(help("Run `bramble check` to validate every recipe in the repository"))]
    Recipe { message: String },

    /// A recipe repository directory is missing or unreadable.
    #[error("Repository error: {message}")]
    #[diagnostic(help("Point --repo at a directory of <name>.toml recipe files"))]
    Repository { message: String },

    /// Invalid or malformed configuration file.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A request or spec string could not be parsed.
    #[error("Invalid spec: {message}")]
    Spec { message: String },

    /// Dependency resolution failed (conflicts, cycles, missing recipes).
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}
