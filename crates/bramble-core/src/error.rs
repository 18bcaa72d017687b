//! Load-time errors raised while parsing and validating recipes.

use miette::Diagnostic;
use thiserror::Error;

/// An error that rejects a recipe (or a request string) before resolution
/// starts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum RecipeError {
    /// Version text that is neither a release version nor a commit pin.
    #[error("invalid version `{text}`: {reason}")]
    #[diagnostic(
        code(bramble::recipe::invalid_version),
        help("versions look like `1.2.3`, `v2.4-jedi.1`, `2.3.0_emc` or `git.<ref>`")
    )]
    InvalidVersionFormat { text: String, reason: String },

    /// A variant value outside the variant's domain.
    #[error("invalid value `{value}` for variant `{variant}`: {reason}")]
    #[diagnostic(code(bramble::recipe::invalid_variant_value))]
    InvalidVariantValue {
        variant: String,
        value: String,
        reason: String,
    },

    /// A condition mentions a variant the recipe does not define.
    #[error("{context} references undefined variant `{variant}`")]
    #[diagnostic(code(bramble::recipe::undefined_variant))]
    UndefinedVariantReference { variant: String, context: String },

    /// Malformed spec or condition text.
    #[error("syntax error in `{text}` at offset {offset}: {reason}")]
    #[diagnostic(code(bramble::recipe::syntax))]
    Syntax {
        text: String,
        offset: usize,
        reason: String,
    },

    /// The recipe document itself could not be decoded.
    #[error("malformed recipe: {message}")]
    #[diagnostic(code(bramble::recipe::parse))]
    Parse { message: String },
}

impl RecipeError {
    pub(crate) fn version(text: &str, reason: impl Into<String>) -> Self {
        Self::InvalidVersionFormat {
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn variant_value(
        variant: &str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidVariantValue {
            variant: variant.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn syntax(text: &str, offset: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            text: text.to_string(),
            offset,
            reason: reason.into(),
        }
    }
}
