//! Recipe sources: where the resolver gets recipes from.
//!
//! A source is queried by package name only. Sources do not cache; the
//! resolver wraps whatever source it is given in a per-run cache.

use miette::Diagnostic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::RecipeError;
use crate::recipe::Recipe;

/// Why a recipe could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LookupError {
    #[error("no recipe for `{name}`")]
    #[diagnostic(code(bramble::repository::not_found))]
    NotFound { name: String },

    #[error("recipe `{name}` is invalid")]
    #[diagnostic(code(bramble::repository::invalid))]
    Invalid {
        name: String,
        #[source]
        #[diagnostic_source]
        source: RecipeError,
    },

    #[error("failed to read recipe `{name}`: {message}")]
    #[diagnostic(code(bramble::repository::io))]
    Io { name: String, message: String },
}

impl LookupError {
    pub fn name(&self) -> &str {
        match self {
            Self::NotFound { name } | Self::Invalid { name, .. } | Self::Io { name, .. } => name,
        }
    }

    /// One-line description including the underlying cause.
    pub fn detail(&self) -> String {
        match self {
            Self::Invalid { name, source } => format!("recipe `{name}` is invalid: {source}"),
            other => other.to_string(),
        }
    }
}

/// Something that maps package names to recipes.
///
/// Implementations must be safe to call from several threads; prefetching
/// loads recipes on a blocking pool.
pub trait RecipeSource: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Recipe, LookupError>;

    /// Every package name this source can produce, sorted.
    fn names(&self) -> Result<Vec<String>, LookupError>;
}

/// An in-memory source, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    recipes: BTreeMap<String, Recipe>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.name.clone(), recipe);
    }

    pub fn with(mut self, recipe: Recipe) -> Self {
        self.insert(recipe);
        self
    }

    /// Parse each document as a TOML recipe.
    pub fn from_toml<'a>(documents: impl IntoIterator<Item = &'a str>) -> Result<Self, RecipeError> {
        let mut source = Self::new();
        for doc in documents {
            source.insert(Recipe::from_toml_str(doc)?);
        }
        Ok(source)
    }
}

impl RecipeSource for MemorySource {
    fn lookup(&self, name: &str) -> Result<Recipe, LookupError> {
        self.recipes.get(name).cloned().ok_or_else(|| LookupError::NotFound {
            name: name.to_string(),
        })
    }

    fn names(&self) -> Result<Vec<String>, LookupError> {
        Ok(self.recipes.keys().cloned().collect())
    }
}

/// File name of a recipe kept in its own directory.
pub const RECIPE_FILE_NAME: &str = "recipe.toml";

/// Recipes stored as `<root>/<name>.toml` or `<root>/<name>/recipe.toml`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the recipe for `name` lives, if it exists.
    pub fn recipe_path(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return None;
        }
        let flat = self.root.join(format!("{name}.toml"));
        if flat.is_file() {
            return Some(flat);
        }
        let nested = self.root.join(name).join(RECIPE_FILE_NAME);
        nested.is_file().then_some(nested)
    }
}

impl RecipeSource for DirectorySource {
    fn lookup(&self, name: &str) -> Result<Recipe, LookupError> {
        let path = self.recipe_path(name).ok_or_else(|| LookupError::NotFound {
            name: name.to_string(),
        })?;
        tracing::trace!("reading recipe {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| LookupError::Io {
            name: name.to_string(),
            message: format!("{}: {e}", path.display()),
        })?;
        let invalid = |source| LookupError::Invalid {
            name: name.to_string(),
            source,
        };
        let recipe = Recipe::from_toml_str(&content).map_err(invalid)?;
        if recipe.name != name {
            return Err(invalid(RecipeError::Parse {
                message: format!(
                    "{} declares package `{}`, expected `{name}`",
                    path.display(),
                    recipe.name
                ),
            }));
        }
        Ok(recipe)
    }

    fn names(&self) -> Result<Vec<String>, LookupError> {
        let io_error = |e: std::io::Error| LookupError::Io {
            name: self.root.display().to_string(),
            message: e.to_string(),
        };
        let mut names: Vec<String> = bramble_util::fs::toml_files_in(&self.root)
            .map_err(io_error)?
            .into_iter()
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        for entry in std::fs::read_dir(&self.root).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.join(RECIPE_FILE_NAME).is_file() {
                if let Some(dir) = path.file_name() {
                    names.push(dir.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZLIB: &str = "[package]\nname = \"zlib\"\n[[versions]]\nversion = \"1.2.13\"\n";

    #[test]
    fn memory_source_lookup() {
        let source = MemorySource::from_toml([ZLIB]).unwrap();
        assert_eq!(source.lookup("zlib").unwrap().name, "zlib");
        assert_eq!(
            source.lookup("hdf5").unwrap_err(),
            LookupError::NotFound {
                name: "hdf5".into()
            }
        );
        assert_eq!(source.names().unwrap(), vec!["zlib".to_string()]);
    }

    #[test]
    fn directory_source_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(source.recipe_path("../etc").is_none());
        assert!(source.recipe_path("").is_none());
    }

    #[test]
    fn invalid_detail_includes_cause() {
        let err = LookupError::Invalid {
            name: "crtm".into(),
            source: RecipeError::Parse {
                message: "boom".into(),
            },
        };
        assert!(err.detail().contains("boom"));
        assert_eq!(err.name(), "crtm");
    }
}
