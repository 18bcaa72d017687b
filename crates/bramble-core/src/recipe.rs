//! Recipes: per-package declarations of versions, variants, dependencies and
//! conflicts, plus their TOML encoding.
//!
//! A recipe is parsed and validated as a whole. Any error rejects the recipe;
//! nothing partially parsed reaches the resolver.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::error::RecipeError;
use crate::guard::Guard;
use crate::spec::SpecRequest;
use crate::syntax::parse_guard;
use crate::variant::{VariantDefinition, VariantKind, VariantRequirement, VariantValue};
use crate::version::{Version, VersionConstraint};

/// How a dependency is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Build,
    Link,
    Run,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Build => "build",
            Self::Link => "link",
            Self::Run => "run",
        })
    }
}

/// Render a kind set as `build,link`.
pub fn kinds_label(kinds: &BTreeSet<DependencyKind>) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// A declared, possibly conditional, dependency of one recipe on another.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdge {
    pub target: String,
    /// Never empty.
    pub kinds: BTreeSet<DependencyKind>,
    pub guard: Guard,
    pub version: Option<VersionConstraint>,
    pub variants: Vec<VariantRequirement>,
    /// The declaration as written, for explanations.
    pub declared: String,
}

impl DependencyEdge {
    /// Build an unconditional `build,link` edge from spec text.
    pub fn parse(spec: &str) -> Result<Self, RecipeError> {
        let request = SpecRequest::parse(spec)?;
        Ok(Self {
            target: request.name,
            kinds: default_kinds(),
            guard: Guard::Always,
            version: request.version,
            variants: request.variants,
            declared: spec.trim().to_string(),
        })
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = DependencyKind>) -> Self {
        let kinds: BTreeSet<_> = kinds.into_iter().collect();
        if !kinds.is_empty() {
            self.kinds = kinds;
        }
        self
    }

    pub fn is_build_only(&self) -> bool {
        self.kinds.len() == 1 && self.kinds.contains(&DependencyKind::Build)
    }

    /// The requirement this edge places on its target.
    pub fn request(&self) -> SpecRequest {
        SpecRequest {
            name: self.target.clone(),
            version: self.version.clone(),
            variants: self.variants.clone(),
        }
    }

    pub fn kinds_label(&self) -> String {
        kinds_label(&self.kinds)
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request())?;
        if !self.guard.is_always() {
            write!(f, " when {}", self.guard)?;
        }
        Ok(())
    }
}

fn default_kinds() -> BTreeSet<DependencyKind> {
    [DependencyKind::Build, DependencyKind::Link].into()
}

/// One declared version with its opaque source attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Version,
    pub commit: Option<String>,
    pub tag: Option<String>,
    pub sha256: Option<String>,
    /// Chosen only when no other declared version fits.
    pub deprecated: bool,
}

impl VersionEntry {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            commit: None,
            tag: None,
            sha256: None,
            deprecated: false,
        }
    }

    /// The source attribute carried into the resolved spec.
    pub fn source_ref(&self) -> Option<&str> {
        self.commit.as_deref().or(self.tag.as_deref())
    }
}

/// A declared incompatibility: a spec matching both `spec` and `when` is
/// rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictDecl {
    pub spec: Guard,
    pub when: Guard,
    pub message: Option<String>,
}

impl fmt::Display for ConflictDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflicts with `{}`", self.spec)?;
        if !self.when.is_always() {
            write!(f, " when `{}`", self.when)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Everything declared about one package.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub maintainers: Vec<String>,
    /// In declaration order; the first entries are preferred.
    pub versions: Vec<VersionEntry>,
    pub variants: Vec<VariantDefinition>,
    pub depends: Vec<DependencyEdge>,
    pub conflicts: Vec<ConflictDecl>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            homepage: None,
            maintainers: Vec::new(),
            versions: Vec::new(),
            variants: Vec::new(),
            depends: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Builder used by tests and embedders: add versions by text.
    pub fn with_versions<'a>(mut self, versions: impl IntoIterator<Item = &'a str>) -> Result<Self, RecipeError> {
        for text in versions {
            self.versions.push(VersionEntry::new(Version::parse(text)?));
        }
        Ok(self)
    }

    pub fn with_variant(mut self, definition: VariantDefinition) -> Self {
        self.variants.push(definition);
        self
    }

    pub fn with_dependency(mut self, edge: DependencyEdge) -> Self {
        self.depends.push(edge);
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictDecl) -> Self {
        self.conflicts.push(conflict);
        self
    }

    pub fn variant(&self, name: &str) -> Option<&VariantDefinition> {
        self.variants.iter().find(|d| d.name == name)
    }

    pub fn version_entry(&self, version: &Version) -> Option<&VersionEntry> {
        self.versions.iter().find(|e| &e.version == version)
    }

    /// Load-time checks that need the whole recipe: unique versions and
    /// variants, and every condition refers only to variants defined here.
    pub fn validate(&self) -> Result<(), RecipeError> {
        if self.versions.is_empty() {
            return Err(RecipeError::Parse {
                message: format!("recipe `{}` declares no versions", self.name),
            });
        }
        for (i, entry) in self.versions.iter().enumerate() {
            if self.versions[..i].iter().any(|e| e.version == entry.version) {
                return Err(RecipeError::version(
                    entry.version.as_str(),
                    format!("declared twice in recipe `{}`", self.name),
                ));
            }
        }
        for (i, def) in self.variants.iter().enumerate() {
            if self.variants[..i].iter().any(|d| d.name == def.name) {
                return Err(RecipeError::Parse {
                    message: format!("variant `{}` declared twice in `{}`", def.name, self.name),
                });
            }
        }
        for edge in &self.depends {
            let context = format!("condition on dependency `{}` of `{}`", edge.declared, self.name);
            edge.guard.validate(&self.variants, &context)?;
        }
        for conflict in &self.conflicts {
            let context = format!("conflict declaration of `{}`", self.name);
            conflict.spec.validate(&self.variants, &context)?;
            conflict.when.validate(&self.variants, &context)?;
        }
        Ok(())
    }

    /// Parse and validate a recipe from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, RecipeError> {
        let raw: RawRecipe = toml::from_str(content).map_err(|e| RecipeError::Parse {
            message: e.to_string(),
        })?;
        let recipe = raw.into_recipe()?;
        recipe.validate()?;
        Ok(recipe)
    }

    /// Read a recipe file. I/O failures surface as `Parse` errors naming
    /// the path.
    pub fn from_path(path: &Path) -> Result<Self, RecipeError> {
        let content = std::fs::read_to_string(path).map_err(|e| RecipeError::Parse {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }
}

// --- TOML encoding ---

#[derive(Debug, Deserialize)]
struct RawRecipe {
    package: RawPackage,
    #[serde(default)]
    versions: Vec<RawVersion>,
    #[serde(default)]
    variants: BTreeMap<String, RawVariant>,
    #[serde(default)]
    depends: Vec<RawDepends>,
    #[serde(default)]
    conflicts: Vec<RawConflict>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    maintainers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    version: String,
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    #[serde(default)]
    kind: Option<VariantKind>,
    #[serde(default)]
    default: Option<RawValue>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawDepends {
    spec: String,
    #[serde(default)]
    when: Option<String>,
    #[serde(default, rename = "type")]
    kinds: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(DependencyKind),
    Many(Vec<DependencyKind>),
}

#[derive(Debug, Deserialize)]
struct RawConflict {
    spec: String,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl RawRecipe {
    fn into_recipe(self) -> Result<Recipe, RecipeError> {
        let name = self.package.name.trim().to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(RecipeError::Parse {
                message: format!("`{name}` is not a valid package name"),
            });
        }

        let mut versions = Vec::with_capacity(self.versions.len());
        for raw in self.versions {
            versions.push(VersionEntry {
                version: Version::parse(&raw.version)?,
                commit: raw.commit,
                tag: raw.tag,
                sha256: raw.sha256,
                deprecated: raw.deprecated,
            });
        }

        let mut variants = Vec::with_capacity(self.variants.len());
        for (variant_name, raw) in self.variants {
            variants.push(raw.into_definition(variant_name)?);
        }

        let mut depends = Vec::with_capacity(self.depends.len());
        for raw in self.depends {
            let mut edge = DependencyEdge::parse(&raw.spec)?;
            if let Some(when) = raw.when.as_deref() {
                edge.guard = parse_guard(when)?;
            }
            match raw.kinds {
                Some(OneOrMany::One(kind)) => edge.kinds = [kind].into(),
                Some(OneOrMany::Many(kinds)) if kinds.is_empty() => {
                    return Err(RecipeError::Parse {
                        message: format!("dependency `{}` has an empty `type` list", raw.spec),
                    })
                }
                Some(OneOrMany::Many(kinds)) => edge.kinds = kinds.into_iter().collect(),
                None => {}
            }
            depends.push(edge);
        }

        let mut conflicts = Vec::with_capacity(self.conflicts.len());
        for raw in self.conflicts {
            conflicts.push(ConflictDecl {
                spec: parse_guard(&raw.spec)?,
                when: raw.when.as_deref().map(parse_guard).transpose()?.unwrap_or_default(),
                message: raw.msg,
            });
        }

        Ok(Recipe {
            name,
            description: self.package.description,
            homepage: self.package.homepage,
            maintainers: self.package.maintainers,
            versions,
            variants,
            depends,
            conflicts,
        })
    }
}

impl RawVariant {
    fn into_definition(self, name: String) -> Result<VariantDefinition, RecipeError> {
        let kind = self.kind.unwrap_or(match (&self.default, self.values.is_empty()) {
            (Some(RawValue::Bool(_)) | None, true) => VariantKind::Bool,
            (Some(RawValue::List(_)), false) => VariantKind::Multi,
            (_, false) => VariantKind::Single,
            (_, true) => VariantKind::Text,
        });

        let default = match (kind, self.default) {
            (VariantKind::Bool, None) => VariantValue::Bool(false),
            (VariantKind::Bool, Some(RawValue::Bool(b))) => VariantValue::Bool(b),
            (VariantKind::Single, None) => match self.values.first() {
                Some(first) => VariantValue::Single(first.clone()),
                None => {
                    return Err(RecipeError::variant_value(&name, "", "variant declares no allowed values"))
                }
            },
            (VariantKind::Single, Some(RawValue::Text(s))) => VariantValue::Single(s),
            (VariantKind::Multi, None) => match self.values.first() {
                Some(first) => VariantValue::Multi([first.clone()].into()),
                None => {
                    return Err(RecipeError::variant_value(&name, "", "variant declares no allowed values"))
                }
            },
            (VariantKind::Multi, Some(RawValue::Text(s))) => {
                VariantValue::Multi(s.split(',').map(|v| v.trim().to_string()).collect())
            }
            (VariantKind::Multi, Some(RawValue::List(list))) => {
                VariantValue::Multi(list.into_iter().collect())
            }
            (VariantKind::Text, None) => VariantValue::Text(String::new()),
            (VariantKind::Text, Some(RawValue::Text(s))) => VariantValue::Text(s),
            (kind, Some(other)) => {
                let shown = match other {
                    RawValue::Bool(b) => b.to_string(),
                    RawValue::Text(s) => s,
                    RawValue::List(list) => list.join(","),
                };
                return Err(RecipeError::variant_value(
                    &name,
                    shown,
                    format!("default does not fit a {kind} variant"),
                ));
            }
        };

        let definition = VariantDefinition::new(name, kind, default, self.values)?;
        Ok(match self.description {
            Some(description) => definition.with_description(description),
            None => definition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRTM: &str = r#"
[package]
name = "crtm"
description = "Community Radiative Transfer Model"
maintainers = ["t-brown", "climbfuji"]

[[versions]]
version = "v3.0.0-rc.1"
[[versions]]
version = "2.4.0"
commit = "5ddd0d6"
[[versions]]
version = "2.3.0"
commit = "99760e6"

[variants.fix]
default = false
description = "Download coefficient files"

[variants.build_type]
default = "RelWithDebInfo"
values = ["Debug", "Release", "RelWithDebInfo", "MinSizeRel"]

[[depends]]
spec = "cmake@3.15:"

[[depends]]
spec = "crtm-fix@2.4.0_emc"
when = "@2.4.0 +fix"

[[depends]]
spec = "ecbuild"
when = "@v3.0.0-rc.1"
type = "build"

[[conflicts]]
spec = "+fix"
when = "@v3.0.0-rc.1"
msg = "no fix files for release candidates"
"#;

    #[test]
    fn parses_full_recipe() {
        let recipe = Recipe::from_toml_str(CRTM).unwrap();
        assert_eq!(recipe.name, "crtm");
        assert_eq!(recipe.maintainers.len(), 2);
        assert_eq!(recipe.versions.len(), 3);
        assert_eq!(recipe.versions[1].source_ref(), Some("5ddd0d6"));

        let fix = recipe.variant("fix").unwrap();
        assert_eq!(fix.kind, VariantKind::Bool);
        assert_eq!(fix.description, "Download coefficient files");
        assert_eq!(recipe.variant("build_type").unwrap().kind, VariantKind::Single);

        assert_eq!(recipe.depends.len(), 3);
        assert_eq!(recipe.depends[0].target, "cmake");
        assert_eq!(
            recipe.depends[0].kinds,
            [DependencyKind::Build, DependencyKind::Link].into()
        );
        assert!(recipe.depends[0].guard.is_always());
        assert!(recipe.depends[2].is_build_only());
        assert_eq!(recipe.conflicts.len(), 1);
    }

    #[test]
    fn kind_inference() {
        let recipe = Recipe::from_toml_str(
            r#"
[package]
name = "fv3"
[[versions]]
version = "1.0"
[variants.cxxstd]
default = ["14"]
values = ["11", "14", "17"]
[variants.suffix]
default = "none"
"#,
        )
        .unwrap();
        assert_eq!(recipe.variant("cxxstd").unwrap().kind, VariantKind::Multi);
        assert_eq!(recipe.variant("suffix").unwrap().kind, VariantKind::Text);
    }

    #[test]
    fn undefined_variant_in_condition_is_rejected() {
        let text = r#"
[package]
name = "netcdf-cxx4"
[[versions]]
version = "4.3.1"
[[depends]]
spec = "doxygen"
when = "+doc"
type = "build"
"#;
        let err = Recipe::from_toml_str(text).unwrap_err();
        assert!(
            matches!(err, RecipeError::UndefinedVariantReference { ref variant, .. } if variant == "doc"),
            "{err:?}"
        );
    }

    #[test]
    fn invalid_default_is_rejected() {
        let text = r#"
[package]
name = "fv3"
[[versions]]
version = "1.0"
[variants.precision]
default = "quad"
values = ["single", "double"]
"#;
        assert!(matches!(
            Recipe::from_toml_str(text),
            Err(RecipeError::InvalidVariantValue { .. })
        ));
    }

    #[test]
    fn bad_version_is_rejected() {
        let text = r#"
[package]
name = "zlib"
[[versions]]
version = "1..2"
"#;
        assert!(matches!(
            Recipe::from_toml_str(text),
            Err(RecipeError::InvalidVersionFormat { .. })
        ));
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let text = r#"
[package]
name = "zlib"
[[versions]]
version = "1.2"
[[versions]]
version = "1.2.0"
"#;
        assert!(Recipe::from_toml_str(text).is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            Recipe::from_toml_str("[package"),
            Err(RecipeError::Parse { .. })
        ));
        assert!(matches!(
            Recipe::from_toml_str("[package]\nname = \"a\"\n[[depends]]\nspec = \"b\"\ntype = []\n[[versions]]\nversion = \"1\""),
            Err(RecipeError::Parse { .. })
        ));
    }

    #[test]
    fn edge_display() {
        let edge = DependencyEdge::parse("crtm-fix@2.4.0_emc")
            .unwrap()
            .when(parse_guard("@2.4.0 +fix").unwrap());
        assert_eq!(edge.to_string(), "crtm-fix@2.4.0_emc when @2.4.0 +fix");
    }
}
