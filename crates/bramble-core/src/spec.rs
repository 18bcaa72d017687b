use std::fmt;
use std::str::FromStr;

use crate::error::RecipeError;
use crate::variant::{VariantAssignment, VariantRequirement, VariantValue};
use crate::version::{Version, VersionConstraint};

/// A request for a package: its name plus optional constraints on the
/// version and variants, as written `netcdf-c@4.8: +mpi`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRequest {
    pub name: String,
    pub version: Option<VersionConstraint>,
    pub variants: Vec<VariantRequirement>,
}

impl SpecRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            variants: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, RecipeError> {
        crate::syntax::parse_spec(text)
    }

    pub fn with_version(mut self, constraint: VersionConstraint) -> Self {
        self.version = Some(constraint);
        self
    }

    pub fn with_variant(mut self, requirement: VariantRequirement) -> Self {
        self.variants.push(requirement);
        self
    }

    /// The version constraint, `Any` when none was given.
    pub fn constraint(&self) -> VersionConstraint {
        self.version.clone().unwrap_or(VersionConstraint::Any)
    }
}

impl fmt::Display for SpecRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        for req in &self.variants {
            write!(f, " {req}")?;
        }
        Ok(())
    }
}

impl FromStr for SpecRequest {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A fully concrete node of a resolved graph: one version, every variant
/// fixed. A graph holds at most one spec per name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    pub name: String,
    pub version: Version,
    /// Opaque source attribute of the chosen version (commit, tag).
    pub commit: Option<String>,
    pub variants: VariantAssignment,
    /// Content hash of this spec and everything below it. Empty until the
    /// graph is frozen.
    pub dag_hash: String,
}

impl Spec {
    pub fn new(name: impl Into<String>, version: Version, variants: VariantAssignment) -> Self {
        Self {
            name: name.into(),
            version,
            commit: None,
            variants,
            dag_hash: String::new(),
        }
    }

    /// Render the variants as `+a ~b key=value`, in name order.
    pub fn variants_text(&self) -> String {
        self.variants
            .iter()
            .map(|(name, value)| match value {
                VariantValue::Bool(true) => format!("+{name}"),
                VariantValue::Bool(false) => format!("~{name}"),
                other => format!("{name}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Stable text identity used as hash input. Unlike `Display` it always
    /// includes the source attribute.
    pub fn canonical_text(&self) -> String {
        let mut text = format!("{}@{}", self.name, self.version.as_str());
        if let Some(commit) = &self.commit {
            text.push_str(" commit=");
            text.push_str(commit);
        }
        let variants = self.variants_text();
        if !variants.is_empty() {
            text.push(' ');
            text.push_str(&variants);
        }
        text
    }

    /// Hash this spec together with its children's hashes. Children must be
    /// passed in a deterministic order.
    pub fn compute_hash<'a>(&self, child_hashes: impl IntoIterator<Item = &'a str>) -> String {
        let mut parts = vec![self.canonical_text()];
        parts.extend(child_hashes.into_iter().map(str::to_owned));
        bramble_util::hash::sha256_parts(parts.iter().map(String::as_str))
    }

    /// The first seven base32 characters of the DAG hash, as shown in trees.
    pub fn short_hash(&self) -> String {
        bramble_util::hash::short_base32(&self.dag_hash, 7)
    }

    /// Whether this concrete spec meets every constraint of `request`.
    pub fn satisfies(&self, request: &SpecRequest) -> bool {
        request.name == self.name
            && request
                .version
                .as_ref()
                .map_or(true, |c| c.satisfies(&self.version))
            && request.variants.iter().all(|req| {
                self.variants
                    .get(&req.name)
                    .is_some_and(|value| req.matches(value))
            })
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)?;
        let variants = self.variants_text();
        if !variants.is_empty() {
            write!(f, " {variants}")?;
        }
        Ok(())
    }
}
