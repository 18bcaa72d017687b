//! Typed build variants: definitions, values, and textual requirements.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RecipeError;

/// The value domain of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// `true` / `false`.
    Bool,
    /// Exactly one value from the allowed set.
    Single,
    /// Any non-empty subset of the allowed set.
    Multi,
    /// Free-form string.
    Text,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Single => "single",
            Self::Multi => "multi",
            Self::Text => "text",
        })
    }
}

/// A concrete variant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
    Multi(BTreeSet<String>),
    Text(String),
}

impl VariantValue {
    pub fn kind(&self) -> VariantKind {
        match self {
            Self::Bool(_) => VariantKind::Bool,
            Self::Single(_) => VariantKind::Single,
            Self::Multi(_) => VariantKind::Multi,
            Self::Text(_) => VariantKind::Text,
        }
    }

    /// Presence test used by `+name` on non-boolean variants.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Multi(values) => !values.is_empty(),
            Self::Single(s) | Self::Text(s) => !s.is_empty() && s != "none",
        }
    }

    /// Combine two requirements on the same variant. Multi-valued variants
    /// accumulate; every other kind must agree exactly.
    pub fn merge(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Multi(a), Self::Multi(b)) => Some(Self::Multi(a.union(b).cloned().collect())),
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Single(s) | Self::Text(s) => f.write_str(s),
            Self::Multi(values) => {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Chosen variant values for one spec, keyed by variant name.
pub type VariantAssignment = BTreeMap<String, VariantValue>;

/// An untyped requirement as written in spec or condition text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequiredValue {
    /// `+name` or `~name`.
    Flag(bool),
    /// `name=value` or `name=a,b`.
    Values(Vec<String>),
}

/// A named requirement on one variant, e.g. `+mpi` or `build_type=Release`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantRequirement {
    pub name: String,
    pub value: RequiredValue,
}

impl VariantRequirement {
    pub fn flag(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            value: RequiredValue::Flag(enabled),
        }
    }

    pub fn values<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            value: RequiredValue::Values(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Test the requirement against a typed value.
    ///
    /// A flag on a non-boolean variant tests presence; a value list on a
    /// multi-valued variant tests membership of every listed value.
    pub fn matches(&self, value: &VariantValue) -> bool {
        match (&self.value, value) {
            (RequiredValue::Flag(wanted), VariantValue::Bool(actual)) => wanted == actual,
            (RequiredValue::Flag(wanted), other) => other.is_set() == *wanted,
            (RequiredValue::Values(wanted), VariantValue::Bool(actual)) => {
                matches!(wanted.as_slice(), [one] if parse_bool(one) == Some(*actual))
            }
            (RequiredValue::Values(wanted), VariantValue::Single(actual))
            | (RequiredValue::Values(wanted), VariantValue::Text(actual)) => {
                matches!(wanted.as_slice(), [one] if one == actual)
            }
            (RequiredValue::Values(wanted), VariantValue::Multi(actual)) => {
                !wanted.is_empty() && wanted.iter().all(|w| actual.contains(w))
            }
        }
    }
}

impl fmt::Display for VariantRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            RequiredValue::Flag(true) => write!(f, "+{}", self.name),
            RequiredValue::Flag(false) => write!(f, "~{}", self.name),
            RequiredValue::Values(values) => write!(f, "{}={}", self.name, values.join(",")),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// A variant declared by a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDefinition {
    pub name: String,
    pub kind: VariantKind,
    pub default: VariantValue,
    /// Allowed values for `Single` and `Multi`; empty otherwise.
    pub values: Vec<String>,
    pub description: String,
}

impl VariantDefinition {
    /// Build a definition, checking the default against the domain.
    pub fn new(
        name: impl Into<String>,
        kind: VariantKind,
        default: VariantValue,
        values: Vec<String>,
    ) -> Result<Self, RecipeError> {
        let name = name.into();
        if matches!(kind, VariantKind::Single | VariantKind::Multi) && values.is_empty() {
            return Err(RecipeError::variant_value(
                &name,
                default.to_string(),
                format!("{kind} variant declares no allowed values"),
            ));
        }
        let definition = Self {
            name,
            kind,
            default,
            values,
            description: String::new(),
        };
        definition.validate(&definition.default)?;
        Ok(definition)
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self {
            name: name.into(),
            kind: VariantKind::Bool,
            default: VariantValue::Bool(default),
            values: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(&self) -> VariantValue {
        self.default.clone()
    }

    /// Check that `value` lies in this variant's domain.
    pub fn validate(&self, value: &VariantValue) -> Result<(), RecipeError> {
        if value.kind() != self.kind {
            return Err(RecipeError::variant_value(
                &self.name,
                value.to_string(),
                format!("expected a {} value", self.kind),
            ));
        }
        let outside: Vec<&String> = match value {
            VariantValue::Single(s) => vec![s],
            VariantValue::Multi(set) => {
                if set.is_empty() {
                    return Err(RecipeError::variant_value(
                        &self.name,
                        "",
                        "multi-valued variant needs at least one value",
                    ));
                }
                set.iter().collect()
            }
            VariantValue::Bool(_) | VariantValue::Text(_) => Vec::new(),
        };
        if let Some(bad) = outside.into_iter().find(|v| !self.values.contains(v)) {
            return Err(RecipeError::variant_value(
                &self.name,
                bad.clone(),
                format!("allowed values are {}", self.values.join(", ")),
            ));
        }
        Ok(())
    }

    /// Turn a textual requirement into a typed value in this domain.
    pub fn coerce(&self, required: &RequiredValue) -> Result<VariantValue, RecipeError> {
        let value = match (self.kind, required) {
            (VariantKind::Bool, RequiredValue::Flag(b)) => VariantValue::Bool(*b),
            (VariantKind::Bool, RequiredValue::Values(values)) => match values.as_slice() {
                [one] => VariantValue::Bool(parse_bool(one).ok_or_else(|| {
                    RecipeError::variant_value(&self.name, one.clone(), "expected true or false")
                })?),
                _ => {
                    return Err(RecipeError::variant_value(
                        &self.name,
                        values.join(","),
                        "expected true or false",
                    ))
                }
            },
            (_, RequiredValue::Flag(b)) => {
                return Err(RecipeError::variant_value(
                    &self.name,
                    if *b { "+" } else { "~" },
                    format!("`{}` is a {} variant, not a boolean", self.name, self.kind),
                ))
            }
            (VariantKind::Single, RequiredValue::Values(values)) => match values.as_slice() {
                [one] => VariantValue::Single(one.clone()),
                _ => {
                    return Err(RecipeError::variant_value(
                        &self.name,
                        values.join(","),
                        "single-valued variant accepts exactly one value",
                    ))
                }
            },
            (VariantKind::Multi, RequiredValue::Values(values)) => {
                VariantValue::Multi(values.iter().cloned().collect())
            }
            (VariantKind::Text, RequiredValue::Values(values)) => {
                VariantValue::Text(values.join(","))
            }
        };
        self.validate(&value)?;
        Ok(value)
    }
}

impl fmt::Display for VariantDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, default {})", self.name, self.kind, self.default)?;
        if !self.values.is_empty() {
            write!(f, " [{}]", self.values.join(", "))?;
        }
        Ok(())
    }
}
