//! Version parsing, comparison, and constraint algebra.
//!
//! Two shapes of version exist:
//! - *Release* versions: an optional leading `v`, dotted numeric segments,
//!   and an optional free-form suffix (`2.4.1-jedi`, `2.3.0_emc`, `4.3.1`).
//! - *Commit pins*: `git.<ref>`, an immutable VCS reference.
//!
//! Release versions are totally ordered:
//! - Numeric segments compare component-wise, the shorter side padded with
//!   zeros (`2.4 == 2.4.0`)
//! - Suffixes compare lexically, and only when the numeric parts are equal
//! - A version without suffix sorts before any suffixed one
//!
//! A commit pin is equal to itself and incomparable to everything else, so
//! `PartialOrd::partial_cmp` returns `None` for such pairs.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::RecipeError;

const PIN_PREFIX: &str = "git.";

/// A parsed, immutable package version.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    kind: Kind,
}

#[derive(Debug, Clone)]
enum Kind {
    Release { numeric: Vec<u64>, suffix: String },
    Pin { reference: String },
}

impl Version {
    pub fn parse(text: &str) -> Result<Self, RecipeError> {
        let original = text.trim();
        if original.is_empty() {
            return Err(RecipeError::version(text, "empty version"));
        }
        if let Some(bad) = original
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        {
            return Err(RecipeError::version(
                text,
                format!("unexpected character `{bad}`"),
            ));
        }

        if let Some(reference) = original.strip_prefix(PIN_PREFIX) {
            if reference.is_empty() {
                return Err(RecipeError::version(text, "commit pin without a reference"));
            }
            return Ok(Self {
                original: original.to_string(),
                kind: Kind::Pin {
                    reference: reference.to_string(),
                },
            });
        }

        let body = original
            .strip_prefix('v')
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(original);
        if !body.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(RecipeError::version(text, "must start with a digit"));
        }

        let mut numeric = Vec::new();
        let mut rest = body;
        loop {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            let segment = rest[..end]
                .parse::<u64>()
                .map_err(|_| RecipeError::version(text, "numeric segment out of range"))?;
            numeric.push(segment);
            rest = &rest[end..];
            match rest.strip_prefix('.') {
                Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
                _ => break,
            }
        }

        if rest.ends_with(['.', '-', '_']) {
            return Err(RecipeError::version(text, "dangling separator"));
        }
        let mut previous_was_separator = false;
        for c in rest.chars() {
            let is_separator = matches!(c, '.' | '-' | '_');
            if is_separator && previous_was_separator {
                return Err(RecipeError::version(text, "repeated separator"));
            }
            previous_was_separator = is_separator;
        }

        Ok(Self {
            original: original.to_string(),
            kind: Kind::Release {
                numeric,
                suffix: rest.to_string(),
            },
        })
    }

    /// The version text as written.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// `true` for `git.<ref>` commit pins.
    pub fn is_pin(&self) -> bool {
        matches!(self.kind, Kind::Pin { .. })
    }

    /// The numeric segments of a release version (empty for pins).
    pub fn numeric(&self) -> &[u64] {
        match &self.kind {
            Kind::Release { numeric, .. } => numeric,
            Kind::Pin { .. } => &[],
        }
    }

    /// Total order used only to normalize version sets: releases newest
    /// first, then pins by reference.
    pub(crate) fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (&self.kind, &other.kind) {
            (Kind::Pin { reference: a }, Kind::Pin { reference: b }) => a.cmp(b),
            (Kind::Pin { .. }, Kind::Release { .. }) => Ordering::Greater,
            (Kind::Release { .. }, Kind::Pin { .. }) => Ordering::Less,
            (Kind::Release { .. }, Kind::Release { .. }) => self
                .partial_cmp(other)
                .unwrap_or(Ordering::Equal)
                .reverse(),
        }
    }
}

fn compare_releases(a: &[u64], a_suffix: &str, b: &[u64], b_suffix: &str) -> Ordering {
    let max_len = a.len().max(b.len());
    for i in 0..max_len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    a_suffix.cmp(b_suffix)
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (&self.kind, &other.kind) {
            (Kind::Pin { reference: a }, Kind::Pin { reference: b }) => {
                (a == b).then_some(Ordering::Equal)
            }
            (Kind::Pin { .. }, _) | (_, Kind::Pin { .. }) => None,
            (
                Kind::Release {
                    numeric: a,
                    suffix: a_suffix,
                },
                Kind::Release {
                    numeric: b,
                    suffix: b_suffix,
                },
            ) => Some(compare_releases(a, a_suffix, b, b_suffix)),
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.kind {
            Kind::Release { numeric, suffix } => {
                let significant = numeric
                    .iter()
                    .rposition(|&n| n != 0)
                    .map_or(0, |last| last + 1);
                0u8.hash(state);
                numeric[..significant].hash(state);
                suffix.hash(state);
            }
            Kind::Pin { reference } => {
                1u8.hash(state);
                reference.hash(state);
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl FromStr for Version {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A constraint on the admissible versions of one package.
///
/// Constraints are kept normalized so structural equality coincides with
/// semantic equality: an unbounded range is [`VersionConstraint::Any`], a
/// range whose bounds coincide is a one-element set, and sets are sorted and
/// deduplicated. The empty constraint is never constructed; operations that
/// could produce it return `None` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Any,
    /// Inclusive bounds; at least one is present and `lo < hi`.
    Range {
        lo: Option<Version>,
        hi: Option<Version>,
    },
    /// Explicitly admissible versions (may include commit pins).
    Set(Vec<Version>),
}

impl VersionConstraint {
    pub fn exact(version: Version) -> Self {
        Self::Set(vec![version])
    }

    /// Build an inclusive range. Returns `None` when the range is empty or a
    /// bound is a commit pin.
    pub fn range(lo: Option<Version>, hi: Option<Version>) -> Option<Self> {
        if lo.as_ref().is_some_and(Version::is_pin) || hi.as_ref().is_some_and(Version::is_pin) {
            return None;
        }
        match (lo, hi) {
            (None, None) => Some(Self::Any),
            (Some(lo), Some(hi)) => match lo.partial_cmp(&hi) {
                Some(Ordering::Less) => Some(Self::Range {
                    lo: Some(lo),
                    hi: Some(hi),
                }),
                Some(Ordering::Equal) => Some(Self::exact(lo)),
                _ => None,
            },
            (lo, hi) => Some(Self::Range { lo, hi }),
        }
    }

    /// Build a set constraint. Returns `None` for an empty set.
    pub fn set(versions: impl IntoIterator<Item = Version>) -> Option<Self> {
        let mut versions: Vec<Version> = versions.into_iter().collect();
        versions.sort_by(Version::canonical_cmp);
        versions.dedup();
        (!versions.is_empty()).then_some(Self::Set(versions))
    }

    pub fn parse(text: &str) -> Result<Self, RecipeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RecipeError::version(text, "empty version constraint"));
        }
        if trimmed.contains(',') {
            let mut versions = Vec::new();
            for part in trimmed.split(',') {
                if part.contains(':') {
                    return Err(RecipeError::version(
                        text,
                        "ranges cannot be mixed into a version list",
                    ));
                }
                versions.push(Version::parse(part)?);
            }
            return Self::set(versions)
                .ok_or_else(|| RecipeError::version(text, "empty version list"));
        }
        if let Some((lo, hi)) = trimmed.split_once(':') {
            let lo = (!lo.trim().is_empty())
                .then(|| Version::parse(lo))
                .transpose()?;
            let hi = (!hi.trim().is_empty())
                .then(|| Version::parse(hi))
                .transpose()?;
            if lo.as_ref().is_some_and(Version::is_pin) || hi.as_ref().is_some_and(Version::is_pin)
            {
                return Err(RecipeError::version(text, "commit pins cannot bound a range"));
            }
            return Self::range(lo, hi)
                .ok_or_else(|| RecipeError::version(text, "lower bound exceeds upper bound"));
        }
        Ok(Self::exact(Version::parse(trimmed)?))
    }

    /// Check whether a version is admitted by this constraint.
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Range { lo, hi } => {
                if version.is_pin() {
                    return false;
                }
                let above = lo.as_ref().map_or(true, |lo| version >= lo);
                let below = hi.as_ref().map_or(true, |hi| version <= hi);
                above && below
            }
            Self::Set(versions) => versions.iter().any(|v| v == version),
        }
    }

    /// The constraint admitting exactly the versions both sides admit, or
    /// `None` when no version can satisfy both.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Any, c) | (c, Self::Any) => Some(c.clone()),
            (Self::Range { lo: a_lo, hi: a_hi }, Self::Range { lo: b_lo, hi: b_hi }) => {
                let lo = tighter(a_lo, b_lo, Ordering::Greater);
                let hi = tighter(a_hi, b_hi, Ordering::Less);
                Self::range(lo, hi)
            }
            (Self::Set(versions), range @ Self::Range { .. })
            | (range @ Self::Range { .. }, Self::Set(versions)) => {
                Self::set(versions.iter().filter(|v| range.satisfies(v)).cloned())
            }
            (Self::Set(a), Self::Set(b)) => {
                Self::set(a.iter().filter(|v| b.contains(v)).cloned())
            }
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Pick the bound that keeps the range narrower: the greater lower bound or
/// the lesser upper bound.
fn tighter(a: &Option<Version>, b: &Option<Version>, keep: Ordering) -> Option<Version> {
    match (a, b) {
        (None, None) => None,
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (Some(x), Some(y)) => {
            if x.partial_cmp(y) == Some(keep) {
                Some(x.clone())
            } else {
                Some(y.clone())
            }
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(":"),
            Self::Range { lo, hi } => {
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                f.write_str(":")?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                Ok(())
            }
            Self::Set(versions) => {
                for (i, v) in versions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
