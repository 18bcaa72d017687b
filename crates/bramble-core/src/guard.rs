//! Guard predicates: the conditions that switch dependency edges on and off.
//!
//! A guard is a boolean expression over atoms that inspect the spec being
//! expanded (its version and variants), the target architecture, and, for
//! sibling atoms (`^name…`), the resolved state of another node in the same
//! graph. Evaluation is pure; the grammar has no way to express side effects.

use std::fmt;

use crate::config::{ArchConfig, ArchKey};
use crate::error::RecipeError;
use crate::variant::{VariantAssignment, VariantDefinition, VariantRequirement};
use crate::version::{Version, VersionConstraint};

/// Constraints on another node of the graph, written `^name@1.2:+mpi`.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyAtom {
    pub name: String,
    pub version: Option<VersionConstraint>,
    pub variants: Vec<VariantRequirement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// `@constraint` on the spec's own version.
    Version(VersionConstraint),
    /// `+name`, `~name`, `name=value` on the spec's own variants.
    Variant(VariantRequirement),
    /// `platform=`, `os=`, `target=`.
    Arch { key: ArchKey, tag: String },
    /// `^name…`: a sibling node's resolved state.
    Dependency(DependencyAtom),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Guard {
    #[default]
    Always,
    Atom(Atom),
    All(Vec<Guard>),
    Any(Vec<Guard>),
    Not(Box<Guard>),
}

/// Resolved state of a sibling node, as seen by `^name` atoms.
#[derive(Debug, Clone, Copy)]
pub struct SiblingState<'a> {
    pub version: &'a Version,
    pub variants: &'a VariantAssignment,
}

/// Read access to the other nodes of a graph under construction.
pub trait SiblingView {
    fn sibling(&self, name: &str) -> Option<SiblingState<'_>>;
}

/// A view with no other nodes; every `^name` atom is false.
pub struct NoSiblings;

impl SiblingView for NoSiblings {
    fn sibling(&self, _name: &str) -> Option<SiblingState<'_>> {
        None
    }
}

/// Everything a guard may inspect.
pub struct GuardContext<'a> {
    pub version: &'a Version,
    pub variants: &'a VariantAssignment,
    pub arch: &'a ArchConfig,
    pub siblings: &'a dyn SiblingView,
}

impl Atom {
    fn evaluate(&self, ctx: &GuardContext<'_>) -> bool {
        match self {
            Atom::Version(constraint) => constraint.satisfies(ctx.version),
            Atom::Variant(req) => ctx
                .variants
                .get(&req.name)
                .is_some_and(|value| req.matches(value)),
            Atom::Arch { key, tag } => ctx.arch.get(*key) == Some(tag.as_str()),
            Atom::Dependency(dep) => ctx.siblings.sibling(&dep.name).is_some_and(|state| {
                dep.version
                    .as_ref()
                    .map_or(true, |c| c.satisfies(state.version))
                    && dep.variants.iter().all(|req| {
                        state
                            .variants
                            .get(&req.name)
                            .is_some_and(|value| req.matches(value))
                    })
            }),
        }
    }
}

impl Guard {
    pub fn atom(atom: Atom) -> Self {
        Guard::Atom(atom)
    }

    /// The "variant is set" atom. On boolean variants this is `+name`.
    pub fn variant_set(name: impl Into<String>) -> Self {
        Guard::Atom(Atom::Variant(VariantRequirement::flag(name, true)))
    }

    /// Conjunction, flattening trivial cases.
    pub fn all(mut guards: Vec<Guard>) -> Self {
        guards.retain(|g| !matches!(g, Guard::Always));
        match guards.len() {
            0 => Guard::Always,
            1 => guards.remove(0),
            _ => Guard::All(guards),
        }
    }

    /// Disjunction, flattening the single-branch case.
    pub fn any(mut guards: Vec<Guard>) -> Self {
        match guards.len() {
            1 => guards.remove(0),
            _ => Guard::Any(guards),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Guard::Always)
    }

    /// Evaluate against a candidate spec. Conjunctions and disjunctions
    /// short-circuit left to right.
    pub fn evaluate(&self, ctx: &GuardContext<'_>) -> bool {
        match self {
            Guard::Always => true,
            Guard::Atom(atom) => atom.evaluate(ctx),
            Guard::All(guards) => guards.iter().all(|g| g.evaluate(ctx)),
            Guard::Any(guards) => guards.iter().any(|g| g.evaluate(ctx)),
            Guard::Not(inner) => !inner.evaluate(ctx),
        }
    }

    /// Visit every atom in declaration order.
    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Guard::Always => {}
            Guard::Atom(atom) => out.push(atom),
            Guard::All(guards) | Guard::Any(guards) => {
                for g in guards {
                    g.collect_atoms(out);
                }
            }
            Guard::Not(inner) => inner.collect_atoms(out),
        }
    }

    /// Names of the sibling nodes this guard inspects.
    pub fn sibling_names(&self) -> Vec<&str> {
        self.atoms()
            .into_iter()
            .filter_map(|atom| match atom {
                Atom::Dependency(dep) => Some(dep.name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn references_siblings(&self) -> bool {
        !self.sibling_names().is_empty()
    }

    /// Check every own-variant atom against the owning recipe's definitions.
    pub fn validate(&self, variants: &[VariantDefinition], context: &str) -> Result<(), RecipeError> {
        for atom in self.atoms() {
            let Atom::Variant(req) = atom else {
                continue;
            };
            let definition = variants.iter().find(|d| d.name == req.name).ok_or_else(|| {
                RecipeError::UndefinedVariantReference {
                    variant: req.name.clone(),
                    context: context.to_string(),
                }
            })?;
            if matches!(req.value, crate::variant::RequiredValue::Flag(_)) {
                // Flags are presence tests on non-boolean variants.
                continue;
            }
            definition.coerce(&req.value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Version(constraint) => write!(f, "@{constraint}"),
            Atom::Variant(req) => write!(f, "{req}"),
            Atom::Arch { key, tag } => write!(f, "{key}={tag}"),
            Atom::Dependency(dep) => {
                write!(f, "^{}", dep.name)?;
                if let Some(version) = &dep.version {
                    write!(f, "@{version}")?;
                }
                for req in &dep.variants {
                    match req.value {
                        crate::variant::RequiredValue::Values(_) => write!(f, " {req}")?,
                        crate::variant::RequiredValue::Flag(_) => write!(f, "{req}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => Ok(()),
            Guard::Atom(atom) => write!(f, "{atom}"),
            Guard::All(guards) => {
                for (i, g) in guards.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    let is_last = i + 1 == guards.len();
                    match g {
                        Guard::Any(_) => write!(f, "({g})")?,
                        // Atoms after a `^name` would attach to that dependency.
                        Guard::Atom(Atom::Dependency(_)) if !is_last => write!(f, "({g})")?,
                        _ => write!(f, "{g}")?,
                    }
                }
                Ok(())
            }
            Guard::Any(guards) => {
                for (i, g) in guards.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{g}")?;
                }
                Ok(())
            }
            Guard::Not(inner) => match inner.as_ref() {
                Guard::Atom(_) | Guard::Not(_) => write!(f, "!{inner}"),
                _ => write!(f, "!({inner})"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_guard;
    use crate::variant::VariantValue;

    fn arch(platform: &str) -> ArchConfig {
        ArchConfig {
            platform: platform.to_string(),
            os: None,
            target: Some("x86_64".to_string()),
        }
    }

    fn eval(text: &str, version: &str, variants: &[(&str, VariantValue)]) -> bool {
        let guard = parse_guard(text).unwrap();
        let version = Version::parse(version).unwrap();
        let variants: VariantAssignment = variants
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let arch = arch("linux");
        guard.evaluate(&GuardContext {
            version: &version,
            variants: &variants,
            arch: &arch,
            siblings: &NoSiblings,
        })
    }

    #[test]
    fn always_is_true() {
        assert!(eval("", "1.0", &[]));
    }

    #[test]
    fn version_and_variant_conjunction() {
        let fix = [("fix", VariantValue::Bool(true))];
        assert!(eval("@2.3.0 +fix", "2.3.0", &fix));
        assert!(!eval("@2.3.0 +fix", "2.4.0", &fix));
        assert!(!eval("@2.3.0 ~fix", "2.3.0", &fix));
    }

    #[test]
    fn glued_atoms() {
        let shared = [("shared", VariantValue::Bool(true))];
        assert!(eval("@4.3.1:+shared", "4.3.1", &shared));
        assert!(!eval("@4.3.1:+shared", "4.3.0", &shared));
    }

    #[test]
    fn platform_atom() {
        assert!(eval("platform=linux", "1.0", &[]));
        assert!(!eval("@:4.3.1 platform=darwin", "4.3.0", &[]));
        assert!(eval("target=x86_64", "1.0", &[]));
        assert!(!eval("os=ubuntu22.04", "1.0", &[]));
    }

    #[test]
    fn disjunction_and_negation() {
        let debug = [("build_type", VariantValue::Single("Debug".into()))];
        assert!(eval("build_type=Debug | build_type=RelWithDebInfo", "1.0", &debug));
        assert!(!eval("!(build_type=Debug | @2:)", "1.0", &debug));
        assert!(eval("!build_type=Release", "1.0", &debug));
    }

    #[test]
    fn missing_variant_is_false() {
        assert!(!eval("+mpi", "1.0", &[]));
    }

    #[test]
    fn sibling_atoms_read_the_view() {
        struct One(Version, VariantAssignment);
        impl SiblingView for One {
            fn sibling(&self, name: &str) -> Option<SiblingState<'_>> {
                (name == "hdf5").then_some(SiblingState {
                    version: &self.0,
                    variants: &self.1,
                })
            }
        }
        let view = One(
            Version::parse("1.14.0").unwrap(),
            [("mpi".to_string(), VariantValue::Bool(true))].into(),
        );
        let version = Version::parse("4.3.1").unwrap();
        let variants = VariantAssignment::new();
        let arch = arch("linux");
        let ctx = GuardContext {
            version: &version,
            variants: &variants,
            arch: &arch,
            siblings: &view,
        };
        assert!(parse_guard("^hdf5+mpi").unwrap().evaluate(&ctx));
        assert!(parse_guard("^hdf5@1.14:").unwrap().evaluate(&ctx));
        assert!(!parse_guard("^hdf5~mpi").unwrap().evaluate(&ctx));
        assert!(!parse_guard("^zlib").unwrap().evaluate(&ctx));
    }

    #[test]
    fn validate_rejects_undefined_variant() {
        let defs = vec![VariantDefinition::boolean("fix", false)];
        let err = parse_guard("@2.3.0 +doc")
            .unwrap()
            .validate(&defs, "crtm")
            .unwrap_err();
        assert!(matches!(err, RecipeError::UndefinedVariantReference { ref variant, .. } if variant == "doc"));
    }

    #[test]
    fn validate_rejects_out_of_domain_value() {
        let defs = vec![VariantDefinition::new(
            "precision",
            crate::variant::VariantKind::Single,
            VariantValue::Single("double".into()),
            vec!["single".into(), "double".into()],
        )
        .unwrap()];
        assert!(parse_guard("precision=quad")
            .unwrap()
            .validate(&defs, "fv3")
            .is_err());
        assert!(parse_guard("precision=single")
            .unwrap()
            .validate(&defs, "fv3")
            .is_ok());
    }

    #[test]
    fn sibling_names_in_order() {
        let guard = parse_guard("^hdf5+mpi | ^netcdf-c@4.9:").unwrap();
        assert_eq!(guard.sibling_names(), vec!["hdf5", "netcdf-c"]);
        assert!(guard.references_siblings());
        assert!(!parse_guard("+mpi").unwrap().references_siblings());
    }

    #[test]
    fn display_reparses_to_same_guard() {
        for text in [
            "@2.3.0 +fix",
            "build_type=Debug | ~shared",
            "!(+doc @:4.3.0)",
            "^hdf5@1.14:+mpi platform=darwin",
        ] {
            let guard = parse_guard(text).unwrap();
            assert_eq!(parse_guard(&guard.to_string()).unwrap(), guard, "{text}");
        }
    }
}
