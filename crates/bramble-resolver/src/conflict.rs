//! Resolution failures and their human-readable explanations.

use std::collections::BTreeSet;
use std::fmt;

use bramble_core::recipe::{kinds_label, DependencyKind};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    VersionConflict,
    VariantConflict,
    CycleDetected,
    UnsatisfiableGuard,
    RecipeNotFound,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VersionConflict => "version conflict",
            Self::VariantConflict => "variant conflict",
            Self::CycleDetected => "dependency cycle",
            Self::UnsatisfiableGuard => "unsatisfiable condition",
            Self::RecipeNotFound => "missing recipe",
        })
    }
}

/// One requirement that contributed to a conflict: who asked, over which
/// kind of edge, and for what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// Names from the root down to the requester. Empty for the request
    /// itself.
    pub path: Vec<String>,
    pub kinds: BTreeSet<DependencyKind>,
    pub requirement: String,
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("request")?;
        } else {
            f.write_str(&self.path.join(" → "))?;
        }
        if !self.kinds.is_empty() {
            write!(f, "({})", kinds_label(&self.kinds))?;
        }
        write!(f, " requires {}", self.requirement)
    }
}

/// The reason one node could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub node: String,
    pub kind: ConflictKind,
    /// Contributing requirements, oldest first.
    pub chain: Vec<ChainLink>,
    pub detail: String,
}

impl Conflict {
    pub fn new(
        node: impl Into<String>,
        kind: ConflictKind,
        chain: Vec<ChainLink>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            kind,
            chain,
            detail: detail.into(),
        }
    }

    /// `root → a(build) requires b@:2 ; root → c(run) requires b@3: — no common version`
    pub fn render(&self) -> String {
        let chain = self
            .chain
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ; ");
        if chain.is_empty() {
            self.detail.clone()
        } else {
            format!("{chain} — {}", self.detail)
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on `{}`: {}", self.kind, self.node, self.render())
    }
}

/// Counters describing the search that produced a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub decisions: usize,
    pub backtracks: usize,
    pub recipes_loaded: usize,
}

/// A failed resolution: the most recent conflict plus search statistics.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{conflict}")]
#[diagnostic(code(bramble::resolve::conflict))]
pub struct ConflictReport {
    pub conflict: Conflict,
    pub stats: SearchStats,
    #[help]
    pub help: Option<String>,
}

impl ConflictReport {
    pub fn new(conflict: Conflict, stats: SearchStats) -> Self {
        let help = match conflict.kind {
            ConflictKind::VersionConflict => {
                Some("relax one of the version constraints listed above".to_string())
            }
            ConflictKind::VariantConflict => {
                Some("request a variant value every dependent accepts".to_string())
            }
            ConflictKind::CycleDetected => Some(
                "only build-only edges onto an already chosen spec may point back up the graph"
                    .to_string(),
            ),
            ConflictKind::RecipeNotFound => {
                Some(format!("add a recipe for `{}` to the repository", conflict.node))
            }
            ConflictKind::UnsatisfiableGuard => None,
        };
        Self {
            conflict,
            stats,
            help,
        }
    }

    pub fn kind(&self) -> ConflictKind {
        self.conflict.kind
    }

    /// Multi-line explanation for terminal output.
    pub fn explain(&self) -> String {
        let mut out = format!("{} on `{}`\n", self.conflict.kind, self.conflict.node);
        for link in &self.conflict.chain {
            out.push_str(&format!("  {link}\n"));
        }
        out.push_str(&format!("  {}\n", self.conflict.detail));
        out.push_str(&format!(
            "  ({} decisions, {} backtracks, {} recipes loaded)\n",
            self.stats.decisions, self.stats.backtracks, self.stats.recipes_loaded
        ));
        out
    }
}

/// Why `resolve` returned no graph.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ResolveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Conflict(ConflictReport),

    #[error("resolution was cancelled")]
    #[diagnostic(code(bramble::resolve::cancelled))]
    Cancelled,
}

impl ResolveError {
    pub fn report(&self) -> Option<&ConflictReport> {
        match self {
            Self::Conflict(report) => Some(report),
            Self::Cancelled => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(path: &[&str], kind: DependencyKind, requirement: &str) -> ChainLink {
        ChainLink {
            path: path.iter().map(|s| s.to_string()).collect(),
            kinds: [kind].into(),
            requirement: requirement.to_string(),
        }
    }

    #[test]
    fn render_joins_chain_and_detail() {
        let conflict = Conflict::new(
            "b",
            ConflictKind::VersionConflict,
            vec![
                link(&["root", "a"], DependencyKind::Build, "b@:2"),
                link(&["root", "c"], DependencyKind::Run, "b@3:"),
            ],
            "no common version",
        );
        assert_eq!(
            conflict.render(),
            "root → a(build) requires b@:2 ; root → c(run) requires b@3: — no common version"
        );
    }

    #[test]
    fn request_link_has_no_path() {
        let link = ChainLink {
            path: Vec::new(),
            kinds: BTreeSet::new(),
            requirement: "crtm@3:".into(),
        };
        assert_eq!(link.to_string(), "request requires crtm@3:");
    }

    #[test]
    fn report_help_names_missing_recipe() {
        let report = ConflictReport::new(
            Conflict::new("git-lfs", ConflictKind::RecipeNotFound, Vec::new(), "no recipe"),
            SearchStats::default(),
        );
        assert_eq!(report.kind(), ConflictKind::RecipeNotFound);
        assert!(report.help.as_deref().unwrap().contains("git-lfs"));
        assert!(report.explain().contains("missing recipe on `git-lfs`"));
    }
}
