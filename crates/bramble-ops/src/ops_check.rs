//! Operation: validate every recipe in a repository.
//!
//! Each recipe is loaded and validated on its own, so one broken file does
//! not hide problems in the others. Dependency targets that have no recipe
//! are reported as warnings; they only fail a resolution if a guard
//! actually activates the edge.

use std::collections::BTreeSet;
use std::path::Path;

use bramble_core::recipe::Recipe;
use bramble_core::repository::RecipeSource;
use bramble_util::errors::BrambleError;
use bramble_util::progress;

use crate::ops_setup;

/// Outcome of checking a repository.
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub checked: usize,
    /// `(name, problem)` for every recipe that failed to load.
    pub invalid: Vec<(String, String)>,
    /// `(recipe, target)` for edges naming a package with no recipe.
    pub dangling: Vec<(String, String)>,
}

/// Check the repository at `repo`, printing one status line per problem.
pub fn check(repo: &Path) -> miette::Result<CheckSummary> {
    let source = ops_setup::open_repository(repo)?;
    progress::status("Checking", &format!("recipes in {}", repo.display()));
    let summary = check_source(source.as_ref())?;

    for (name, problem) in &summary.invalid {
        progress::status_error("Invalid", &format!("{name}: {problem}"));
    }
    for (name, target) in &summary.dangling {
        progress::status_warn(
            "Missing",
            &format!("{name} depends on `{target}`, which has no recipe"),
        );
    }

    if summary.invalid.is_empty() {
        progress::status("Finished", &format!("{} recipes are valid", summary.checked));
        Ok(summary)
    } else {
        Err(BrambleError::Recipe {
            message: format!(
                "{} of {} recipes failed validation",
                summary.invalid.len(),
                summary.checked
            ),
        }
        .into())
    }
}

/// Load every recipe `source` knows about and collect the problems.
pub fn check_source(source: &dyn RecipeSource) -> miette::Result<CheckSummary> {
    let names = source.names().map_err(|e| BrambleError::Repository {
        message: e.detail(),
    })?;
    let known: BTreeSet<&str> = names.iter().map(String::as_str).collect();

    let mut summary = CheckSummary::default();
    for name in &names {
        summary.checked += 1;
        match source.lookup(name) {
            Ok(recipe) => {
                tracing::debug!(
                    "{name}: {} versions, {} edges",
                    recipe.versions.len(),
                    recipe.depends.len()
                );
                for target in dangling_targets(&recipe, &known) {
                    summary.dangling.push((name.clone(), target));
                }
            }
            Err(e) => summary.invalid.push((name.clone(), e.detail())),
        }
    }
    Ok(summary)
}

fn dangling_targets(recipe: &Recipe, known: &BTreeSet<&str>) -> Vec<String> {
    let targets: BTreeSet<&str> = recipe
        .depends
        .iter()
        .map(|edge| edge.target.as_str())
        .filter(|target| !known.contains(target))
        .collect();
    targets.into_iter().map(str::to_string).collect()
}
