//! Operation: describe one recipe.

use std::path::Path;

use bramble_core::recipe::Recipe;
use bramble_core::repository::RecipeSource;
use bramble_util::errors::BrambleError;

use crate::ops_setup;

/// Print everything `repo` declares about package `name`.
pub fn info(repo: &Path, name: &str) -> miette::Result<()> {
    let source = ops_setup::open_repository(repo)?;
    let recipe = source.lookup(name).map_err(|e| BrambleError::Recipe {
        message: e.detail(),
    })?;
    print!("{}", render(&recipe));
    Ok(())
}

pub fn render(recipe: &Recipe) -> String {
    let mut out = recipe.name.clone();
    if let Some(description) = &recipe.description {
        out.push_str(&format!(": {description}"));
    }
    out.push('\n');
    if let Some(homepage) = &recipe.homepage {
        out.push_str(&format!("Homepage: {homepage}\n"));
    }
    if !recipe.maintainers.is_empty() {
        out.push_str(&format!("Maintainers: {}\n", recipe.maintainers.join(", ")));
    }

    out.push_str("\nVersions (preferred first):\n");
    for entry in &recipe.versions {
        out.push_str(&format!("  {}", entry.version));
        if let Some(source_ref) = entry.source_ref() {
            out.push_str(&format!("  {source_ref}"));
        }
        if entry.deprecated {
            out.push_str("  (deprecated)");
        }
        out.push('\n');
    }

    if !recipe.variants.is_empty() {
        out.push_str("\nVariants:\n");
        for variant in &recipe.variants {
            out.push_str(&format!("  {variant}"));
            if !variant.description.is_empty() {
                out.push_str(&format!("\n      {}", variant.description));
            }
            out.push('\n');
        }
    }

    if !recipe.depends.is_empty() {
        out.push_str("\nDependencies:\n");
        for edge in &recipe.depends {
            out.push_str(&format!("  {edge} ({})\n", edge.kinds_label()));
        }
    }

    if !recipe.conflicts.is_empty() {
        out.push_str("\nConflicts:\n");
        for conflict in &recipe.conflicts {
            out.push_str(&format!("  {conflict}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_section() {
        let recipe = Recipe::from_toml_str(
            r#"
[package]
name = "crtm"
description = "Community Radiative Transfer Model"

[[versions]]
version = "v2.4-jedi.1"
tag = "v2.4-jedi.1"

[[versions]]
version = "v2.3-jedi.4"
deprecated = true

[variants.fix]
default = false
description = "Download the fix files"

[[depends]]
spec = "cmake@3.14:"
type = "build"

[[depends]]
spec = "crtm-fix@2.4.0_emc"
when = "@v2.4-jedi.1 +fix"

[[conflicts]]
spec = "+fix"
when = "@v2.3-jedi.4"
msg = "no fix files"
"#,
        )
        .unwrap();
        let out = render(&recipe);
        assert!(out.starts_with("crtm: Community Radiative Transfer Model\n"));
        assert!(out.contains("  v2.4-jedi.1  v2.4-jedi.1\n"));
        assert!(out.contains("  v2.3-jedi.4  (deprecated)\n"));
        assert!(out.contains("Download the fix files"));
        assert!(out.contains("  cmake@3.14: (build)\n"));
        assert!(out.contains("crtm-fix@2.4.0_emc when"));
        assert!(out.contains("Conflicts:\n  conflicts with `+fix` when `@v2.3-jedi.4`: no fix files\n"));
    }
}
