//! Operation: display the resolved dependency tree.

use std::path::Path;

use bramble_core::config::ResolveConfig;
use bramble_resolver::ResolvedGraph;

use crate::ops_setup;

/// Options for `bramble tree`.
#[derive(Default)]
pub struct TreeOptions {
    /// Maximum tree depth to display.
    pub depth: Option<usize>,
    /// Show the path from the root to a specific package.
    pub why: Option<String>,
}

/// Resolve `spec` and print its dependency tree.
pub async fn tree(
    repo: &Path,
    spec: &str,
    config: &ResolveConfig,
    opts: &TreeOptions,
) -> miette::Result<()> {
    let request = ops_setup::parse_request(spec)?;
    let graph = ops_setup::resolve_graph(repo, &request, config).await?;
    print!("{}", render(&graph, opts));
    Ok(())
}

pub fn render(graph: &ResolvedGraph, opts: &TreeOptions) -> String {
    let Some(target) = &opts.why else {
        return graph.print_tree(opts.depth);
    };
    match graph.find_path(target) {
        Some(path) => {
            let mut out = format!("Path to {target}:\n");
            for (i, spec) in path.iter().enumerate() {
                let indent = "  ".repeat(i);
                out.push_str(&format!("{indent}{spec}\n"));
            }
            let dependents = graph.dependents_of(target);
            if dependents.len() > 1 {
                let names: Vec<&str> = dependents.iter().map(|s| s.name.as_str()).collect();
                out.push_str(&format!("Required by: {}\n", names.join(", ")));
            }
            out
        }
        None => format!("Dependency '{target}' not found in the graph.\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_core::repository::MemorySource;
    use bramble_core::spec::SpecRequest;

    fn graph() -> ResolvedGraph {
        let source = MemorySource::from_toml([
            "[package]\nname = \"app\"\n[[versions]]\nversion = \"1.0\"\n[[depends]]\nspec = \"lib\"\n[[depends]]\nspec = \"zlib\"\n",
            "[package]\nname = \"lib\"\n[[versions]]\nversion = \"2.0\"\n[[depends]]\nspec = \"zlib\"\n",
            "[package]\nname = \"zlib\"\n[[versions]]\nversion = \"1.3\"\n",
        ])
        .unwrap();
        bramble_resolver::resolve(&SpecRequest::new("app"), &source, &ResolveConfig::default())
            .unwrap()
    }

    #[test]
    fn why_prints_the_path_and_all_dependents() {
        let opts = TreeOptions {
            why: Some("zlib".into()),
            ..Default::default()
        };
        let out = render(&graph(), &opts);
        assert!(out.starts_with("Path to zlib:\napp@1.0\n"));
        assert!(out.contains("Required by: app, lib"));
    }

    #[test]
    fn why_unknown_package() {
        let opts = TreeOptions {
            why: Some("hdf5".into()),
            ..Default::default()
        };
        assert_eq!(
            render(&graph(), &opts),
            "Dependency 'hdf5' not found in the graph.\n"
        );
    }

    #[test]
    fn depth_limits_the_tree() {
        let full = render(&graph(), &TreeOptions::default());
        let shallow = render(
            &graph(),
            &TreeOptions {
                depth: Some(1),
                ..Default::default()
            },
        );
        assert!(full.lines().count() > shallow.lines().count());
        assert_eq!(shallow.lines().count(), 3);
    }
}
