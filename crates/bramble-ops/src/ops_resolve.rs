//! Operation: resolve a spec and print the concrete graph.

use std::path::Path;

use bramble_core::config::ResolveConfig;
use bramble_resolver::ResolvedGraph;
use bramble_util::errors::BrambleError;

use crate::ops_setup;

/// Options for `bramble resolve`.
#[derive(Default)]
pub struct ResolveOptions {
    /// Print the graph as JSON instead of text.
    pub json: bool,
}

/// Resolve `spec` against the recipes in `repo` and print the result.
pub async fn resolve(
    repo: &Path,
    spec: &str,
    config: &ResolveConfig,
    opts: &ResolveOptions,
) -> miette::Result<()> {
    let request = ops_setup::parse_request(spec)?;
    bramble_util::progress::status("Resolving", &request.to_string());
    let graph = ops_setup::resolve_graph(repo, &request, config).await?;
    bramble_util::progress::status(
        "Resolved",
        &format!("{} packages for {}", graph.len(), graph.root()),
    );

    if opts.json {
        let json = serde_json::to_string_pretty(&graph.to_snapshot()).map_err(|e| {
            BrambleError::Generic {
                message: format!("Failed to serialize graph: {e}"),
            }
        })?;
        println!("{json}");
    } else {
        print!("{}", render_text(&graph));
    }
    Ok(())
}

/// One line per spec, dependencies first, followed by any build-only
/// back-edges.
pub fn render_text(graph: &ResolvedGraph) -> String {
    let mut out = String::new();
    for spec in graph.nodes() {
        out.push_str(&format!("{spec} [{}]", spec.short_hash()));
        if let Some(commit) = &spec.commit {
            out.push_str(&format!(" commit={commit}"));
        }
        out.push('\n');
    }
    for back in graph.back_edges() {
        out.push_str(&format!(
            "note: {} → {} ({}) satisfied by the existing {}\n",
            back.from,
            back.to,
            back.edge.kinds_label(),
            back.to
        ));
    }
    out
}
