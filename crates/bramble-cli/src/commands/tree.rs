//! Handler for `bramble tree`.

use std::path::Path;

use bramble_core::config::ResolveConfig;
use bramble_ops::ops_tree::{self, TreeOptions};
use miette::Result;

pub async fn exec(
    repo: &Path,
    spec: &str,
    config: &ResolveConfig,
    depth: Option<u32>,
    why: Option<String>,
) -> Result<()> {
    let opts = TreeOptions {
        depth: depth.map(|d| d as usize),
        why,
    };
    ops_tree::tree(repo, spec, config, &opts).await
}
