//! Handler for `bramble resolve`.

use std::path::Path;

use bramble_core::config::ResolveConfig;
use bramble_ops::ops_resolve::{self, ResolveOptions};
use miette::Result;

pub async fn exec(repo: &Path, spec: &str, config: &ResolveConfig, json: bool) -> Result<()> {
    ops_resolve::resolve(repo, spec, config, &ResolveOptions { json }).await
}
