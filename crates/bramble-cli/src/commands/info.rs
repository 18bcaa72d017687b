//! Handler for `bramble info`.

use std::path::Path;

use miette::Result;

pub fn exec(repo: &Path, name: &str) -> Result<()> {
    bramble_ops::ops_info::info(repo, name)
}
