//! Handler for `bramble check`.

use std::path::Path;

use miette::Result;

pub fn exec(repo: &Path) -> Result<()> {
    bramble_ops::ops_check::check(repo).map(|_| ())
}
