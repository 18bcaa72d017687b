//! Command dispatch and handler modules.

mod check;
mod info;
mod resolve;
mod tree;

use std::path::Path;

use bramble_core::config::ResolveConfig;
use miette::Result;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Resolve { spec, json } => {
            let config = load_config(cli.config.as_deref(), cli.platform)?;
            resolve::exec(&cli.repo, &spec, &config, json).await
        }
        Command::Tree { spec, depth, why } => {
            let config = load_config(cli.config.as_deref(), cli.platform)?;
            tree::exec(&cli.repo, &spec, &config, depth, why).await
        }
        Command::Check => check::exec(&cli.repo),
        Command::Info { name } => info::exec(&cli.repo, &name),
    }
}

/// Load the resolution config and apply command-line overrides.
fn load_config(explicit: Option<&Path>, platform: Option<String>) -> Result<ResolveConfig> {
    let mut config = ResolveConfig::load(explicit)?;
    if let Some(platform) = platform {
        tracing::debug!("platform overridden to {platform}");
        config.arch.platform = platform;
    }
    Ok(config)
}
