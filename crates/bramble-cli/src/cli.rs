//! CLI argument definitions for Bramble.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "bramble",
    version,
    about = "Resolve package specs with conditional dependencies",
    long_about = "Bramble resolves an abstract package spec such as `crtm@v2.4-jedi.1 +fix` \
                  against a directory of recipes into one concrete, acyclic dependency graph, \
                  or explains why no such graph exists."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory of recipe files
    #[arg(long, global = true, env = "BRAMBLE_REPO", default_value = "recipes")]
    pub repo: PathBuf,

    /// Configuration file (defaults to the nearest bramble.toml, then ~/.bramble/config.toml)
    #[arg(long, global = true, env = "BRAMBLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the platform tag used by platform= guards
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a spec and print the concrete graph
    Resolve {
        /// Spec to resolve, e.g. "crtm@v2.4-jedi.1 +fix"
        spec: String,
        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved dependency tree
    Tree {
        /// Spec to resolve
        spec: String,
        /// Maximum depth
        #[arg(long)]
        depth: Option<u32>,
        /// Explain why a package is included
        #[arg(long)]
        why: Option<String>,
    },

    /// Validate every recipe in the repository
    Check,

    /// Show the versions, variants and dependencies a recipe declares
    Info {
        /// Package name
        name: String,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
