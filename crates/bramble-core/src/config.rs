use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use bramble_util::errors::BrambleError;

use crate::variant::RequiredValue;

/// Resolution settings, loaded from `bramble.toml` or `~/.bramble/config.toml`.
///
/// The configuration is passed explicitly to every resolution; nothing in the
/// engine reads process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveConfig {
    #[serde(default)]
    pub arch: ArchConfig,

    /// Platform-wide variant preferences from `[variants]`. They sit between
    /// explicit requests and recipe defaults.
    #[serde(default)]
    pub variants: BTreeMap<String, ConfigVariant>,

    #[serde(default)]
    pub resolver: ResolverSettings,
}

/// Target architecture from `[arch]`, matched by `platform=`, `os=` and
/// `target=` condition atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchConfig {
    #[serde(default = "host_platform")]
    pub platform: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default = "host_target")]
    pub target: Option<String>,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self {
            platform: host_platform(),
            os: None,
            target: host_target(),
        }
    }
}

fn host_platform() -> String {
    match std::env::consts::OS {
        "macos" => "darwin".to_string(),
        other => other.to_string(),
    }
}

fn host_target() -> Option<String> {
    Some(std::env::consts::ARCH.to_string())
}

/// The three architecture components a condition can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchKey {
    Platform,
    Os,
    Target,
}

impl fmt::Display for ArchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchKey::Platform => "platform",
            ArchKey::Os => "os",
            ArchKey::Target => "target",
        })
    }
}

impl ArchConfig {
    pub fn get(&self, key: ArchKey) -> Option<&str> {
        match key {
            ArchKey::Platform => Some(self.platform.as_str()),
            ArchKey::Os => self.os.as_deref(),
            ArchKey::Target => self.target.as_deref(),
        }
    }
}

/// A variant preference as written in `[variants]`:
/// `mpi = true`, `build_type = "Release"` or `cxxstd = ["14", "17"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigVariant {
    Flag(bool),
    Value(String),
    List(Vec<String>),
}

impl ConfigVariant {
    /// The untyped requirement this preference stands for; each recipe
    /// coerces it against its own definition.
    pub fn requirement(&self) -> RequiredValue {
        match self {
            ConfigVariant::Flag(b) => RequiredValue::Flag(*b),
            ConfigVariant::Value(v) => RequiredValue::Values(vec![v.clone()]),
            ConfigVariant::List(vs) => RequiredValue::Values(vs.clone()),
        }
    }
}

/// Search limits from `[resolver]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    #[serde(default = "default_max_backtracks", rename = "max-backtracks")]
    pub max_backtracks: u32,
    #[serde(default = "default_prefetch_jobs", rename = "prefetch-jobs")]
    pub prefetch_jobs: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_backtracks: default_max_backtracks(),
            prefetch_jobs: default_prefetch_jobs(),
        }
    }
}

fn default_max_backtracks() -> u32 {
    10_000
}

fn default_prefetch_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Name of the project-local configuration file.
pub const CONFIG_FILE_NAME: &str = "bramble.toml";

impl ResolveConfig {
    /// Load configuration from the first of: `explicit`, the nearest
    /// `bramble.toml` in the current directory or its ancestors,
    /// `~/.bramble/config.toml`. Defaults apply when none exists.
    pub fn load(explicit: Option<&Path>) -> miette::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let local = std::env::current_dir()
            .ok()
            .and_then(|cwd| bramble_util::fs::nearest_file(&cwd, CONFIG_FILE_NAME));
        if let Some(local) = local {
            return Self::from_file(&local);
        }
        let global = Self::default_path();
        if global.is_file() {
            return Self::from_file(&global);
        }
        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BrambleError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        tracing::debug!("loaded configuration from {}", path.display());
        Self::parse(&content).map_err(|e| match e {
            BrambleError::Config { message } => BrambleError::Config {
                message: format!("{}: {message}", path.display()),
            }
            .into(),
            other => other.into(),
        })
    }

    pub fn parse(content: &str) -> Result<Self, BrambleError> {
        toml::from_str(content).map_err(|e| BrambleError::Config {
            message: format!("Failed to parse configuration: {e}"),
        })
    }

    /// Returns the default path to the user configuration file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the path to the Bramble data directory (`~/.bramble/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".bramble")
}
