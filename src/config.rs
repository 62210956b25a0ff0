//! Configuration file discovery.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mf_core::config::Config;

/// Locations searched, in order, when no config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./mediaflow.json",
    "~/.config/mediaflow/config.json",
    "/etc/mediaflow/config.json",
];

/// Find the first existing config file among the default locations.
pub fn find_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Load the config at `custom_path`, or the first default location that
/// exists, or built-in defaults.
///
/// An explicitly given path must exist and parse.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_config() {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

/// Load and parse a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}
