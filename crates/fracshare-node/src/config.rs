//! Node configuration loading.
//!
//! The config file path comes from `FRACSHARE_CONFIG`, else the first
//! command-line argument. Without either the built-in defaults are used.

use std::path::{Path, PathBuf};

use fracshare_types::{constants, NodeConfig, Result};

/// Resolve the config path from the environment and the arguments
/// (program name excluded).
pub fn config_path(env_value: Option<String>, mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
    env_value
        .filter(|v| !v.trim().is_empty())
        .or_else(|| args.next())
        .map(PathBuf::from)
}

/// # Errors
/// `Io` if the file cannot be read, `Serialization` / `Configuration` if
/// its contents are invalid.
pub fn load(path: Option<&Path>) -> Result<NodeConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            NodeConfig::from_json(&raw)
        }
        None => Ok(NodeConfig::default()),
    }
}

/// Load using the process environment and arguments.
pub fn load_from_env() -> Result<(NodeConfig, Option<PathBuf>)> {
    let path = config_path(
        std::env::var(constants::CONFIG_ENV_VAR).ok(),
        std::env::args().skip(1),
    );
    Ok((load(path.as_deref())?, path))
}
