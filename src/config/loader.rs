// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawConfigFile, SupervisorConfig};
use crate::errors::ConfigError;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check durations
/// or limits. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and turn it into a [`SupervisorConfig`].
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Parses duration strings and checks limits.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SupervisorConfig, ConfigError> {
    let raw_config = load_from_path(&path)?;
    SupervisorConfig::try_from(raw_config)
}
