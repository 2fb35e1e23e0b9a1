//! Loading `RuntimeConfig` from a TOML file.

use std::path::Path;

use murmur_types::config::RuntimeConfig;
use murmur_types::error::ConfigError;

/// Read and parse a runtime configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<RuntimeConfig, ConfigError> {
    let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ConfigError::Io(format!("{}: {e}", path.as_ref().display()))
    })?;
    toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
}
