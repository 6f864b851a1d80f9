//! TOML configuration file parsing.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Read and deserialize a TOML file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] if the file cannot be read (including when
/// it does not exist) or [`ConfigError::Parse`] if it is not valid TOML for
/// `T`.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &content)
}

/// Deserialize TOML `content` that was read from `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] on malformed TOML or a schema mismatch.
pub fn parse_config<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}
