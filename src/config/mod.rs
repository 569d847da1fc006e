mod schema;

pub use schema::*;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load server options from a TOML file
///
/// The returned options are neither validated nor defaulted; that happens
/// when a monitor is started.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServerOptions, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let options: ServerOptions = toml::from_str(&content)?;
    Ok(options)
}
