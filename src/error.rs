use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by the monitor's public operations
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid monitor configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Cannot subscribe to monitor after stopping it")]
    Stopped,
}
