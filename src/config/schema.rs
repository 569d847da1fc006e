use std::time::Duration;

use serde::Deserialize;

use crate::description::Endpoint;

use super::ConfigError;

/// Smallest heartbeat interval accepted by `ServerOptions::validate`
pub const MIN_HEARTBEAT_INTERVAL_MS: u64 = 10;

// ============================================================================
// Monitor Configuration
// ============================================================================

/// Options for a single server monitor
#[derive(Debug, Clone, Deserialize)]
pub struct ServerOptions {
    /// Options used to (re)open the heartbeat connection
    pub connection: ConnectionOptions,
    /// Interval between heartbeats (milliseconds), 0 means default
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

impl ServerOptions {
    pub fn new(endpoint: impl Into<Endpoint>) -> Self {
        Self {
            connection: ConnectionOptions::new(endpoint),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }

    /// Set the heartbeat interval, rounding up to whole milliseconds
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_nanos().div_ceil(1_000_000) as u64;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Reject options a monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms != 0
            && self.heartbeat_interval_ms < MIN_HEARTBEAT_INTERVAL_MS
        {
            return Err(ConfigError::Invalid(format!(
                "heartbeat_interval_ms must be at least {}, got {}",
                MIN_HEARTBEAT_INTERVAL_MS, self.heartbeat_interval_ms
            )));
        }
        self.connection.validate()
    }

    /// Replace unset values with defaults and canonicalize the endpoint
    pub fn fill_defaults(&mut self) {
        if self.heartbeat_interval_ms == 0 {
            self.heartbeat_interval_ms = default_heartbeat_interval_ms();
        }
        self.connection.fill_defaults();
    }
}

/// Options handed to the dialer when opening a heartbeat connection
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionOptions {
    /// Address of the monitored server (host:port)
    pub endpoint: Endpoint,
    /// Dial/handshake timeout (milliseconds), 0 means default
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Application name reported in the handshake
    #[serde(default)]
    pub app_name: Option<String>,
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

impl ConnectionOptions {
    pub fn new(endpoint: impl Into<Endpoint>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            app_name: None,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        if let Some(port) = self.endpoint.port_str() {
            if port.parse::<u16>().is_err() {
                return Err(ConfigError::Invalid(format!(
                    "invalid port in endpoint {}",
                    self.endpoint
                )));
            }
        }
        if self.endpoint.host().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "missing host in endpoint {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    fn fill_defaults(&mut self) {
        if self.connect_timeout_ms == 0 {
            self.connect_timeout_ms = default_connect_timeout_ms();
        }
        self.endpoint = self.endpoint.canonicalize();
    }
}
