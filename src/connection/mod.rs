//! Heartbeat connection collaborators
//!
//! The monitor does not speak the wire protocol itself. It opens
//! connections through a [`Dialer`] and asks each [`Connection`] to run the
//! handshake and build-info commands, receiving already decoded replies.

mod probe;

pub use probe::{BuildInfoResult, IsMasterResult};

use async_trait::async_trait;

use crate::config::ConnectionOptions;

/// Opens heartbeat connections
///
/// Implementations own dialing, TLS, handshake and any timeouts. A failed
/// dial must not leave a half-open connection behind.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, options: &ConnectionOptions)
        -> Result<Box<dyn Connection>, ConnectionError>;
}

/// An open heartbeat connection
#[async_trait]
pub trait Connection: Send {
    /// Run the handshake and build-info commands
    async fn probe(&mut self) -> Result<(IsMasterResult, BuildInfoResult), ConnectionError>;

    /// Close the underlying transport
    async fn close(&mut self);
}

/// Connection errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection disconnected")]
    Disconnected,
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e.to_string())
    }
}
