//! Health monitor for a single database server
//!
//! A [`ServerMonitor`] runs a background heartbeat against one server,
//! keeps the latest [`ServerDescription`] and hands it to any number of
//! subscribers without ever waiting on them.
//!
//! ```no_run
//! use std::sync::Arc;
//! # use server_monitor::connection::Dialer;
//! use server_monitor::{ServerMonitor, ServerOptions};
//!
//! # async fn run(dialer: Arc<dyn Dialer>) -> Result<(), Box<dyn std::error::Error>> {
//! let monitor = ServerMonitor::start(ServerOptions::new("db1.example.com:27017"), dialer)?;
//! let (mut updates, unsubscribe) = monitor.subscribe()?;
//!
//! while let Some(desc) = updates.recv().await {
//!     if let Some(err) = &desc.last_error {
//!         eprintln!("{} is down: {}", desc.endpoint, err);
//!     }
//! #   break;
//! }
//!
//! unsubscribe.unsubscribe();
//! monitor.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod description;
mod error;
pub mod metrics;
pub mod monitor;

pub use config::{load_config, ConfigError, ConnectionOptions, ServerOptions};
pub use description::{
    Endpoint, HeartbeatError, ServerDescription, ServerType, Version, WireVersionRange,
};
pub use error::MonitorError;
pub use monitor::{ServerMonitor, Subscription, TryRecvError, Unsubscribe};
