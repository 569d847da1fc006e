//! Server monitor
//!
//! One background task per monitored server:
//! - Runs a heartbeat immediately, then `heartbeat_interval` after each one finishes
//! - Stores the resulting description and fans it out to every subscriber
//! - On stop, closes every subscription and refuses new ones
//!
//! The current description and the subscriber registry are guarded by two
//! independent locks, and neither is held across network I/O.

mod heartbeat;
mod rtt;
mod subscription;

pub use subscription::{Subscription, TryRecvError, Unsubscribe};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerOptions;
use crate::connection::Dialer;
use crate::description::{Endpoint, ServerDescription};
use crate::error::MonitorError;
use crate::metrics::metrics;

use heartbeat::Heartbeater;
use subscription::Registry;

/// State shared between the monitor handle and its loop
struct Shared {
    /// Latest published description
    description: RwLock<Arc<ServerDescription>>,
    registry: Arc<Registry>,
}

/// Monitors a single server and publishes its description
pub struct ServerMonitor {
    endpoint: Endpoint,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    /// Loop task, taken by the first `stop`
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ServerMonitor {
    /// Validate `options` and start monitoring
    ///
    /// Must be called from within a Tokio runtime. Invalid options are
    /// rejected before any task is spawned.
    pub fn start(
        mut options: ServerOptions,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self, MonitorError> {
        options.validate()?;
        options.fill_defaults();

        let endpoint = options.connection.endpoint.clone();
        let interval = options.heartbeat_interval();
        let shared = Arc::new(Shared {
            description: RwLock::new(Arc::new(ServerDescription::unknown(endpoint.clone()))),
            registry: Arc::new(Registry::default()),
        });
        let shutdown = CancellationToken::new();

        let heartbeater = Heartbeater::new(options.connection, dialer);
        let task = tokio::spawn(run_monitor(
            heartbeater,
            shared.clone(),
            interval,
            shutdown.clone(),
        ));

        metrics().monitors_running.inc();
        info!(endpoint = %endpoint, interval = ?interval, "Server monitor started");

        Ok(Self {
            endpoint,
            shared,
            shutdown,
            task: tokio::sync::Mutex::new(Some(task)),
        })
    }

    /// Subscribe to description updates
    ///
    /// The subscription is seeded with the current description. Fails with
    /// `MonitorError::Stopped` once the monitor has stopped.
    pub fn subscribe(&self) -> Result<(Subscription, Unsubscribe), MonitorError> {
        let shared = &self.shared;
        let result = shared
            .registry
            .subscribe(|| shared.description.read().clone());

        match &result {
            Ok(_) => debug!(endpoint = %self.endpoint, "Subscription added"),
            Err(e) => debug!(endpoint = %self.endpoint, error = %e, "Subscription rejected"),
        }
        result
    }

    /// Latest published description
    pub fn description(&self) -> Arc<ServerDescription> {
        self.shared.description.read().clone()
    }

    /// Address being monitored
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of open subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Whether the monitor has shut down
    pub fn is_stopped(&self) -> bool {
        self.shared.registry.is_closed()
    }

    /// Stop the monitor and wait for it to shut down
    ///
    /// A heartbeat in progress is allowed to finish. When this returns every
    /// subscription is closed and `subscribe` fails. Calling it again is a
    /// no-op.
    pub async fn stop(&self) {
        self.shutdown.cancel();

        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                warn!(endpoint = %self.endpoint, error = %e, "Monitor task ended abnormally");
            }
        }
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Monitor loop: heartbeat, store, publish, until cancelled
async fn run_monitor(
    mut heartbeater: Heartbeater,
    shared: Arc<Shared>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    // First heartbeat runs right away
    let mut delay = Duration::ZERO;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {
                let desc = Arc::new(heartbeater.heartbeat().await);
                *shared.description.write() = desc.clone();
                shared.registry.publish(&desc);
                delay = interval;
            }
        }
    }

    let closed = shared.registry.close_all();
    heartbeater.close().await;
    let endpoint = shared.description.read().endpoint.clone();
    metrics().clear_average_rtt(endpoint.as_str());
    metrics().monitors_running.dec();

    info!(endpoint = %endpoint, subscriptions_closed = closed, "Server monitor stopped");
}
