use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ConnectionOptions;
use crate::connection::{Connection, ConnectionError, Dialer};
use crate::description::{HeartbeatError, ServerDescription};
use crate::metrics::{metrics, HeartbeatOutcome};

use super::rtt::RttSmoother;

/// Attempts per heartbeat before the server is reported down
const MAX_ATTEMPTS: usize = 2;

/// Runs heartbeats against one server, reusing a cached connection
///
/// Owned by the monitor loop; nothing else touches the connection.
pub(crate) struct Heartbeater {
    options: ConnectionOptions,
    dialer: Arc<dyn Dialer>,
    conn: Option<Box<dyn Connection>>,
    rtt: RttSmoother,
}

impl Heartbeater {
    pub(crate) fn new(options: ConnectionOptions, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            options,
            dialer,
            conn: None,
            rtt: RttSmoother::default(),
        }
    }

    /// Probe the server and describe it
    ///
    /// Retries once on a dial or probe failure, reconnecting first. Stops at
    /// the first successful probe. If every attempt fails the description
    /// carries only the endpoint and the last error.
    pub(crate) async fn heartbeat(&mut self) -> ServerDescription {
        let endpoint = &self.options.endpoint;
        let mut last_error = ConnectionError::Disconnected;

        for attempt in 1..=MAX_ATTEMPTS {
            if self.conn.is_none() {
                match self.dialer.dial(&self.options).await {
                    Ok(conn) => self.conn = Some(conn),
                    Err(e) => {
                        debug!(endpoint = %endpoint, attempt, error = %e, "Heartbeat dial failed");
                        metrics().record_attempt_failure();
                        last_error = e;
                        continue;
                    }
                }
            }
            let Some(conn) = self.conn.as_mut() else {
                continue;
            };

            let started = Instant::now();
            let result = conn.probe().await;
            let elapsed = started.elapsed();

            match result {
                Ok((is_master, build_info)) => {
                    let average_rtt = self.rtt.update(elapsed);
                    metrics().set_average_rtt(endpoint.as_str(), average_rtt);

                    let desc =
                        ServerDescription::from_probe(endpoint.clone(), &is_master, &build_info)
                            .with_average_rtt(average_rtt);
                    let outcome = if desc.last_error.is_some() {
                        HeartbeatOutcome::NotOk
                    } else {
                        HeartbeatOutcome::Ok
                    };
                    metrics().record_heartbeat(outcome);
                    debug!(
                        endpoint = %endpoint,
                        server_type = ?desc.server_type,
                        rtt = ?elapsed,
                        average_rtt = ?average_rtt,
                        outcome = ?outcome,
                        "Heartbeat completed"
                    );
                    return desc;
                }
                Err(e) => {
                    debug!(
                        endpoint = %endpoint,
                        attempt,
                        error = %e,
                        "Heartbeat probe failed, reconnecting"
                    );
                    metrics().record_attempt_failure();
                    if let Some(mut conn) = self.conn.take() {
                        conn.close().await;
                    }
                    last_error = e;
                }
            }
        }

        warn!(endpoint = %endpoint, error = %last_error, "Heartbeat failed, server unreachable");
        metrics().record_heartbeat(HeartbeatOutcome::Failed);
        ServerDescription::failed(endpoint.clone(), HeartbeatError::Connection(last_error))
    }

    /// Close and forget the cached connection
    pub(crate) async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
        }
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}
