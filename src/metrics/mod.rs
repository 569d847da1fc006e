//! Prometheus metrics for server monitors
//!
//! Metrics are process-wide and shared by every monitor; per-server values
//! carry an `endpoint` label.

use prometheus::{GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics registry
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get the global metrics instance
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Outcome label for a completed heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Server answered and reported ok
    Ok,
    /// Server answered but reported not ok
    NotOk,
    /// Every attempt failed
    Failed,
}

impl HeartbeatOutcome {
    fn as_label(self) -> &'static str {
        match self {
            HeartbeatOutcome::Ok => "ok",
            HeartbeatOutcome::NotOk => "not_ok",
            HeartbeatOutcome::Failed => "failed",
        }
    }
}

/// Monitor metrics collection
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,

    /// Completed heartbeats by outcome
    pub heartbeats_total: IntCounterVec,
    /// Individual dial/probe attempts that failed
    pub heartbeat_attempt_failures_total: IntCounter,
    /// Smoothed round-trip time per endpoint (seconds)
    pub average_rtt_seconds: GaugeVec,
    /// Open subscriptions across all monitors
    pub subscribers: IntGauge,
    /// Monitors currently running
    pub monitors_running: IntGauge,
}

impl Metrics {
    /// Create a new metrics collection
    pub fn new() -> Self {
        let registry = Registry::new();

        let heartbeats_total = IntCounterVec::new(
            Opts::new(
                "server_monitor_heartbeats_total",
                "Total number of completed heartbeats by outcome",
            ),
            &["outcome"], // ok, not_ok, failed
        )
        .unwrap();

        let heartbeat_attempt_failures_total = IntCounter::new(
            "server_monitor_heartbeat_attempt_failures_total",
            "Total number of failed dial or probe attempts",
        )
        .unwrap();

        let average_rtt_seconds = GaugeVec::new(
            Opts::new(
                "server_monitor_average_rtt_seconds",
                "Smoothed heartbeat round-trip time in seconds",
            ),
            &["endpoint"],
        )
        .unwrap();

        let subscribers = IntGauge::new(
            "server_monitor_subscribers",
            "Current number of open monitor subscriptions",
        )
        .unwrap();

        let monitors_running = IntGauge::new(
            "server_monitor_running",
            "Current number of running server monitors",
        )
        .unwrap();

        registry
            .register(Box::new(heartbeats_total.clone()))
            .unwrap();
        registry
            .register(Box::new(heartbeat_attempt_failures_total.clone()))
            .unwrap();
        registry
            .register(Box::new(average_rtt_seconds.clone()))
            .unwrap();
        registry.register(Box::new(subscribers.clone())).unwrap();
        registry
            .register(Box::new(monitors_running.clone()))
            .unwrap();

        Self {
            registry,
            heartbeats_total,
            heartbeat_attempt_failures_total,
            average_rtt_seconds,
            subscribers,
            monitors_running,
        }
    }

    /// Record a completed heartbeat
    pub fn record_heartbeat(&self, outcome: HeartbeatOutcome) {
        self.heartbeats_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    /// Record a failed dial or probe attempt
    pub fn record_attempt_failure(&self) {
        self.heartbeat_attempt_failures_total.inc();
    }

    /// Update the smoothed RTT for an endpoint
    pub fn set_average_rtt(&self, endpoint: &str, rtt: Duration) {
        self.average_rtt_seconds
            .with_label_values(&[endpoint])
            .set(rtt.as_secs_f64());
    }

    /// Stop exporting the smoothed RTT for an endpoint
    pub fn clear_average_rtt(&self, endpoint: &str) {
        // Err only means no RTT was ever recorded
        let _ = self.average_rtt_seconds.remove_label_values(&[endpoint]);
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
