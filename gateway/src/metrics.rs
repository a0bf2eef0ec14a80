//! Prometheus metrics for telemux

use crate::error::{GatewayError, Result};
use prometheus::{
    Counter, CounterVec, Encoder, HistogramVec, TextEncoder, register_counter,
    register_counter_vec, register_histogram_vec,
};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Delivery outcome label values
pub const OUTCOME_DELIVERED: &str = "delivered";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_PANICKED: &str = "panicked";

/// All telemux metrics
pub struct Metrics {
    // ─────────────────────────────────────────────────────────────────────────
    // Event counters
    // ─────────────────────────────────────────────────────────────────────────
    /// Events handed to the forwarder
    pub events_received: Counter,

    /// Events addressed to no registered consumer
    pub events_unrouted: Counter,

    // ─────────────────────────────────────────────────────────────────────────
    // Per-consumer delivery
    // ─────────────────────────────────────────────────────────────────────────
    /// Deliveries by consumer and outcome (delivered/failed/panicked)
    pub deliveries: CounterVec,

    /// Actions that failed and were skipped (by consumer, action kind)
    pub actions_failed: CounterVec,

    /// Time from dispatch start to consumer return
    pub dispatch_duration_seconds: HistogramVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────
    /// Host failovers (a host failed and the next one was tried)
    pub transport_failover_total: Counter,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            events_received: register_counter!(
                "telemux_events_received_total",
                "Total events handed to the forwarder"
            )
            .map_err(|e| GatewayError::Metrics(format!("events_received: {e}")))?,

            events_unrouted: register_counter!(
                "telemux_events_unrouted_total",
                "Events that matched no registered consumer"
            )
            .map_err(|e| GatewayError::Metrics(format!("events_unrouted: {e}")))?,

            deliveries: register_counter_vec!(
                "telemux_deliveries_total",
                "Consumer deliveries by outcome",
                &["consumer", "outcome"]
            )
            .map_err(|e| GatewayError::Metrics(format!("deliveries: {e}")))?,

            actions_failed: register_counter_vec!(
                "telemux_actions_failed_total",
                "Actions that failed and were skipped",
                &["consumer", "action"]
            )
            .map_err(|e| GatewayError::Metrics(format!("actions_failed: {e}")))?,

            dispatch_duration_seconds: register_histogram_vec!(
                "telemux_dispatch_duration_seconds",
                "Time spent processing and delivering one event to one consumer",
                &["consumer"],
                // Buckets: 100us to 30s
                vec![
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0
                ]
            )
            .map_err(|e| GatewayError::Metrics(format!("dispatch_duration_seconds: {e}")))?,

            transport_failover_total: register_counter!(
                "telemux_transport_failover_total",
                "Host failovers in the delivery transport"
            )
            .map_err(|e| GatewayError::Metrics(format!("transport_failover: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| GatewayError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    pub fn record_received(&self) {
        self.events_received.inc();
    }

    pub fn record_unrouted(&self) {
        self.events_unrouted.inc();
    }

    /// Record one dispatch: outcome counter plus duration
    pub fn record_dispatch(&self, consumer: &str, outcome: &str, duration: Duration) {
        self.deliveries
            .with_label_values(&[consumer, outcome])
            .inc();
        self.dispatch_duration_seconds
            .with_label_values(&[consumer])
            .observe(duration.as_secs_f64());
    }

    pub fn record_action_failed(&self, consumer: &str, action: &str) {
        self.actions_failed
            .with_label_values(&[consumer, action])
            .inc();
    }

    pub fn record_failover(&self) {
        self.transport_failover_total.inc();
    }
}

/// Gather all metrics and encode as Prometheus text format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Record an action failure if metrics are initialized
pub fn try_record_action_failed(consumer: &str, action: &str) {
    if let Some(m) = Metrics::get() {
        m.record_action_failed(consumer, action);
    }
}

/// Record a failover if metrics are initialized
pub fn try_record_failover() {
    if let Some(m) = Metrics::get() {
        m.record_failover();
    }
}
