//! Observability infrastructure for the handover core
//!
//! Provides:
//! - Prometheus metrics (decisions, fallbacks, suppressions, predictor latency, topology size)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for predictor latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<HandoverMetricsInner> = OnceLock::new();

struct HandoverMetricsInner {
    decisions: IntCounterVec,
    fallbacks: IntCounterVec,
    suppressions: IntCounterVec,
    predictor_latency_seconds: Histogram,
    registered_cells: IntGauge,
    tracked_ues: IntGauge,
    predictive_mode: IntGauge,
}

impl HandoverMetricsInner {
    fn new() -> Self {
        Self {
            decisions: register_int_counter_vec!(
                "handover_decisions_total",
                "Handover decisions by outcome",
                &["outcome", "mode"]
            )
            .expect("Failed to register decisions"),

            fallbacks: register_int_counter_vec!(
                "handover_predictor_fallbacks_total",
                "Predictive evaluations that fell back to the rule",
                &["reason"]
            )
            .expect("Failed to register fallbacks"),

            suppressions: register_int_counter_vec!(
                "handover_suppressions_total",
                "Candidate handovers suppressed as ping-pong",
                &["reason"]
            )
            .expect("Failed to register suppressions"),

            predictor_latency_seconds: register_histogram!(
                "handover_predictor_latency_seconds",
                "Time spent in the predictive evaluator",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register predictor_latency_seconds"),

            registered_cells: register_int_gauge!(
                "handover_registered_cells",
                "Number of cells in the registry"
            )
            .expect("Failed to register registered_cells"),

            tracked_ues: register_int_gauge!(
                "handover_tracked_ues",
                "Number of UEs with tracker state"
            )
            .expect("Failed to register tracked_ues"),

            predictive_mode: register_int_gauge!(
                "handover_predictive_mode",
                "1 when the last tick ran in predictive mode"
            )
            .expect("Failed to register predictive_mode"),
        }
    }
}

/// Handover metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct HandoverMetrics {
    _private: (),
}

impl Default for HandoverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoverMetrics {
    /// Create a metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(HandoverMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &HandoverMetricsInner {
        GLOBAL_METRICS.get_or_init(HandoverMetricsInner::new)
    }

    pub fn inc_decision(&self, outcome: &str, mode: &str) {
        self.inner()
            .decisions
            .with_label_values(&[outcome, mode])
            .inc();
    }

    pub fn inc_fallback(&self, reason: &str) {
        self.inner().fallbacks.with_label_values(&[reason]).inc();
    }

    pub fn inc_suppression(&self, reason: &str) {
        self.inner().suppressions.with_label_values(&[reason]).inc();
    }

    pub fn observe_predictor_latency(&self, duration_secs: f64) {
        self.inner().predictor_latency_seconds.observe(duration_secs);
    }

    pub fn set_topology(&self, cells: usize, ues: usize) {
        self.inner().registered_cells.set(cells as i64);
        self.inner().tracked_ues.set(ues as i64);
    }

    pub fn set_predictive_mode(&self, predictive: bool) {
        self.inner().predictive_mode.set(predictive as i64);
    }
}

/// Structured logger for handover events
///
/// Every record carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn log_handover_applied(
        &self,
        ue_id: &str,
        from_cell: &str,
        to_cell: &str,
        mode: &str,
        confidence: Option<f64>,
        timestamp: f64,
    ) {
        info!(
            event = "handover_applied",
            node = %self.node_name,
            ue_id = %ue_id,
            from_cell = %from_cell,
            to_cell = %to_cell,
            mode = %mode,
            confidence = ?confidence,
            timestamp = timestamp,
            "Handover applied"
        );
    }

    pub fn log_handover_suppressed(
        &self,
        ue_id: &str,
        candidate: &str,
        reason: &str,
        confidence: f64,
        timestamp: f64,
    ) {
        info!(
            event = "handover_suppressed",
            node = %self.node_name,
            ue_id = %ue_id,
            candidate = %candidate,
            reason = %reason,
            confidence = confidence,
            timestamp = timestamp,
            "Handover suppressed"
        );
    }

    pub fn log_predictor_fallback(&self, ue_id: &str, reason: &str, detail: &str) {
        warn!(
            event = "predictor_fallback",
            node = %self.node_name,
            ue_id = %ue_id,
            reason = %reason,
            detail = %detail,
            "Predictive evaluation fell back to rule"
        );
    }

    pub fn log_mode_changed(&self, from: &str, to: &str, cell_count: usize) {
        info!(
            event = "mode_changed",
            node = %self.node_name,
            from = %from,
            to = %to,
            cell_count = cell_count,
            "Evaluation mode changed"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str) {
        info!(
            event = "sim_started",
            node = %self.node_name,
            version = %version,
            model_version = %model_version,
            "Handover core started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "sim_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Handover core shutting down"
        );
    }
}
