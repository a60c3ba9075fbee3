//! Observability infrastructure for the maintenance engine
//!
//! Prometheus metrics for operation counts, failures, and prediction latency.
//! Metrics register once into the default registry; handles are cheap clones
//! of a process-global instance.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;

/// Histogram buckets for end-to-end prediction latency (seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    predictions_total: IntCounter,
    anomaly_runs_total: IntCounter,
    anomalies_flagged_total: IntCounter,
    health_scores_total: IntCounter,
    training_runs_total: IntCounter,
    operation_errors: IntCounterVec,
    prediction_latency_seconds: Histogram,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            predictions_total: register_int_counter!(
                "maintenance_engine_predictions_total",
                "Total number of failure predictions generated"
            )
            .expect("Failed to register predictions_total"),

            anomaly_runs_total: register_int_counter!(
                "maintenance_engine_anomaly_runs_total",
                "Total number of anomaly detection runs"
            )
            .expect("Failed to register anomaly_runs_total"),

            anomalies_flagged_total: register_int_counter!(
                "maintenance_engine_anomalies_flagged_total",
                "Total number of anomalous points flagged"
            )
            .expect("Failed to register anomalies_flagged_total"),

            health_scores_total: register_int_counter!(
                "maintenance_engine_health_scores_total",
                "Total number of health scores calculated"
            )
            .expect("Failed to register health_scores_total"),

            training_runs_total: register_int_counter!(
                "maintenance_engine_training_runs_total",
                "Total number of completed training runs"
            )
            .expect("Failed to register training_runs_total"),

            operation_errors: register_int_counter_vec!(
                "maintenance_engine_operation_errors_total",
                "Engine operation errors by operation and error code",
                &["operation", "code"]
            )
            .expect("Failed to register operation_errors"),

            prediction_latency_seconds: register_histogram!(
                "maintenance_engine_prediction_latency_seconds",
                "End-to-end latency of predict_maintenance_needs",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),
        }
    }
}

/// Handle to the process-global engine metrics
#[derive(Clone, Default)]
pub struct EngineMetrics {
    _private: (),
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &'static EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn record_prediction(&self, latency_secs: f64) {
        self.inner().predictions_total.inc();
        self.inner().prediction_latency_seconds.observe(latency_secs);
    }

    pub fn record_anomaly_run(&self, flagged: usize) {
        self.inner().anomaly_runs_total.inc();
        self.inner().anomalies_flagged_total.inc_by(flagged as u64);
    }

    pub fn record_health_score(&self) {
        self.inner().health_scores_total.inc();
    }

    pub fn record_training_run(&self) {
        self.inner().training_runs_total.inc();
    }

    pub fn record_operation_error(&self, operation: &str, code: &str) {
        self.inner()
            .operation_errors
            .with_label_values(&[operation, code])
            .inc();
    }

    /// Current error count for an operation/code pair
    pub fn operation_error_count(&self, operation: &str, code: &str) -> u64 {
        self.inner()
            .operation_errors
            .with_label_values(&[operation, code])
            .get()
    }
}
