//! Request orchestration
//!
//! Composes the reader, extractor, detector, predictor and scorer into the
//! four public operations. Each request walks an explicit state machine and
//! returns either a complete result or a typed error wrapped with the device
//! id and operation name; partial results never escape.

use crate::alert::{AlertEvent, AlertSink};
use crate::anomaly::AnomalyDetector;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::FeatureExtractor;
use crate::health::HealthScorer;
use crate::models::{
    AnomalyDetectionResult, HealthScoreResult, MaintenanceFeedback, MaintenancePrediction,
    TelemetrySample,
};
use crate::observability::EngineMetrics;
use crate::predictor::{FailurePredictor, ModelTrainer, ParameterStore};
use crate::telemetry::{normalize_window, DeviceDirectory, TelemetryStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stages a request moves through; `Failed` is reachable from any of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Fetching,
    Extracting,
    Detecting,
    Predicting,
    Scoring,
    Done,
    Failed,
}

/// Per-request state tracker; transitions are logged for auditability
struct OperationTracker {
    operation: &'static str,
    device_id: String,
    state: OperationState,
}

impl OperationTracker {
    fn start(operation: &'static str, device_id: &str) -> Self {
        Self {
            operation,
            device_id: device_id.to_string(),
            state: OperationState::Idle,
        }
    }

    fn advance(&mut self, next: OperationState) {
        debug!(
            operation = self.operation,
            device_id = %self.device_id,
            from = ?self.state,
            to = ?next,
            "Operation state transition"
        );
        self.state = next;
    }

    /// Move to `Failed` and wrap the component error with request context
    fn fail(&mut self, err: EngineError) -> EngineError {
        self.advance(OperationState::Failed);
        err.in_operation(self.operation, &self.device_id)
    }
}

/// The predictive maintenance engine's public surface
///
/// Read operations (`predict_maintenance_needs`, `detect_anomalies`,
/// `calculate_health_score`) are pure pipelines over immutable snapshots and
/// may run concurrently for any device. `train_model` is the sole writer of
/// model parameters, serialized per category by the parameter store.
pub struct MaintenanceEngine {
    telemetry: Arc<dyn TelemetryStore>,
    directory: Arc<dyn DeviceDirectory>,
    alert_sink: Option<Arc<dyn AlertSink>>,
    config: EngineConfig,
    extractor: FeatureExtractor,
    detector: AnomalyDetector,
    predictor: FailurePredictor,
    scorer: HealthScorer,
    trainer: ModelTrainer,
    metrics: EngineMetrics,
}

impl MaintenanceEngine {
    pub fn new(
        telemetry: Arc<dyn TelemetryStore>,
        directory: Arc<dyn DeviceDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self::with_parameter_store(telemetry, directory, config, Arc::new(ParameterStore::with_defaults()))
    }

    /// Build against an explicit parameter store (e.g. a strict one)
    pub fn with_parameter_store(
        telemetry: Arc<dyn TelemetryStore>,
        directory: Arc<dyn DeviceDirectory>,
        config: EngineConfig,
        store: Arc<ParameterStore>,
    ) -> Self {
        let detector = AnomalyDetector::new(config.anomaly_threshold_sigma)
            .with_confidence_k(config.anomaly_confidence_k)
            .with_min_window_size(config.min_window_size);
        let predictor = FailurePredictor::new(Arc::clone(&store))
            .with_actionable_probability(config.actionable_probability)
            .with_min_feedback_samples(config.min_feedback_samples);
        let scorer = HealthScorer::new(config.nominal_temperature_max, config.nominal_vibration_max);
        let trainer = ModelTrainer::new(store)
            .with_learning_rate(config.learning_rate)
            .with_max_bias(config.max_bias);

        Self {
            telemetry,
            directory,
            alert_sink: None,
            config,
            extractor: FeatureExtractor::new(),
            detector,
            predictor,
            scorer,
            trainer,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    /// Predict maintenance needs for a device over the configured lookback
    pub async fn predict_maintenance_needs(
        &self,
        device_id: &str,
    ) -> Result<MaintenancePrediction, EngineError> {
        let started = Instant::now();
        let mut tracker = OperationTracker::start("predict_maintenance_needs", device_id);

        let result = self.run_prediction(device_id, &mut tracker).await;
        match &result {
            Ok(prediction) => {
                self.metrics.record_prediction(started.elapsed().as_secs_f64());
                info!(
                    device_id = %device_id,
                    failure_probability = prediction.failure_probability,
                    confidence = prediction.confidence,
                    duration_us = started.elapsed().as_micros() as u64,
                    "Prediction completed"
                );
            }
            Err(err) => {
                self.metrics
                    .record_operation_error("predict_maintenance_needs", err.code());
            }
        }
        result
    }

    async fn run_prediction(
        &self,
        device_id: &str,
        tracker: &mut OperationTracker,
    ) -> Result<MaintenancePrediction, EngineError> {
        tracker.advance(OperationState::Fetching);
        let info = self
            .directory
            .device_info(device_id)
            .await
            .map_err(|e| tracker.fail(e))?;
        let samples = self
            .fetch_window(device_id, self.config.lookback())
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Extracting);
        let mut features = self
            .extractor
            .extract(&samples, 0.0)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Detecting);
        let detection = self
            .detect_window(device_id, &samples)
            .map_err(|e| tracker.fail(e))?;
        features.anomaly_score = anomaly_score_of(&detection);

        tracker.advance(OperationState::Predicting);
        let prediction = self
            .predictor
            .predict(device_id, &info.name, &info.category, &features)
            .map_err(|e| tracker.fail(e))?;

        if prediction.failure_probability >= self.config.actionable_probability {
            self.emit_alert(&prediction).await;
        }

        tracker.advance(OperationState::Done);
        Ok(prediction)
    }

    /// Detect anomalies in the device's monitored series over `lookback`
    pub async fn detect_anomalies(
        &self,
        device_id: &str,
        lookback: Duration,
    ) -> Result<AnomalyDetectionResult, EngineError> {
        let started = Instant::now();
        let mut tracker = OperationTracker::start("detect_anomalies", device_id);

        let result = self.run_detection(device_id, lookback, &mut tracker).await;
        match &result {
            Ok(detection) => {
                self.metrics.record_anomaly_run(detection.anomaly_count);
                info!(
                    device_id = %device_id,
                    anomaly_count = detection.anomaly_count,
                    confidence = detection.confidence,
                    duration_us = started.elapsed().as_micros() as u64,
                    "Anomaly detection completed"
                );
            }
            Err(err) => {
                self.metrics
                    .record_operation_error("detect_anomalies", err.code());
            }
        }
        result
    }

    async fn run_detection(
        &self,
        device_id: &str,
        lookback: Duration,
        tracker: &mut OperationTracker,
    ) -> Result<AnomalyDetectionResult, EngineError> {
        tracker.advance(OperationState::Fetching);
        let samples = self
            .fetch_window(device_id, lookback)
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Detecting);
        let result = self
            .detect_window(device_id, &samples)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Done);
        Ok(result)
    }

    /// Calculate the bounded 0-100 health score for a device
    pub async fn calculate_health_score(
        &self,
        device_id: &str,
    ) -> Result<HealthScoreResult, EngineError> {
        let started = Instant::now();
        let mut tracker = OperationTracker::start("calculate_health_score", device_id);

        let result = self.run_health_score(device_id, &mut tracker).await;
        match &result {
            Ok(score) => {
                self.metrics.record_health_score();
                info!(
                    device_id = %device_id,
                    health_score = score.health_score,
                    duration_us = started.elapsed().as_micros() as u64,
                    "Health score completed"
                );
            }
            Err(err) => {
                self.metrics
                    .record_operation_error("calculate_health_score", err.code());
            }
        }
        result
    }

    async fn run_health_score(
        &self,
        device_id: &str,
        tracker: &mut OperationTracker,
    ) -> Result<HealthScoreResult, EngineError> {
        tracker.advance(OperationState::Fetching);
        let info = self
            .directory
            .device_info(device_id)
            .await
            .map_err(|e| tracker.fail(e))?;
        let samples = self
            .fetch_window(device_id, self.config.lookback())
            .await
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Extracting);
        let mut features = self
            .extractor
            .extract(&samples, 0.0)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Detecting);
        let detection = self
            .detect_window(device_id, &samples)
            .map_err(|e| tracker.fail(e))?;
        features.anomaly_score = anomaly_score_of(&detection);

        tracker.advance(OperationState::Predicting);
        let prediction = self
            .predictor
            .predict(device_id, &info.name, &info.category, &features)
            .map_err(|e| tracker.fail(e))?;

        tracker.advance(OperationState::Scoring);
        let result = self
            .scorer
            .result(device_id, &features, prediction.failure_probability);

        tracker.advance(OperationState::Done);
        Ok(result)
    }

    /// Train the category's model on a feedback batch (fire-and-confirm)
    pub async fn train_model(
        &self,
        device_category: &str,
        feedback: &[MaintenanceFeedback],
    ) -> Result<(), EngineError> {
        let started = Instant::now();
        let mut tracker = OperationTracker::start("train_model", device_category);

        match self.trainer.train(device_category, feedback) {
            Ok(()) => {
                if !feedback.is_empty() {
                    self.metrics.record_training_run();
                }
                tracker.advance(OperationState::Done);
                info!(
                    device_category = %device_category,
                    batch_size = feedback.len(),
                    duration_us = started.elapsed().as_micros() as u64,
                    "Training completed"
                );
                Ok(())
            }
            Err(err) => {
                let err = tracker.fail(err);
                self.metrics.record_operation_error("train_model", err.code());
                Err(err)
            }
        }
    }

    /// Fetch and normalize a telemetry window ending now
    ///
    /// The fetch runs under the configured timeout; a timeout is retried once
    /// after a backoff, then surfaced as `DataUnavailable`. Store errors
    /// (e.g. unknown device) are never retried.
    async fn fetch_window(
        &self,
        device_id: &str,
        lookback: Duration,
    ) -> Result<Vec<TelemetrySample>, EngineError> {
        let to = Utc::now().timestamp();
        let from = to - lookback.as_secs() as i64;

        let mut attempt = 0;
        let samples = loop {
            attempt += 1;
            let fetch = self.telemetry.fetch_historical_samples(device_id, from, to);
            match tokio::time::timeout(self.config.fetch_timeout(), fetch).await {
                Ok(result) => break result?,
                Err(_) if attempt == 1 => {
                    warn!(
                        device_id = %device_id,
                        timeout_ms = self.config.fetch_timeout_ms,
                        "Telemetry fetch timed out, retrying once"
                    );
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
                Err(_) => {
                    return Err(EngineError::DataUnavailable {
                        device_id: device_id.to_string(),
                        reason: format!(
                            "telemetry store timed out after {} ms (retried once)",
                            self.config.fetch_timeout_ms
                        ),
                    });
                }
            }
        };

        Ok(normalize_window(device_id, samples))
    }

    /// Run detection over the monitored metric series of a window
    ///
    /// Power and temperature are analyzed independently (the detector
    /// contract is single-series) and the flagged points merged into one
    /// result; per-index the higher-scoring metric wins.
    fn detect_window(
        &self,
        device_id: &str,
        samples: &[TelemetrySample],
    ) -> Result<AnomalyDetectionResult, EngineError> {
        let power: Vec<(i64, f64)> = samples
            .iter()
            .map(|s| (s.timestamp, s.power_consumption))
            .collect();
        let temperature: Vec<(i64, f64)> = samples
            .iter()
            .map(|s| (s.timestamp, s.temperature))
            .collect();

        let power_result = self.detector.detect(device_id, &power)?;
        let temperature_result = self.detector.detect(device_id, &temperature)?;
        Ok(merge_detections(device_id, power_result, temperature_result))
    }

    /// Best-effort alert emission; a sink failure never fails the prediction
    async fn emit_alert(&self, prediction: &MaintenancePrediction) {
        let Some(sink) = &self.alert_sink else {
            return;
        };
        let event = AlertEvent::predictive_maintenance(
            &prediction.device_id,
            &prediction.device_name,
            prediction.failure_probability,
        );
        if let Err(err) = sink.dispatch(event).await {
            warn!(
                device_id = %prediction.device_id,
                error = %err,
                "Alert dispatch failed, continuing"
            );
        }
    }
}

/// Anomaly score carried into the feature vector: the detection confidence
/// when anomalies were flagged, zero for a clean series (where confidence
/// means certainty of "no anomaly")
fn anomaly_score_of(detection: &AnomalyDetectionResult) -> f64 {
    if detection.has_anomalies {
        detection.confidence
    } else {
        0.0
    }
}

/// Merge two per-metric detection results over the same sample window
///
/// Points are deduplicated by index keeping the higher score; the combined
/// confidence treats each flagging metric as independent evidence.
fn merge_detections(
    device_id: &str,
    a: AnomalyDetectionResult,
    b: AnomalyDetectionResult,
) -> AnomalyDetectionResult {
    use std::collections::btree_map::Entry;

    let ca = if a.has_anomalies { a.confidence } else { 0.0 };
    let cb = if b.has_anomalies { b.confidence } else { 0.0 };
    let latest_run = a.detection_timestamp.max(b.detection_timestamp);

    let mut by_index: std::collections::BTreeMap<usize, crate::models::AnomalyPoint> =
        std::collections::BTreeMap::new();
    for point in a.anomalies.into_iter().chain(b.anomalies) {
        match by_index.entry(point.index) {
            Entry::Occupied(mut existing) => {
                if point.score > existing.get().score {
                    existing.insert(point);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(point);
            }
        }
    }
    let anomalies: Vec<crate::models::AnomalyPoint> = by_index.into_values().collect();

    let confidence = if anomalies.is_empty() {
        1.0
    } else {
        (1.0 - (1.0 - ca) * (1.0 - cb)).clamp(0.0, 1.0)
    };

    AnomalyDetectionResult {
        device_id: device_id.to_string(),
        has_anomalies: !anomalies.is_empty(),
        anomaly_count: anomalies.len(),
        anomalies,
        confidence,
        detection_timestamp: latest_run,
    }
}
