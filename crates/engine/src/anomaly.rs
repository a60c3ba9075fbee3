//! Statistical anomaly detection over device telemetry series
//!
//! Window policy: each point is scored against the mean and Bessel-corrected
//! standard deviation of a trailing window of preceding points (never against
//! statistics that include the point itself), so both isolated spikes and
//! sustained step changes surface at the moment they begin. The first
//! `min_window_size` points seed the statistics and are not scored.

use crate::error::EngineError;
use crate::models::{AnomalyDetectionResult, AnomalyPoint, AnomalySeverity};
use chrono::Utc;
use std::collections::VecDeque;
use tracing::debug;

/// Minimum points required for meaningful statistics
pub const MIN_WINDOW_SIZE: usize = 10;

/// Default trailing window length in points
pub const DEFAULT_TRAILING_WINDOW: usize = 60;

/// Guard against division by a vanishing standard deviation
const STD_DEV_EPSILON: f64 = 1e-9;

/// Detects statistically deviant points in a single-value time series
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Standard deviations above which a point is anomalous
    pub threshold_sigma: f64,
    /// Steepness of the confidence curve
    pub confidence_k: f64,
    /// Minimum series length accepted; also the seed length before scoring
    pub min_window_size: usize,
    /// Trailing window length the statistics roll over
    pub trailing_window: usize,
}

impl AnomalyDetector {
    pub fn new(threshold_sigma: f64) -> Self {
        Self {
            threshold_sigma,
            confidence_k: 2.0,
            min_window_size: MIN_WINDOW_SIZE,
            trailing_window: DEFAULT_TRAILING_WINDOW,
        }
    }

    pub fn with_confidence_k(mut self, k: f64) -> Self {
        self.confidence_k = k;
        self
    }

    pub fn with_min_window_size(mut self, size: usize) -> Self {
        self.min_window_size = size;
        self
    }

    pub fn with_trailing_window(mut self, size: usize) -> Self {
        self.trailing_window = size.max(2);
        self
    }

    /// Detect anomalies in an ordered `(timestamp, value)` series
    ///
    /// Deterministic: identical input yields identical results apart from
    /// `detection_timestamp`.
    pub fn detect(
        &self,
        device_id: &str,
        series: &[(i64, f64)],
    ) -> Result<AnomalyDetectionResult, EngineError> {
        if series.len() < self.min_window_size {
            return Err(EngineError::InsufficientData {
                got: series.len(),
                needed: self.min_window_size,
            });
        }

        let mut window: VecDeque<f64> = VecDeque::with_capacity(self.trailing_window);
        let mut anomalies = Vec::new();
        let mut total_excess = 0.0;

        for (index, (timestamp, value)) in series.iter().enumerate() {
            if window.len() >= self.min_window_size {
                let (mean, std_dev) = window_stats(&window);
                let score = (value - mean).abs() / std_dev.max(STD_DEV_EPSILON);
                if score > self.threshold_sigma {
                    total_excess += score - self.threshold_sigma;
                    anomalies.push(AnomalyPoint {
                        index,
                        value: *value,
                        timestamp: *timestamp,
                        score,
                        severity: self.severity(score),
                    });
                }
            }

            window.push_back(*value);
            if window.len() > self.trailing_window {
                window.pop_front();
            }
        }

        let confidence = if anomalies.is_empty() {
            // Maximal certainty of "no anomaly"
            1.0
        } else {
            let n = series.len() as f64;
            (1.0 - (-self.confidence_k * total_excess / n).exp()).clamp(0.0, 1.0)
        };

        debug!(
            device_id = %device_id,
            series_len = series.len(),
            anomaly_count = anomalies.len(),
            confidence,
            "Anomaly detection completed"
        );

        Ok(AnomalyDetectionResult {
            device_id: device_id.to_string(),
            has_anomalies: !anomalies.is_empty(),
            anomaly_count: anomalies.len(),
            anomalies,
            confidence,
            detection_timestamp: Utc::now().timestamp(),
        })
    }

    fn severity(&self, score: f64) -> AnomalySeverity {
        if score >= self.threshold_sigma + 2.0 {
            AnomalySeverity::Critical
        } else if score >= self.threshold_sigma + 1.0 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Warning
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(3.0) // 3 sigma
    }
}

/// Mean and sample standard deviation of the trailing window
fn window_stats(window: &VecDeque<f64>) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    if window.len() < 2 {
        return (mean, 0.0);
    }
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}
