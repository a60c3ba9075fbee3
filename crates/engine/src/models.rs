//! Core data models for the maintenance engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One historical telemetry reading for a device
///
/// Produced by the telemetry store collaborator. Samples within a window are
/// ordered ascending by timestamp and immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    /// Instantaneous power draw in watts
    pub power_consumption: f64,
    pub voltage: f64,
    pub current: f64,
    pub power_factor: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Vibration magnitude in mm/s RMS
    pub vibration: f64,
    /// Cumulative operating hours at sample time
    pub operating_hours: f64,
    /// True when maintenance was performed at this sample
    pub maintenance_flag: bool,
}

/// Device metadata from the device directory collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    /// Device category, e.g. "hvac", "solar_inverter", "battery"
    pub category: String,
}

/// Fixed-shape feature vector derived from one telemetry window
///
/// Stateless and recomputed per request; never the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceFeatureVector {
    pub average_power_consumption: f64,
    pub power_consumption_std_dev: f64,
    pub average_voltage: f64,
    pub average_current: f64,
    pub average_temperature: f64,
    pub average_vibration: f64,
    pub operating_hours: f64,
    /// OLS slope of power against sample index, normalized by the mean
    pub power_trend: f64,
    /// OLS slope of temperature against sample index, normalized by the mean
    pub temperature_trend: f64,
    pub days_since_last_maintenance: f64,
    /// Aggregate anomaly confidence carried over from detection
    pub anomaly_score: f64,
}

/// A single statistically deviant point within an analyzed series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPoint {
    /// 0-based position within the analyzed series
    pub index: usize,
    pub value: f64,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    /// Deviation magnitude in standard deviations (unbounded, non-negative)
    pub score: f64,
    pub severity: AnomalySeverity,
}

/// Severity ladder for flagged points, derived from the deviation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Warning,
    High,
    Critical,
}

/// Result of one anomaly detection run over a device series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetectionResult {
    pub device_id: String,
    pub has_anomalies: bool,
    pub anomaly_count: usize,
    /// Flagged points in chronological order
    pub anomalies: Vec<AnomalyPoint>,
    /// 0.0-1.0; exactly 1.0 when nothing is flagged
    pub confidence: f64,
    /// Unix timestamp (seconds) of the detection run
    pub detection_timestamp: i64,
}

/// Failure prediction for a single device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenancePrediction {
    pub device_id: String,
    pub device_name: String,
    pub device_type: String,
    /// 0.0-1.0
    pub failure_probability: f64,
    /// Unix timestamp (seconds); present only above the actionable threshold
    pub predicted_failure_date: Option<i64>,
    /// 0.0-1.0, grows with accumulated feedback for the category
    pub confidence: f64,
    /// Ranked, never empty
    pub recommended_actions: Vec<String>,
    /// Feature name -> relative contribution; sums to ~1 when non-empty
    pub feature_importance: HashMap<String, f64>,
    /// Unix timestamp (seconds)
    pub last_updated: i64,
}

/// Bounded 0-100 device health summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScoreResult {
    pub device_id: String,
    /// 0-100, 100 = perfect health
    pub health_score: u8,
}

/// Kind of ground-truth feedback supplied after an outcome is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    ConfirmedFailure,
    FalseAlarm,
    RoutineInspection,
}

/// One (prediction, observed outcome) pair used to recalibrate the predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceFeedback {
    pub feedback_type: FeedbackType,
    /// Probability the engine reported before the outcome was known
    pub predicted_failure_probability: f64,
    /// True when the device actually failed
    pub actual_outcome: bool,
    pub notes: Option<String>,
}

impl AnomalyDetectionResult {
    /// Check the structural invariants the contract guarantees
    pub fn is_consistent(&self) -> bool {
        self.has_anomalies == (self.anomaly_count > 0)
            && self.anomaly_count == self.anomalies.len()
            && (0.0..=1.0).contains(&self.confidence)
    }
}
