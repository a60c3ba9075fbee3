//! Device health scoring
//!
//! Deterministic 0-100 score: baseline 100 with weighted penalties for
//! failure probability (dominant), anomaly history, and out-of-nominal
//! operating averages. Monotonically non-increasing in failure probability.

use crate::models::{HealthScoreResult, MaintenanceFeatureVector};

/// Penalty weight for failure probability (dominant term)
const FAILURE_PENALTY: f64 = 55.0;

/// Penalty weight for the aggregate anomaly score
const ANOMALY_PENALTY: f64 = 20.0;

/// Maximum penalty for temperature beyond the nominal bound
const TEMPERATURE_PENALTY: f64 = 15.0;

/// Maximum penalty for vibration beyond the nominal bound
const VIBRATION_PENALTY: f64 = 10.0;

/// Maps failure probability and operating conditions to a bounded score
#[derive(Debug, Clone)]
pub struct HealthScorer {
    /// Upper nominal temperature in degrees Celsius
    pub nominal_temperature_max: f64,
    /// Upper nominal vibration in mm/s RMS
    pub nominal_vibration_max: f64,
}

impl HealthScorer {
    pub fn new(nominal_temperature_max: f64, nominal_vibration_max: f64) -> Self {
        Self {
            nominal_temperature_max,
            nominal_vibration_max,
        }
    }

    /// Score a device; pure function of its inputs
    pub fn score(&self, features: &MaintenanceFeatureVector, failure_probability: f64) -> u8 {
        let p = failure_probability.clamp(0.0, 1.0);
        let anomaly = features.anomaly_score.clamp(0.0, 1.0);

        // Fractional overshoot beyond nominal, saturating at 100% over
        let temp_excess = ((features.average_temperature - self.nominal_temperature_max)
            / self.nominal_temperature_max)
            .clamp(0.0, 1.0);
        let vib_excess = ((features.average_vibration - self.nominal_vibration_max)
            / self.nominal_vibration_max)
            .clamp(0.0, 1.0);

        let penalty = FAILURE_PENALTY * p
            + ANOMALY_PENALTY * anomaly
            + TEMPERATURE_PENALTY * temp_excess
            + VIBRATION_PENALTY * vib_excess;

        (100.0 - penalty).round().clamp(0.0, 100.0) as u8
    }

    pub fn result(
        &self,
        device_id: &str,
        features: &MaintenanceFeatureVector,
        failure_probability: f64,
    ) -> HealthScoreResult {
        HealthScoreResult {
            device_id: device_id.to_string(),
            health_score: self.score(features, failure_probability),
        }
    }
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new(45.0, 2.8)
    }
}
