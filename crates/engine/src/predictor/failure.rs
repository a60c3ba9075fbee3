//! Failure probability prediction
//!
//! Interpretable logistic model over normalized features:
//! `p = sigmoid(bias + Σ wᵢ·xᵢ)`. Per-feature contributions are kept explicit
//! so feature importance and recommendations fall out of the same pass.

use crate::error::EngineError;
use crate::models::{MaintenanceFeatureVector, MaintenancePrediction};
use crate::predictor::params::{ModelParameters, ParameterStore, FEATURE_NAMES};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const SECONDS_PER_DAY: i64 = 86_400;

/// Projection horizon in days when failure probability is barely actionable
const PROJECTION_HORIZON_DAYS: f64 = 90.0;

/// Contributions below this importance share do not drive recommendations
const RECOMMENDATION_IMPORTANCE_FLOOR: f64 = 0.10;

/// Maximum number of recommended actions per prediction
const MAX_RECOMMENDATIONS: usize = 3;

/// Predicts device failure probability from a feature vector
pub struct FailurePredictor {
    store: Arc<ParameterStore>,
    /// Failure probability above which predictions become actionable
    pub actionable_probability: f64,
    /// Feedback count at which confidence reaches 0.5
    pub min_feedback_samples: u64,
}

impl FailurePredictor {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            actionable_probability: 0.3,
            min_feedback_samples: 10,
        }
    }

    pub fn with_actionable_probability(mut self, threshold: f64) -> Self {
        self.actionable_probability = threshold;
        self
    }

    pub fn with_min_feedback_samples(mut self, count: u64) -> Self {
        self.min_feedback_samples = count;
        self
    }

    /// Predict failure probability, confidence, importance and actions
    pub fn predict(
        &self,
        device_id: &str,
        device_name: &str,
        device_type: &str,
        features: &MaintenanceFeatureVector,
    ) -> Result<MaintenancePrediction, EngineError> {
        let params = self.store.snapshot(device_type).ok_or_else(|| {
            EngineError::UnknownDeviceCategory {
                category: device_type.to_string(),
            }
        })?;

        let inputs = normalize_features(features);
        let contributions: Vec<f64> = inputs
            .iter()
            .zip(params.weights.iter())
            .map(|(x, w)| x * w)
            .collect();
        let score: f64 = params.bias + contributions.iter().sum::<f64>();
        let failure_probability = sigmoid(score).clamp(0.0, 1.0);

        let feature_importance = importance_map(&contributions);
        let confidence = self.confidence(&params);

        let predicted_failure_date = if failure_probability >= self.actionable_probability {
            Some(self.project_failure_date(failure_probability, features))
        } else {
            None
        };

        let recommended_actions =
            self.recommend(failure_probability, &feature_importance);

        debug!(
            device_id = %device_id,
            device_type = %device_type,
            failure_probability,
            confidence,
            model_version = params.version,
            "Failure prediction computed"
        );

        Ok(MaintenancePrediction {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            device_type: device_type.to_string(),
            failure_probability,
            predicted_failure_date,
            confidence,
            recommended_actions,
            feature_importance,
            last_updated: Utc::now().timestamp(),
        })
    }

    /// Confidence from accumulated feedback: asymptotic in the sample count,
    /// below 0.5 until `min_feedback_samples` is reached
    fn confidence(&self, params: &ModelParameters) -> f64 {
        let n = params.feedback_count as f64;
        let floor = self.min_feedback_samples as f64;
        (n / (n + floor.max(1.0))).clamp(0.0, 1.0)
    }

    /// Project the dominant trend forward to an estimated failure date
    ///
    /// Horizon shrinks with probability and with a steeper positive trend;
    /// clamped to [1, 365] days from now.
    fn project_failure_date(&self, probability: f64, features: &MaintenanceFeatureVector) -> i64 {
        let dominant_trend = features
            .power_trend
            .max(features.temperature_trend)
            .max(0.0);
        let days = ((1.0 - probability) * PROJECTION_HORIZON_DAYS)
            / (1.0 + 10.0 * dominant_trend);
        let days = days.clamp(1.0, 365.0);
        Utc::now().timestamp() + (days * SECONDS_PER_DAY as f64) as i64
    }

    /// Rank recommendations from the dominant importance entries
    fn recommend(&self, probability: f64, importance: &HashMap<String, f64>) -> Vec<String> {
        if probability < self.actionable_probability {
            return vec![
                "Device is operating within normal parameters; no action required".to_string(),
            ];
        }

        let mut ranked: Vec<(&str, f64)> = importance
            .iter()
            .map(|(name, weight)| (name.as_str(), *weight))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut actions: Vec<String> = Vec::new();
        for (name, weight) in &ranked {
            if *weight < RECOMMENDATION_IMPORTANCE_FLOOR || actions.len() >= MAX_RECOMMENDATIONS {
                break;
            }
            if let Some(action) = action_for_feature(name) {
                if !actions.contains(&action) {
                    actions.push(action);
                }
            }
        }

        if actions.is_empty() {
            actions.push("Schedule a diagnostic inspection".to_string());
        }
        actions
    }
}

/// Map feature vector fields onto the model's normalized 0-1 inputs
///
/// Normalization bounds reflect typical residential equipment ranges; values
/// beyond them saturate rather than extrapolate.
fn normalize_features(f: &MaintenanceFeatureVector) -> [f64; 11] {
    let power_cv = if f.average_power_consumption.abs() > f64::EPSILON {
        f.power_consumption_std_dev / f.average_power_consumption
    } else {
        0.0
    };
    [
        (f.average_power_consumption / 1_000.0).clamp(0.0, 1.0),
        power_cv.clamp(0.0, 1.0),
        (f.average_voltage / 400.0).clamp(0.0, 1.0),
        (f.average_current / 32.0).clamp(0.0, 1.0),
        (f.average_temperature / 100.0).clamp(0.0, 1.0),
        (f.average_vibration / 10.0).clamp(0.0, 1.0),
        (f.operating_hours / 50_000.0).clamp(0.0, 1.0),
        (f.power_trend.max(0.0) * 100.0).clamp(0.0, 1.0),
        (f.temperature_trend.max(0.0) * 100.0).clamp(0.0, 1.0),
        (f.days_since_last_maintenance / 365.0).clamp(0.0, 1.0),
        f.anomaly_score.clamp(0.0, 1.0),
    ]
}

/// Absolute contributions normalized to sum 1; empty when nothing contributes
fn importance_map(contributions: &[f64]) -> HashMap<String, f64> {
    let total: f64 = contributions.iter().map(|c| c.abs()).sum();
    if total < f64::EPSILON {
        return HashMap::new();
    }
    FEATURE_NAMES
        .iter()
        .zip(contributions.iter())
        .filter(|(_, c)| c.abs() > 0.0)
        .map(|(name, c)| (name.to_string(), c.abs() / total))
        .collect()
}

fn action_for_feature(name: &str) -> Option<String> {
    let action = match name {
        "average_temperature" | "temperature_trend" => "Inspect cooling and ventilation",
        "average_vibration" => "Check mechanical mounting and moving parts",
        "power_consumption_std_dev" | "power_trend" | "average_power_consumption" => {
            "Inspect power supply and wiring"
        }
        "average_voltage" | "average_current" => "Verify electrical connections and load",
        "operating_hours" | "days_since_last_maintenance" => "Schedule routine maintenance",
        "anomaly_score" => "Review recent telemetry anomalies",
        _ => return None,
    };
    Some(action.to_string())
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
