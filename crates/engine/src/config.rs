//! Engine configuration

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Top-level engine configuration
///
/// Every field has a sensible default so the engine runs unconfigured;
/// overrides come from the environment with an `ENGINE_` prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Minimum points required for anomaly detection
    #[serde(default = "default_min_window_size")]
    pub min_window_size: usize,

    /// Standard deviations above which a point is anomalous
    #[serde(default = "default_anomaly_threshold_sigma")]
    pub anomaly_threshold_sigma: f64,

    /// Steepness of the anomaly confidence curve
    #[serde(default = "default_anomaly_confidence_k")]
    pub anomaly_confidence_k: f64,

    /// Failure probability above which predictions become actionable
    #[serde(default = "default_actionable_probability")]
    pub actionable_probability: f64,

    /// Telemetry fetch timeout in milliseconds
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Backoff before the single telemetry retry, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Bounded learning rate for bias recalibration
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Absolute bias bound; updates beyond it abort as divergence
    #[serde(default = "default_max_bias")]
    pub max_bias: f64,

    /// Feedback count at which predictor confidence reaches 0.5
    #[serde(default = "default_min_feedback_samples")]
    pub min_feedback_samples: u64,

    /// Upper nominal temperature in degrees Celsius for health scoring
    #[serde(default = "default_nominal_temperature_max")]
    pub nominal_temperature_max: f64,

    /// Upper nominal vibration in mm/s RMS for health scoring
    #[serde(default = "default_nominal_vibration_max")]
    pub nominal_vibration_max: f64,

    /// Telemetry lookback for prediction and health scoring, in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,
}

fn default_min_window_size() -> usize {
    10
}

fn default_anomaly_threshold_sigma() -> f64 {
    3.0
}

fn default_anomaly_confidence_k() -> f64 {
    2.0
}

fn default_actionable_probability() -> f64 {
    0.3
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_max_bias() -> f64 {
    6.0
}

fn default_min_feedback_samples() -> u64 {
    10
}

fn default_nominal_temperature_max() -> f64 {
    45.0
}

fn default_nominal_vibration_max() -> f64 {
    2.8
}

fn default_lookback_days() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_window_size: default_min_window_size(),
            anomaly_threshold_sigma: default_anomaly_threshold_sigma(),
            anomaly_confidence_k: default_anomaly_confidence_k(),
            actionable_probability: default_actionable_probability(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            learning_rate: default_learning_rate(),
            max_bias: default_max_bias(),
            min_feedback_samples: default_min_feedback_samples(),
            nominal_temperature_max: default_nominal_temperature_max(),
            nominal_vibration_max: default_nominal_vibration_max(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment (`ENGINE_` prefix)
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ENGINE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_days * 24 * 60 * 60)
    }
}
