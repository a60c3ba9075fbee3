//! Versioned per-category model parameters
//!
//! Parameters are the only long-lived mutable state in the engine. They live
//! behind copy-on-write `Arc` snapshots in a concurrent map: readers clone the
//! `Arc` and see one atomic snapshot, writers build a new snapshot and swap it
//! through the map entry API, which serializes writers per category.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// Feature names in the order the model weighs them
pub const FEATURE_NAMES: [&str; 11] = [
    "average_power_consumption",
    "power_consumption_std_dev",
    "average_voltage",
    "average_current",
    "average_temperature",
    "average_vibration",
    "operating_hours",
    "power_trend",
    "temperature_trend",
    "days_since_last_maintenance",
    "anomaly_score",
];

/// One immutable parameter snapshot for a device category
#[derive(Debug, Clone)]
pub struct ModelParameters {
    /// Per-feature weights, indexed like [`FEATURE_NAMES`]
    pub weights: [f64; 11],
    /// Logistic intercept; the trainer's recalibration target
    pub bias: f64,
    /// Total feedback samples this snapshot was calibrated on
    pub feedback_count: u64,
    /// Monotonically increasing per category
    pub version: u64,
    /// Unix timestamp (seconds) of the last training run
    pub trained_at: i64,
}

impl ModelParameters {
    /// Conservative seeded weights for an untrained category
    ///
    /// Emphasis follows failure relevance for powered equipment: anomaly
    /// history and thermal/vibration behavior dominate, electrical averages
    /// contribute weakly.
    pub fn seeded() -> Self {
        Self {
            weights: [
                0.05, // average_power_consumption
                0.30, // power_consumption_std_dev
                0.05, // average_voltage
                0.05, // average_current
                0.45, // average_temperature
                0.55, // average_vibration
                0.20, // operating_hours
                0.60, // power_trend
                0.80, // temperature_trend
                0.35, // days_since_last_maintenance
                1.20, // anomaly_score
            ],
            bias: -3.0,
            feedback_count: 0,
            version: 1,
            trained_at: Utc::now().timestamp(),
        }
    }
}

/// Concurrent store of per-category parameter snapshots
pub struct ParameterStore {
    categories: DashMap<String, Arc<ModelParameters>>,
    /// Fallback snapshot for categories with no trained parameters
    default_parameters: Option<Arc<ModelParameters>>,
}

impl ParameterStore {
    /// Store with a seeded default, so unseen categories still predict
    /// (at low confidence)
    pub fn with_defaults() -> Self {
        Self {
            categories: DashMap::new(),
            default_parameters: Some(Arc::new(ModelParameters::seeded())),
        }
    }

    /// Strict store: unseen categories fail with an unknown-category error
    pub fn strict() -> Self {
        Self {
            categories: DashMap::new(),
            default_parameters: None,
        }
    }

    /// Current snapshot for a category, falling back to the default set
    pub fn snapshot(&self, category: &str) -> Option<Arc<ModelParameters>> {
        self.categories
            .get(category)
            .map(|entry| Arc::clone(entry.value()))
            .or_else(|| self.default_parameters.clone())
    }

    /// True when the category itself has trained parameters
    pub fn has_trained(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Atomically replace a category's snapshot via a read-modify-write
    ///
    /// The closure receives the current snapshot (or the default/seeded set)
    /// and returns the replacement. The shard write lock held by the entry API
    /// serializes concurrent updaters for the category.
    pub fn update<F>(&self, category: &str, f: F) -> Arc<ModelParameters>
    where
        F: FnOnce(&ModelParameters) -> ModelParameters,
    {
        let mut entry = self
            .categories
            .entry(category.to_string())
            .or_insert_with(|| {
                self.default_parameters
                    .clone()
                    .unwrap_or_else(|| Arc::new(ModelParameters::seeded()))
            });
        let next = Arc::new(f(entry.value()));
        *entry.value_mut() = Arc::clone(&next);
        next
    }

    /// Number of categories with trained parameters
    pub fn trained_categories(&self) -> usize {
        self.categories.len()
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
