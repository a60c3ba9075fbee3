//! Model training from ground-truth feedback
//!
//! Feedback pairs a previously reported probability with the observed outcome,
//! so training recalibrates the category's logistic bias toward the outcomes.
//! Updates are bounded: a bounded learning rate, a per-batch step clamp, and a
//! divergence guard that aborts and keeps the previous snapshot live.

use crate::error::EngineError;
use crate::models::MaintenanceFeedback;
use crate::predictor::params::{ModelParameters, ParameterStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Largest bias movement a single batch may apply
const MAX_STEP_PER_BATCH: f64 = 1.0;

/// Recalibrates per-category model parameters from feedback batches
pub struct ModelTrainer {
    store: Arc<ParameterStore>,
    /// Bounded learning rate for bias recalibration
    pub learning_rate: f64,
    /// Absolute bias bound; an update beyond it aborts as divergence
    pub max_bias: f64,
}

impl ModelTrainer {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            learning_rate: 0.5,
            max_bias: 6.0,
        }
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    pub fn with_max_bias(mut self, bound: f64) -> Self {
        self.max_bias = bound;
        self
    }

    /// Train the category's parameters on a feedback batch
    ///
    /// An empty batch is a warned no-op. Predictions issued while this runs
    /// observe either the previous or the new snapshot, never a torn state.
    pub fn train(
        &self,
        category: &str,
        feedback: &[MaintenanceFeedback],
    ) -> Result<(), EngineError> {
        if feedback.is_empty() {
            warn!(category = %category, "Empty feedback batch, skipping training");
            return Ok(());
        }

        // Mean calibration error over the batch: positive when the model
        // under-predicted failures, negative when it over-predicted.
        let mean_error: f64 = feedback
            .iter()
            .map(|f| {
                let actual = if f.actual_outcome { 1.0 } else { 0.0 };
                actual - f.predicted_failure_probability.clamp(0.0, 1.0)
            })
            .sum::<f64>()
            / feedback.len() as f64;

        let step = (self.learning_rate * mean_error).clamp(-MAX_STEP_PER_BATCH, MAX_STEP_PER_BATCH);

        let current = self
            .store
            .snapshot(category)
            .ok_or_else(|| EngineError::UnknownDeviceCategory {
                category: category.to_string(),
            })?;
        let candidate_bias = current.bias + step;

        if candidate_bias.abs() > self.max_bias {
            warn!(
                category = %category,
                bias = candidate_bias,
                bound = self.max_bias,
                "Training aborted, bias outside sane bounds"
            );
            return Err(EngineError::TrainingDivergence {
                category: category.to_string(),
                bias: candidate_bias,
                bound: self.max_bias,
            });
        }

        let updated = self.store.update(category, |params| ModelParameters {
            bias: (params.bias + step).clamp(-self.max_bias, self.max_bias),
            feedback_count: params.feedback_count + feedback.len() as u64,
            version: params.version + 1,
            trained_at: Utc::now().timestamp(),
            weights: params.weights,
        });

        info!(
            category = %category,
            batch_size = feedback.len(),
            mean_error,
            step,
            bias = updated.bias,
            version = updated.version,
            "Training run completed"
        );

        Ok(())
    }
}
