//! Engine error taxonomy
//!
//! Every failure is scoped to a single request; nothing here is fatal to the
//! process. Component errors propagate unchanged to the orchestrator, which
//! wraps them with the device id and operation name before surfacing.

use thiserror::Error;

/// Typed errors surfaced by the maintenance engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown device identifier; surfaced to the caller, never retried
    #[error("device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    /// Too few samples to compute reliable statistics
    #[error("insufficient data: got {got} samples, need at least {needed}")]
    InsufficientData { got: usize, needed: usize },

    /// No trained parameter set for the category and no default configured
    #[error("unknown device category: {category}")]
    UnknownDeviceCategory { category: String },

    /// Telemetry store timed out or is unreachable; retried once, then surfaced
    #[error("telemetry unavailable for device {device_id}: {reason}")]
    DataUnavailable { device_id: String, reason: String },

    /// A training update would move parameters outside sane bounds
    #[error("training diverged for category {category}: bias {bias} outside ±{bound}")]
    TrainingDivergence {
        category: String,
        bias: f64,
        bound: f64,
    },

    /// Component error wrapped with the originating operation and device
    #[error("{operation} failed for device {device_id}: {source}")]
    Operation {
        operation: &'static str,
        device_id: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Stable machine-readable code, so callers can distinguish
    /// "no data" from "device broken" without string matching
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::DeviceNotFound { .. } => "device_not_found",
            EngineError::InsufficientData { .. } => "insufficient_data",
            EngineError::UnknownDeviceCategory { .. } => "unknown_device_category",
            EngineError::DataUnavailable { .. } => "data_unavailable",
            EngineError::TrainingDivergence { .. } => "training_divergence",
            EngineError::Operation { source, .. } => source.code(),
        }
    }

    /// Wrap a component error with the operation name and device id
    pub fn in_operation(self, operation: &'static str, device_id: &str) -> Self {
        EngineError::Operation {
            operation,
            device_id: device_id.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost component error, unwrapping operation context
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_survives_wrapping() {
        let err = EngineError::InsufficientData { got: 3, needed: 10 }
            .in_operation("detect_anomalies", "dev-1");
        assert_eq!(err.code(), "insufficient_data");
        assert!(matches!(
            err.root(),
            EngineError::InsufficientData { got: 3, .. }
        ));
    }

    #[test]
    fn test_display_includes_context() {
        let err = EngineError::DeviceNotFound {
            device_id: "dev-9".to_string(),
        }
        .in_operation("predict_maintenance_needs", "dev-9");
        let msg = err.to_string();
        assert!(msg.contains("predict_maintenance_needs"));
        assert!(msg.contains("dev-9"));
    }
}
