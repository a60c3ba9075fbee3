//! Predictive maintenance and anomaly detection engine for smart-home devices
//!
//! This crate provides the core functionality for:
//! - Feature extraction from historical device telemetry
//! - Statistical anomaly detection over telemetry series
//! - Failure probability prediction with explainable feature importance
//! - Bounded 0-100 health scoring
//! - Recalibration of per-category model parameters from feedback
//!
//! Device CRUD, persistence, the notification transport and the web surface
//! live outside this crate and are reached through the boundary traits in
//! [`telemetry`] and [`alert`].

pub mod alert;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod features;
pub mod health;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod predictor;
pub mod telemetry;

pub use alert::{AlertEvent, AlertSink};
pub use anomaly::AnomalyDetector;
pub use config::EngineConfig;
pub use error::EngineError;
pub use features::FeatureExtractor;
pub use health::HealthScorer;
pub use models::*;
pub use observability::EngineMetrics;
pub use orchestrator::{MaintenanceEngine, OperationState};
pub use predictor::{FailurePredictor, ModelParameters, ModelTrainer, ParameterStore};
pub use telemetry::{DeviceDirectory, TelemetryStore};
