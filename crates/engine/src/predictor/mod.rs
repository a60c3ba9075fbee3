//! Failure prediction engine
//!
//! The parameter store is the only long-lived mutable state in the engine;
//! the trainer is its sole writer, the predictor its reader.

mod failure;
mod params;
mod trainer;

pub use failure::FailurePredictor;
pub use params::{ModelParameters, ParameterStore, FEATURE_NAMES};
pub use trainer::ModelTrainer;
