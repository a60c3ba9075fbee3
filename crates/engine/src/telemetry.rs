//! Boundary traits for the telemetry store and device directory
//!
//! All blocking I/O in the engine is isolated behind these traits; the
//! orchestrator applies timeouts and retries on top of them.

use crate::error::EngineError;
use crate::models::{DeviceInfo, TelemetrySample};
use async_trait::async_trait;
use tracing::warn;

/// Read access to ordered historical telemetry for a device
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Fetch samples with `from <= timestamp < to`, ascending by timestamp
    ///
    /// Fails with [`EngineError::DeviceNotFound`] for unknown identifiers.
    async fn fetch_historical_samples(
        &self,
        device_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<TelemetrySample>, EngineError>;
}

/// Device metadata lookup, required to label predictions
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn device_info(&self, device_id: &str) -> Result<DeviceInfo, EngineError>;
}

/// Enforce the window contract on samples returned by the store
///
/// The contract requires ascending order and unique timestamps. A misbehaving
/// store is degraded rather than fatal: samples are sorted and duplicate
/// timestamps dropped (first occurrence wins), with a warning logged.
pub fn normalize_window(device_id: &str, mut samples: Vec<TelemetrySample>) -> Vec<TelemetrySample> {
    let sorted = samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp);
    if !sorted {
        warn!(device_id = %device_id, "Telemetry window out of order, sorting");
        samples.sort_by_key(|s| s.timestamp);
    }

    let before = samples.len();
    samples.dedup_by_key(|s| s.timestamp);
    if samples.len() != before {
        warn!(
            device_id = %device_id,
            dropped = before - samples.len(),
            "Dropped duplicate-timestamp samples"
        );
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64) -> TelemetrySample {
        TelemetrySample {
            timestamp,
            power_consumption: 100.0,
            voltage: 230.0,
            current: 0.43,
            power_factor: 0.98,
            temperature: 22.0,
            vibration: 0.1,
            operating_hours: 100.0,
            maintenance_flag: false,
        }
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let samples = vec![sample(30), sample(10), sample(20), sample(10)];
        let normalized = normalize_window("dev-1", samples);
        let timestamps: Vec<i64> = normalized.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[test]
    fn test_normalize_leaves_clean_window_alone() {
        let samples = vec![sample(10), sample(20), sample(30)];
        let normalized = normalize_window("dev-1", samples.clone());
        assert_eq!(normalized.len(), samples.len());
    }
}
