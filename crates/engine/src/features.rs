//! Feature extraction from telemetry windows
//!
//! Turns a time-ordered sample window into the fixed-shape feature vector the
//! predictor and health scorer consume: per-metric means and standard
//! deviations, scale-free trends, recency since maintenance, and the anomaly
//! score carried over from detection.

use crate::error::EngineError;
use crate::models::{MaintenanceFeatureVector, TelemetrySample};
use chrono::Utc;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Extracts the maintenance feature vector from a telemetry window
///
/// Pure function of its input; owns no state across calls.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a non-empty, ascending sample window
    ///
    /// `anomaly_score` is the aggregate confidence from the anomaly detector,
    /// passed through by contract rather than recomputed here.
    pub fn extract(
        &self,
        samples: &[TelemetrySample],
        anomaly_score: f64,
    ) -> Result<MaintenanceFeatureVector, EngineError> {
        if samples.is_empty() {
            return Err(EngineError::InsufficientData { got: 0, needed: 1 });
        }

        let power: Vec<f64> = samples.iter().map(|s| s.power_consumption).collect();
        let voltage: Vec<f64> = samples.iter().map(|s| s.voltage).collect();
        let current: Vec<f64> = samples.iter().map(|s| s.current).collect();
        let temperature: Vec<f64> = samples.iter().map(|s| s.temperature).collect();
        let vibration: Vec<f64> = samples.iter().map(|s| s.vibration).collect();

        Ok(MaintenanceFeatureVector {
            average_power_consumption: mean(&power),
            power_consumption_std_dev: std_dev(&power),
            average_voltage: mean(&voltage),
            average_current: mean(&current),
            average_temperature: mean(&temperature),
            average_vibration: mean(&vibration),
            operating_hours: self.operating_hours(samples),
            power_trend: normalized_trend(&power),
            temperature_trend: normalized_trend(&temperature),
            days_since_last_maintenance: self.days_since_last_maintenance(samples),
            anomaly_score: anomaly_score.clamp(0.0, 1.0),
        })
    }

    /// Last cumulative operating-hours reading; maximum observed when the
    /// series is non-monotonic
    fn operating_hours(&self, samples: &[TelemetrySample]) -> f64 {
        let last = samples.last().map(|s| s.operating_hours).unwrap_or(0.0);
        let max = samples
            .iter()
            .map(|s| s.operating_hours)
            .fold(f64::MIN, f64::max);
        last.max(max)
    }

    /// Days since the most recent maintenance-flagged sample; the window span
    /// in days when no maintenance is recorded (conservative proxy)
    fn days_since_last_maintenance(&self, samples: &[TelemetrySample]) -> f64 {
        let now = Utc::now().timestamp();
        let last_maintenance = samples
            .iter()
            .rev()
            .find(|s| s.maintenance_flag)
            .map(|s| s.timestamp);

        match last_maintenance {
            Some(ts) => ((now - ts).max(0) as f64) / SECONDS_PER_DAY,
            None => {
                let first = samples.first().map(|s| s.timestamp).unwrap_or(now);
                let last = samples.last().map(|s| s.timestamp).unwrap_or(now);
                ((last - first).max(0) as f64) / SECONDS_PER_DAY
            }
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (Bessel-corrected); 0 below 2 samples
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// OLS slope of the metric against sample index, normalized by the metric's
/// mean so trends are scale-free; 0 below 2 samples or around a zero mean
fn normalized_trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    if m.abs() < f64::EPSILON {
        return 0.0;
    }
    linear_regression_slope(values) / m
}

/// Calculate linear regression slope against the sample index
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_samples(count: usize, power_base: f64, temp_base: f64) -> Vec<TelemetrySample> {
        let now = Utc::now().timestamp();
        (0..count)
            .map(|i| TelemetrySample {
                timestamp: now - (count - i - 1) as i64 * 3600,
                power_consumption: power_base + (i as f64 * 0.5),
                voltage: 230.0,
                current: 0.43,
                power_factor: 0.98,
                temperature: temp_base,
                vibration: 0.1,
                operating_hours: 1000.0 + i as f64,
                maintenance_flag: false,
            })
            .collect()
    }

    #[test]
    fn test_empty_window_rejected() {
        let extractor = FeatureExtractor::new();
        let err = extractor.extract(&[], 0.0).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { got: 0, .. }));
    }

    #[test]
    fn test_average_within_input_bounds() {
        let extractor = FeatureExtractor::new();
        let samples = create_test_samples(20, 100.0, 22.0);
        let min = samples
            .iter()
            .map(|s| s.power_consumption)
            .fold(f64::MAX, f64::min);
        let max = samples
            .iter()
            .map(|s| s.power_consumption)
            .fold(f64::MIN, f64::max);

        let features = extractor.extract(&samples, 0.0).unwrap();
        assert!(features.average_power_consumption >= min);
        assert!(features.average_power_consumption <= max);
    }

    #[test]
    fn test_std_dev_bessel_corrected() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Sample variance of this set is ~4.57
        assert!((std_dev(&values) - 4.571_f64.sqrt()).abs() < 0.01);
    }

    #[test]
    fn test_std_dev_zero_below_two_samples() {
        assert_eq!(std_dev(&[5.0]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn test_trend_scale_free() {
        // Same relative growth at different scales yields the same trend
        let small: Vec<f64> = (0..20).map(|i| 1.0 + i as f64 * 0.01).collect();
        let large: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let t_small = normalized_trend(&small);
        let t_large = normalized_trend(&large);
        assert!((t_small - t_large).abs() < 1e-9);
        assert!(t_small > 0.0);
    }

    #[test]
    fn test_flat_series_has_zero_trend() {
        let flat = vec![50.0; 30];
        assert_eq!(normalized_trend(&flat), 0.0);
    }

    #[test]
    fn test_linear_regression_slope() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((linear_regression_slope(&values) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_operating_hours_uses_max_when_non_monotonic() {
        let extractor = FeatureExtractor::new();
        let mut samples = create_test_samples(10, 100.0, 22.0);
        samples[4].operating_hours = 9999.0; // sensor glitch
        let features = extractor.extract(&samples, 0.0).unwrap();
        assert_eq!(features.operating_hours, 9999.0);
    }

    #[test]
    fn test_days_since_maintenance_from_flag() {
        let extractor = FeatureExtractor::new();
        let mut samples = create_test_samples(48, 100.0, 22.0);
        // Maintenance 24 samples (hours) ago
        samples[23].maintenance_flag = true;
        let features = extractor.extract(&samples, 0.0).unwrap();
        assert!((features.days_since_last_maintenance - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_days_since_maintenance_falls_back_to_span() {
        let extractor = FeatureExtractor::new();
        let samples = create_test_samples(49, 100.0, 22.0); // 48 hour span
        let features = extractor.extract(&samples, 0.0).unwrap();
        assert!((features.days_since_last_maintenance - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_anomaly_score_passed_through_clamped() {
        let extractor = FeatureExtractor::new();
        let samples = create_test_samples(10, 100.0, 22.0);
        let features = extractor.extract(&samples, 1.7).unwrap();
        assert_eq!(features.anomaly_score, 1.0);
        let features = extractor.extract(&samples, 0.42).unwrap();
        assert!((features.anomaly_score - 0.42).abs() < f64::EPSILON);
    }
}
