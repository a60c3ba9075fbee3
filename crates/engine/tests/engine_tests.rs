//! End-to-end tests for the maintenance engine against in-memory collaborators

use async_trait::async_trait;
use chrono::Utc;
use maintenance_engine::{
    AlertEvent, AlertSink, DeviceDirectory, DeviceInfo, EngineConfig, EngineError, EngineMetrics,
    FeedbackType, MaintenanceEngine, MaintenanceFeedback, TelemetrySample, TelemetryStore,
};
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route engine logs through the test writer, once per binary
fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("maintenance_engine=debug")),
            )
            .with_test_writer()
            .init();
    });
}

struct InMemoryStore {
    devices: HashMap<String, Vec<TelemetrySample>>,
}

#[async_trait]
impl TelemetryStore for InMemoryStore {
    async fn fetch_historical_samples(
        &self,
        device_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<TelemetrySample>, EngineError> {
        let samples = self
            .devices
            .get(device_id)
            .ok_or_else(|| EngineError::DeviceNotFound {
                device_id: device_id.to_string(),
            })?;
        Ok(samples
            .iter()
            .filter(|s| s.timestamp >= from && s.timestamp < to)
            .cloned()
            .collect())
    }
}

/// Store that never answers within any reasonable timeout
struct HangingStore;

#[async_trait]
impl TelemetryStore for HangingStore {
    async fn fetch_historical_samples(
        &self,
        _device_id: &str,
        _from: i64,
        _to: i64,
    ) -> Result<Vec<TelemetrySample>, EngineError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

struct InMemoryDirectory {
    devices: HashMap<String, DeviceInfo>,
}

#[async_trait]
impl DeviceDirectory for InMemoryDirectory {
    async fn device_info(&self, device_id: &str) -> Result<DeviceInfo, EngineError> {
        self.devices
            .get(device_id)
            .cloned()
            .ok_or_else(|| EngineError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AlertEvent>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn dispatch(&self, event: AlertEvent) -> anyhow::Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl AlertSink for FailingSink {
    async fn dispatch(&self, _event: AlertEvent) -> anyhow::Result<()> {
        anyhow::bail!("notification transport unreachable")
    }
}

/// Hourly samples ending now, built from per-index closures
fn window(
    hours: usize,
    power: impl Fn(usize) -> f64,
    temperature: impl Fn(usize) -> f64,
) -> Vec<TelemetrySample> {
    let now = Utc::now().timestamp();
    (0..hours)
        .map(|i| TelemetrySample {
            timestamp: now - (hours - i) as i64 * 3600,
            power_consumption: power(i),
            voltage: 230.0,
            current: power(i) / 230.0,
            power_factor: 0.98,
            temperature: temperature(i),
            vibration: 0.1,
            operating_hours: 1_000.0 + i as f64,
            maintenance_flag: false,
        })
        .collect()
}

fn steady_device() -> Vec<TelemetrySample> {
    // 30 days of steady 100W, 22°C ± 0.5
    window(
        30 * 24,
        |_| 100.0,
        |i| 22.0 + if i % 2 == 0 { 0.5 } else { -0.5 },
    )
}

fn engine_for(devices: Vec<(&str, &str, &str, Vec<TelemetrySample>)>) -> MaintenanceEngine {
    init_tracing();
    let mut telemetry = HashMap::new();
    let mut directory = HashMap::new();
    for (id, name, category, samples) in devices {
        telemetry.insert(id.to_string(), samples);
        directory.insert(
            id.to_string(),
            DeviceInfo {
                name: name.to_string(),
                category: category.to_string(),
            },
        );
    }
    MaintenanceEngine::new(
        Arc::new(InMemoryStore { devices: telemetry }),
        Arc::new(InMemoryDirectory { devices: directory }),
        EngineConfig::default(),
    )
}

fn confirmed_failures(predicted: f64, count: usize) -> Vec<MaintenanceFeedback> {
    (0..count)
        .map(|_| MaintenanceFeedback {
            feedback_type: FeedbackType::ConfirmedFailure,
            predicted_failure_probability: predicted,
            actual_outcome: true,
            notes: None,
        })
        .collect()
}

fn false_alarms(predicted: f64, count: usize) -> Vec<MaintenanceFeedback> {
    (0..count)
        .map(|_| MaintenanceFeedback {
            feedback_type: FeedbackType::FalseAlarm,
            predicted_failure_probability: predicted,
            actual_outcome: false,
            notes: None,
        })
        .collect()
}

#[tokio::test]
async fn steady_device_predicts_low_risk() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())]);

    let prediction = engine.predict_maintenance_needs("dev-1").await.unwrap();

    assert!(
        prediction.failure_probability < 0.1,
        "probability was {}",
        prediction.failure_probability
    );
    assert!(prediction.predicted_failure_date.is_none());
    assert_eq!(prediction.recommended_actions.len(), 1);
    assert!(prediction.recommended_actions[0].contains("normal parameters"));
    assert_eq!(prediction.device_name, "Living Room AC");
    assert_eq!(prediction.device_type, "hvac");
    let importance_sum: f64 = prediction.feature_importance.values().sum();
    assert!((importance_sum - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn temperature_step_is_flagged_at_onset() {
    // Temperature jumps from 22°C to 85°C at sample 50 of 100 and stays there
    let samples = window(100, |_| 100.0, |i| if i < 50 { 22.0 } else { 85.0 });
    let engine = engine_for(vec![("dev-1", "Water Heater", "heater", samples)]);

    let result = engine
        .detect_anomalies("dev-1", Duration::from_secs(101 * 3600))
        .await
        .unwrap();

    assert!(result.has_anomalies);
    assert!(result.anomaly_count >= 1);
    assert!(
        result
            .anomalies
            .iter()
            .any(|a| (49..=51).contains(&a.index)),
        "no anomaly near index 50: {:?}",
        result.anomalies.iter().map(|a| a.index).collect::<Vec<_>>()
    );
    assert!(result.is_consistent());
}

#[tokio::test]
async fn unknown_device_fails_cleanly() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())]);

    let err = engine.predict_maintenance_needs("ghost").await.unwrap_err();
    assert_eq!(err.code(), "device_not_found");
    assert!(matches!(
        err.root(),
        EngineError::DeviceNotFound { device_id } if device_id == "ghost"
    ));
}

#[tokio::test]
async fn short_window_is_insufficient() {
    let samples = window(5, |_| 100.0, |_| 22.0);
    let engine = engine_for(vec![("dev-1", "New Sensor", "sensor", samples)]);

    let err = engine
        .detect_anomalies("dev-1", Duration::from_secs(6 * 3600))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "insufficient_data");
}

#[tokio::test]
async fn healthy_device_scores_high() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())]);

    let result = engine.calculate_health_score("dev-1").await.unwrap();
    assert!(result.health_score >= 90, "score was {}", result.health_score);
}

#[tokio::test]
async fn overheating_device_scores_lower() {
    let hot = window(30 * 24, |_| 100.0, |_| 70.0);
    let engine = engine_for(vec![
        ("cool", "AC One", "hvac", steady_device()),
        ("hot", "AC Two", "hvac", hot),
    ]);

    let cool = engine.calculate_health_score("cool").await.unwrap();
    let hot = engine.calculate_health_score("hot").await.unwrap();
    assert!(hot.health_score < cool.health_score);
}

#[tokio::test]
async fn training_shifts_predictions_upward() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())]);

    let before = engine.predict_maintenance_needs("dev-1").await.unwrap();

    // Ground truth: the model kept under-predicting failures for this category
    for _ in 0..3 {
        engine
            .train_model("hvac", &confirmed_failures(0.05, 8))
            .await
            .unwrap();
    }

    let after = engine.predict_maintenance_needs("dev-1").await.unwrap();
    assert!(
        after.failure_probability > before.failure_probability,
        "expected upward shift, got {} -> {}",
        before.failure_probability,
        after.failure_probability
    );
    assert!(after.failure_probability <= 1.0);
    assert!(after.confidence > before.confidence);
}

#[tokio::test]
async fn empty_feedback_batch_is_a_noop() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())]);

    let before = engine.predict_maintenance_needs("dev-1").await.unwrap();
    engine.train_model("hvac", &[]).await.unwrap();
    let after = engine.predict_maintenance_needs("dev-1").await.unwrap();

    assert!((after.failure_probability - before.failure_probability).abs() < 1e-12);
}

#[tokio::test]
async fn actionable_prediction_emits_alert() {
    init_tracing();
    let mut telemetry = HashMap::new();
    telemetry.insert("dev-1".to_string(), steady_device());
    let mut directory = HashMap::new();
    directory.insert(
        "dev-1".to_string(),
        DeviceInfo {
            name: "Old Compressor".to_string(),
            category: "compressor".to_string(),
        },
    );
    let sink = Arc::new(RecordingSink::default());
    let engine = MaintenanceEngine::new(
        Arc::new(InMemoryStore { devices: telemetry }),
        Arc::new(InMemoryDirectory { devices: directory }),
        EngineConfig::default(),
    )
    .with_alert_sink(Arc::clone(&sink) as Arc<dyn AlertSink>);

    // Push the category's calibration up until predictions are actionable
    for _ in 0..8 {
        engine
            .train_model("compressor", &confirmed_failures(0.0, 10))
            .await
            .unwrap();
    }

    let prediction = engine.predict_maintenance_needs("dev-1").await.unwrap();
    assert!(prediction.failure_probability >= 0.3);
    assert!(prediction.predicted_failure_date.is_some());

    let events = sink.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].alert_type, "PredictiveMaintenance");
    assert_eq!(events[0].device_id, "dev-1");
    assert!(events[0].message.contains("Old Compressor"));
}

#[tokio::test]
async fn alert_failure_does_not_fail_prediction() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())])
        .with_alert_sink(Arc::new(FailingSink));

    for _ in 0..8 {
        engine
            .train_model("hvac", &confirmed_failures(0.0, 10))
            .await
            .unwrap();
    }

    let prediction = engine.predict_maintenance_needs("dev-1").await.unwrap();
    assert!(prediction.failure_probability >= 0.3);
}

#[tokio::test(start_paused = true)]
async fn telemetry_timeout_surfaces_data_unavailable() {
    init_tracing();
    let mut directory = HashMap::new();
    directory.insert(
        "dev-1".to_string(),
        DeviceInfo {
            name: "Living Room AC".to_string(),
            category: "hvac".to_string(),
        },
    );
    let engine = MaintenanceEngine::new(
        Arc::new(HangingStore),
        Arc::new(InMemoryDirectory { devices: directory }),
        EngineConfig::default(),
    );

    let err = engine.predict_maintenance_needs("dev-1").await.unwrap_err();
    assert_eq!(err.code(), "data_unavailable");
    assert!(err.to_string().contains("predict_maintenance_needs"));
}

#[tokio::test]
async fn failed_detection_increments_error_counter() {
    let engine = engine_for(vec![("dev-1", "Living Room AC", "hvac", steady_device())]);
    let metrics = EngineMetrics::new();

    let before = metrics.operation_error_count("detect_anomalies", "device_not_found");
    let err = engine
        .detect_anomalies("ghost", Duration::from_secs(3600))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "device_not_found");
    assert!(metrics.operation_error_count("detect_anomalies", "device_not_found") >= before + 1);
}

#[tokio::test]
async fn diverging_training_increments_error_counter() {
    let engine = engine_for(vec![("dev-1", "Chest Freezer", "freezer", steady_device())]);
    let metrics = EngineMetrics::new();

    let before = metrics.operation_error_count("train_model", "training_divergence");
    // Keep dragging the calibration down until the divergence guard trips
    let mut last = Ok(());
    for _ in 0..10 {
        last = engine.train_model("freezer", &false_alarms(0.9, 8)).await;
        if last.is_err() {
            break;
        }
    }
    let err = last.unwrap_err();
    assert_eq!(err.code(), "training_divergence");
    assert!(metrics.operation_error_count("train_model", "training_divergence") >= before + 1);
}

#[tokio::test]
async fn concurrent_reads_and_training_stay_consistent() {
    let engine = Arc::new(engine_for(vec![(
        "dev-1",
        "Living Room AC",
        "hvac",
        steady_device(),
    )]));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                let p = engine.predict_maintenance_needs("dev-1").await.unwrap();
                assert!((0.0..=1.0).contains(&p.failure_probability));
            }
        }));
    }
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                engine
                    .train_model("hvac", &confirmed_failures(0.2, 3))
                    .await
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}
