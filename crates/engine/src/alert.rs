//! Alert emission to the notification collaborator
//!
//! When a prediction crosses the actionable threshold the orchestrator emits a
//! predictive-maintenance alert. Delivery is best-effort: a failing sink is
//! logged and never fails the prediction call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Alert type for threshold crossings
pub const PREDICTIVE_MAINTENANCE_ALERT: &str = "PredictiveMaintenance";

/// Event handed to the external dispatch interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub device_id: String,
    pub alert_type: String,
    pub message: String,
}

impl AlertEvent {
    /// Build the standard predictive-maintenance alert for a device
    pub fn predictive_maintenance(
        device_id: &str,
        device_name: &str,
        failure_probability: f64,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            alert_type: PREDICTIVE_MAINTENANCE_ALERT.to_string(),
            message: format!(
                "Device '{}' has an elevated failure probability of {:.0}%; maintenance recommended",
                device_name,
                failure_probability * 100.0
            ),
        }
    }
}

/// External notification dispatch boundary
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, event: AlertEvent) -> anyhow::Result<()>;
}
