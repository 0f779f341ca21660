//! Liveness endpoint (`/health`).

use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

use crate::AppState;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: HashMap<String, u64>,
}

#[derive(Clone, Debug)]
pub struct HealthState {
    pub start_time: SystemTime,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            start_time: SystemTime::now(),
        }
    }
}

impl HealthState {
    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Reports `down` with a 503 once the event processor has stopped.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthInfo>) {
    let mut details = HashMap::new();
    details.insert(
        "orders".to_string(),
        state.services.orders.list_orders().len() as u64,
    );

    let (code, status) = if state.event_sender.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Down)
    } else {
        (StatusCode::OK, HealthStatus::Up)
    };

    (
        code,
        Json(HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: state.health.uptime_seconds(),
            details,
        }),
    )
}
