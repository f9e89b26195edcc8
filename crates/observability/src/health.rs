//! Health-Check-Endpunkt
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Bus-Bereitschaft

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub bus_bereit: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    bus_bereit: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            bus_bereit: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn bus_bereit(&self) -> bool {
        self.bus_bereit.load(Ordering::Relaxed)
    }

    /// Wird gesetzt sobald der TCP-Listener des Brokers gebunden ist
    pub fn bus_status_setzen(&self, bereit: bool) {
        self.bus_bereit.store(bereit, Ordering::Relaxed);
    }

    fn antwort(&self) -> (StatusCode, HealthResponse) {
        let bereit = self.bus_bereit();
        let (http_status, status) = if bereit {
            (StatusCode::OK, HealthStatus::Healthy)
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Unhealthy)
        };
        (
            http_status,
            HealthResponse {
                status,
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_seconds: self.uptime_seconds(),
                bus_bereit: bereit,
            },
        )
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let (http_status, response) = state.antwort();
    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frischer_zustand_ist_nicht_bereit() {
        let state = HealthState::neu();
        assert!(!state.bus_bereit());
        assert!(state.uptime_seconds() < 5);
        let (code, antwort) = state.antwort();
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(antwort.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn bereit_nach_bind() {
        let state = HealthState::neu();
        state.bus_status_setzen(true);
        let (code, antwort) = state.antwort();
        assert_eq!(code, StatusCode::OK);
        assert!(antwort.bus_bereit);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            bus_bereit: true,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"bus_bereit\":true"));
    }
}
