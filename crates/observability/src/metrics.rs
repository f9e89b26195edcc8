//! Prometheus-kompatible Metriken fuer den Empowerly-Broker
//!
//! Registrierte Metriken:
//! - `empowerly_bus_connected_clients` – Gauge: verbundene Bus-Clients
//! - `empowerly_bus_active_topics` – Gauge: Topics mit mindestens einem Abonnenten
//! - `empowerly_bus_published_total` – Counter: veroeffentlichte Nachrichten
//! - `empowerly_bus_delivered_total` – Counter: zugestellte Nachrichten
//! - `empowerly_bus_dropped_total` – Counter: verworfene Nachrichten (volle Queue)
//! - `empowerly_bus_heartbeat_timeouts_total` – Counter: Verbindungen ohne Lebenszeichen

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Broker-Metriken
#[derive(Clone)]
pub struct BrokerMetriken {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub active_topics: IntGauge,
    pub published_total: IntCounter,
    pub delivered_total: IntCounter,
    pub dropped_total: IntCounter,
    pub heartbeat_timeouts_total: IntCounter,
}

impl BrokerMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "empowerly_bus_connected_clients",
            "Anzahl aktuell verbundener Bus-Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let active_topics = IntGauge::with_opts(Opts::new(
            "empowerly_bus_active_topics",
            "Anzahl Topics mit mindestens einem Abonnenten",
        ))?;
        registry.register(Box::new(active_topics.clone()))?;

        let published_total = IntCounter::with_opts(Opts::new(
            "empowerly_bus_published_total",
            "Gesamtanzahl veroeffentlichter Nachrichten",
        ))?;
        registry.register(Box::new(published_total.clone()))?;

        let delivered_total = IntCounter::with_opts(Opts::new(
            "empowerly_bus_delivered_total",
            "Gesamtanzahl zugestellter Nachrichten",
        ))?;
        registry.register(Box::new(delivered_total.clone()))?;

        let dropped_total = IntCounter::with_opts(Opts::new(
            "empowerly_bus_dropped_total",
            "Gesamtanzahl verworfener Nachrichten",
        ))?;
        registry.register(Box::new(dropped_total.clone()))?;

        let heartbeat_timeouts_total = IntCounter::with_opts(Opts::new(
            "empowerly_bus_heartbeat_timeouts_total",
            "Verbindungen die wegen fehlendem Heartbeat getrennt wurden",
        ))?;
        registry.register(Box::new(heartbeat_timeouts_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            active_topics,
            published_total,
            delivered_total,
            dropped_total,
            heartbeat_timeouts_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: BrokerMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<BrokerMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
