//! Bus-Frames zwischen Client und Broker
//!
//! ## Ablauf
//! ```text
//! Client                        Broker
//!   |-- Abonnieren{topic} -------->|
//!   |-- Veroeffentlichen{t,body} ->|-- Zustellung{t,body} --> alle Abonnenten von t
//!   |-- Ping{ts} ----------------->|
//!   |<------------------ Pong{ts} -|
//!   |-- Abbestellen{topic} ------->|
//! ```
//!
//! Zustellung ist at-most-once: volle Send-Queues verwerfen Frames.
//! Reihenfolge bleibt pro Sender und Topic erhalten.

use serde::{Deserialize, Serialize};

/// Ein Frame auf der Bus-Verbindung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum BusFrame {
    /// Client -> Broker: Topic abonnieren
    Abonnieren { topic: String },
    /// Client -> Broker: Abonnement beenden
    Abbestellen { topic: String },
    /// Client -> Broker: Nachricht an alle Abonnenten eines Topics
    Veroeffentlichen {
        topic: String,
        body: serde_json::Value,
    },
    /// Broker -> Client: zugestellte Nachricht
    Zustellung {
        topic: String,
        body: serde_json::Value,
    },
    /// Heartbeat
    Ping { timestamp_ms: u64 },
    Pong { timestamp_ms: u64 },
    /// Broker -> Client: Fehlermeldung (z.B. ungueltiger Frame)
    Fehler { nachricht: String },
}

impl BusFrame {
    /// Erstellt einen Ping mit der aktuellen Unix-Zeit
    pub fn ping_jetzt() -> Self {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::Ping { timestamp_ms: ts }
    }

    /// Kurzname fuer Logs
    pub fn art(&self) -> &'static str {
        match self {
            Self::Abonnieren { .. } => "abonnieren",
            Self::Abbestellen { .. } => "abbestellen",
            Self::Veroeffentlichen { .. } => "veroeffentlichen",
            Self::Zustellung { .. } => "zustellung",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::Fehler { .. } => "fehler",
        }
    }
}
