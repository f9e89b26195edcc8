//! Fehlertypen fuer Signaling, Broker und Bus-Transporte

use empowerly_core::FehlerArt;
use thiserror::Error;

/// Fehlertyp fuer das Signaling-Crate
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Bus nicht erreichbar
    #[error("Verbindung zum Bus fehlgeschlagen: {0}")]
    Verbindung(String),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Kanal wurde bereits mit `disconnect()` geschlossen
    #[error("Signaling-Kanal ist getrennt")]
    KanalGeschlossen,

    /// Zeitlimit (Verbindungsaufbau, Heartbeat)
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Protokollfehler (ungueltiger Frame)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),
}

impl SignalingError {
    pub fn verbindung(msg: impl Into<String>) -> Self {
        Self::Verbindung(msg.into())
    }

    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Protokoll(_) => FehlerArt::Sonstiges,
            _ => FehlerArt::SignalingVerbindung,
        }
    }
}

/// Result-Typ fuer das Signaling-Crate
pub type SignalingResult<T> = Result<T, SignalingError>;
