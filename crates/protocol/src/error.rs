//! Fehlertypen fuer das Protokoll-Crate

use thiserror::Error;

/// Fehler beim Parsen oder Erzeugen von Protokollnachrichten
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(String),

    #[error("Unbekanntes Topic: {0}")]
    UnbekanntesTopic(String),

    #[error("Gezielte Nachricht ohne Empfaenger: {0}")]
    FehlendesZiel(&'static str),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
