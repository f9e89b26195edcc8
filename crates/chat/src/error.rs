//! Fehlertypen fuer das Chat-Crate

use empowerly_protocol::ProtocolError;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Keine Chat-Nachricht: {0}")]
    FalscherTyp(String),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),
}

pub type ChatResult<T> = Result<T, ChatError>;
