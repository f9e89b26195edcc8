//! Fehlertypen fuer das Peer-Mesh

use empowerly_core::{FehlerArt, ParticipantId};
use empowerly_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    /// SDP/ICE-Verhandlung mit einem Teilnehmer gescheitert
    #[error("Verhandlung mit {teilnehmer} fehlgeschlagen: {grund}")]
    Verhandlung {
        teilnehmer: ParticipantId,
        grund: String,
    },

    /// Transport konnte nicht erstellt werden
    #[error("Peer-Transport-Fehler: {0}")]
    Transport(String),

    /// Ungueltige Signal-Payload
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),
}

impl MeshError {
    pub fn verhandlung(teilnehmer: &ParticipantId, grund: impl Into<String>) -> Self {
        Self::Verhandlung {
            teilnehmer: teilnehmer.clone(),
            grund: grund.into(),
        }
    }

    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Verhandlung { .. } | Self::Transport(_) => FehlerArt::PeerVerhandlung,
            Self::Protokoll(_) => FehlerArt::Sonstiges,
        }
    }
}

pub type MeshResult<T> = Result<T, MeshError>;
