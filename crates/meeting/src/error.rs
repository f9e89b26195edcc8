//! Fehlertypen der Meeting-Session

use empowerly_chat::ChatError;
use empowerly_core::FehlerArt;
use empowerly_media::MediaError;
use empowerly_mesh::MeshError;
use empowerly_protocol::ProtocolError;
use empowerly_signaling::SignalingError;
use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("Meeting-API: {0}")]
    Api(#[from] ApiError),

    #[error("Medien: {0}")]
    Medien(#[from] MediaError),

    #[error("Signaling: {0}")]
    Signaling(#[from] SignalingError),

    #[error("Peer-Mesh: {0}")]
    Mesh(#[from] MeshError),

    #[error("Chat: {0}")]
    Chat(#[from] ChatError),

    #[error("Protokoll: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Aktion nur fuer den Host erlaubt
    #[error("Nicht berechtigt: {0}")]
    Autorisierung(String),

    #[error("Meeting-Zeit abgelaufen")]
    SessionAbgelaufen,

    /// Session ist nicht (mehr) aktiv
    #[error("Session ist nicht aktiv")]
    NichtAktiv,

    #[error("Beitritt fehlgeschlagen: {0}")]
    Beitritt(String),
}

impl MeetingError {
    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Medien(e) => e.art(),
            Self::Signaling(e) => e.art(),
            Self::Mesh(e) => e.art(),
            Self::Autorisierung(_) => FehlerArt::Autorisierung,
            Self::SessionAbgelaufen => FehlerArt::SessionAbgelaufen,
            Self::Api(_) | Self::Chat(_) | Self::Protokoll(_) | Self::NichtAktiv | Self::Beitritt(_) => {
                FehlerArt::Sonstiges
            }
        }
    }
}

pub type MeetingResult<T> = Result<T, MeetingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehlerarten() {
        let e = MeetingError::from(MediaError::BerechtigungVerweigert("Kamera".into()));
        assert_eq!(e.art(), FehlerArt::MedienZugriff);
        assert_eq!(
            MeetingError::Autorisierung("kein Host".into()).art(),
            FehlerArt::Autorisierung
        );
        assert_eq!(MeetingError::SessionAbgelaufen.art(), FehlerArt::SessionAbgelaufen);
    }
}
