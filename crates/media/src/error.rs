//! Fehlertypen fuer lokale Medien

use empowerly_core::FehlerArt;
use thiserror::Error;

/// Alle moeglichen Fehler beim Zugriff auf lokale Medien
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Zugriff auf Kamera/Mikrofon verweigert: {0}")]
    BerechtigungVerweigert(String),

    #[error("Medien-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Aufnahme vom Benutzer abgebrochen")]
    Abgebrochen,

    #[error("Keine lokalen Medien erfasst")]
    NichtErfasst,

    #[error("Aufzeichnungs-Fehler: {0}")]
    Aufnahme(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Verweigerte Berechtigung oder fehlendes Geraet
    pub fn ist_zugriffsfehler(&self) -> bool {
        matches!(
            self,
            Self::BerechtigungVerweigert(_) | Self::GeraetNichtGefunden(_)
        )
    }

    pub fn art(&self) -> FehlerArt {
        if self.ist_zugriffsfehler() {
            FehlerArt::MedienZugriff
        } else {
            FehlerArt::Sonstiges
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
