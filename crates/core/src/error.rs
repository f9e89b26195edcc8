//! Fehlertypen und Fehlerarten fuer Empowerly Connect
//!
//! Jedes Crate definiert einen eigenen Fehler-Enum. Ueber [`FehlerArt`]
//! ordnen diese Fehler sich einer gemeinsamen Klassifikation zu, nach der
//! die Meeting-Session ihre Reaktion auswaehlt (abbrechen, wiederholen,
//! einzelnen Peer entfernen, ignorieren).

use thiserror::Error;

/// Globaler Result-Alias fuer empowerly-core
pub type Result<T> = std::result::Result<T, EmpowerlyError>;

/// Fehler des Core-Crates
#[derive(Debug, Error)]
pub enum EmpowerlyError {
    #[error("Ungueltige ID: {0}")]
    UngueltigeId(String),

    #[error("Unbekannte Rolle: {0}")]
    UngueltigeRolle(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

/// Klassifikation von Fehlern ueber Crate-Grenzen hinweg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerArt {
    /// Kamera/Mikrofon/Bildschirm verweigert oder nicht vorhanden
    MedienZugriff,
    /// Pub/Sub-Bus nicht erreichbar oder Verbindung verloren
    SignalingVerbindung,
    /// Verhandlung mit einem einzelnen Peer gescheitert
    PeerVerhandlung,
    /// Aktion ohne Berechtigung (z.B. Nicht-Host beendet Meeting)
    Autorisierung,
    /// Meeting-Zeit abgelaufen
    SessionAbgelaufen,
    /// Alles andere (API, IO, Protokoll)
    Sonstiges,
}

impl FehlerArt {
    /// Gibt true zurueck wenn die Session trotz des Fehlers weiterlaufen kann
    pub fn ist_lokal_behebbar(&self) -> bool {
        matches!(
            self,
            Self::SignalingVerbindung | Self::PeerVerhandlung | Self::Autorisierung
        )
    }
}
