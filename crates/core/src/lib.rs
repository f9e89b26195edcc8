//! empowerly-core – Gemeinsame Typen, Rollen und Fehlerarten
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Empowerly-Crates gemeinsam genutzt werden: Meeting- und Teilnehmer-IDs,
//! das geschlossene Rollenmodell und die Klassifikation von Fehlern.

pub mod error;
pub mod rolle;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{EmpowerlyError, FehlerArt, Result};
pub use rolle::Rolle;
pub use types::{MeetingId, ParticipantId};
