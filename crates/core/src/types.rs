//! Gemeinsame Identifikationstypen fuer Empowerly Connect
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Meeting- und Teilnehmer-IDs zur Compilezeit auszuschliessen. Die IDs
//! stammen aus der Meeting-API und sind dort opake Strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EmpowerlyError, Result};

/// Eindeutige Teilnehmer-ID (entspricht der Benutzer-ID der Meeting-API)
///
/// Die Ordnung ist lexikografisch und wird fuer den Tie-Break bei
/// gleichzeitigen Verbindungsangeboten verwendet. Deserialisierung laeuft
/// ueber [`ParticipantId::neu`], leere IDs vom Bus werden abgelehnt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Erstellt eine ParticipantId, leere IDs werden abgelehnt
    pub fn neu(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EmpowerlyError::UngueltigeId("leere Teilnehmer-ID".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fuer feste IDs im Code; Eingaben von aussen gehen ueber `neu`
impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = EmpowerlyError;

    fn try_from(id: String) -> Result<Self> {
        Self::neu(id)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

/// Eindeutige Meeting-ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeetingId(String);

impl MeetingId {
    /// Erstellt eine MeetingId, leere IDs und IDs mit `/` werden abgelehnt
    ///
    /// Die ID wird Teil der Topic-Namen (`meeting/{id}/...`), ein Schraegstrich
    /// wuerde die Topic-Struktur zerbrechen.
    pub fn neu(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() || id.contains('/') {
            return Err(EmpowerlyError::UngueltigeId(format!(
                "ungueltige Meeting-ID: '{id}'"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MeetingId {
    type Error = EmpowerlyError;

    fn try_from(id: String) -> Result<Self> {
        Self::neu(id)
    }
}

impl From<MeetingId> for String {
    fn from(id: MeetingId) -> Self {
        id.0
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
