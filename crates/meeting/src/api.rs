//! Meeting-API: Typen und Trait
//!
//! Die Antworten des Backends sind rohes camelCase-JSON ohne Huelle.
//! Zeitstempel kommen ohne Zeitzone (`2025-01-15T10:30:00`).

use chrono::NaiveDateTime;
use empowerly_core::{MeetingId, ParticipantId, Rolle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::roster::TeilnehmerStatus;

/// Dauer eines Meetings, wenn die API keine meldet
pub const STANDARD_DAUER_MINUTEN: u32 = 15;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler der Meeting-API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Token fehlt, ist abgelaufen oder der Benutzer wurde geloescht (HTTP 401)
    #[error("Nicht angemeldet")]
    NichtAutorisiert,

    #[error("Zugriff verweigert: {0}")]
    Verboten(String),

    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Server-Fehler ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("Netzwerk-Fehler: {0}")]
    Netzwerk(#[from] reqwest::Error),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Status eines Meetings im Backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeetingStatus {
    #[serde(rename = "SCHEDULED")]
    Geplant,
    #[serde(rename = "IN_PROGRESS")]
    Laufend,
    #[serde(rename = "ENDED")]
    Beendet,
    #[serde(rename = "CANCELLED")]
    Abgesagt,
}

/// Teilnehmer-Eintrag in einer Meeting-Antwort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeilnehmerInfo {
    pub user_id: ParticipantId,
    #[serde(default)]
    pub user_name: Option<String>,
    pub status: TeilnehmerStatus,
    #[serde(default)]
    pub joined_at: Option<NaiveDateTime>,
}

/// Metadaten eines Meetings (`GET /meetings/{id}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInfo {
    pub id: MeetingId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub host_id: ParticipantId,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<NaiveDateTime>,
    /// Minuten
    #[serde(default)]
    pub duration: Option<u32>,
    pub status: MeetingStatus,
    #[serde(default)]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub ended_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub participants: Vec<TeilnehmerInfo>,
    #[serde(default)]
    pub active_participant_count: Option<u32>,
}

impl MeetingInfo {
    /// Laufzeit ab Beitritt; fehlende oder ungueltige Dauer ergibt 15 Minuten
    pub fn dauer(&self) -> Duration {
        let minuten = match self.duration {
            Some(m) if m > 0 => m,
            _ => STANDARD_DAUER_MINUTEN,
        };
        Duration::from_secs(u64::from(minuten) * 60)
    }

    pub fn ist_host(&self, teilnehmer: &ParticipantId) -> bool {
        self.host_id == *teilnehmer
    }
}

/// Eintrag im Benutzerverzeichnis (`GET /users/all`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benutzer {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role: Rolle,
}

/// Anfrage fuer `POST /meetings/{id}/invite`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EinladungsAnfrage {
    pub user_ids: Vec<ParticipantId>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Zugriff auf das Meeting-Backend
#[allow(async_fn_in_trait)]
pub trait MeetingApi {
    async fn meeting_abrufen(&self, id: &MeetingId) -> ApiResult<MeetingInfo>;

    async fn beitreten(&self, id: &MeetingId) -> ApiResult<()>;

    async fn verlassen(&self, id: &MeetingId) -> ApiResult<()>;

    /// Beendet das Meeting fuer alle
    async fn beenden(&self, id: &MeetingId) -> ApiResult<()>;

    async fn einladen(&self, id: &MeetingId, benutzer: &[ParticipantId]) -> ApiResult<()>;

    async fn benutzer_auflisten(&self) -> ApiResult<Vec<Benutzer>>;
}
