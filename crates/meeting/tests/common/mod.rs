//! Gemeinsame Hilfen der Session-Tests: Meeting-API im Speicher, Session-Fabrik
//! und eine Pumpe, die mehrere Sessions bis zur Ruhe laufen laesst

#![allow(dead_code)]

use empowerly_core::{MeetingId, ParticipantId, Rolle};
use empowerly_media::SynthetischePlattform;
use empowerly_meeting::{
    ApiError, ApiResult, Benutzer, MeetingApi, MeetingInfo, MeetingSession, SessionConfig,
    TeilnehmerInfo, TeilnehmerStatus,
};
use empowerly_mesh::SynthetischeFabrik;
use empowerly_signaling::{InMemoryBus, KanalConfig};
use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type TestSession =
    MeetingSession<FakeMeetingApi, SynthetischePlattform, SynthetischeFabrik, InMemoryBus>;

pub const MEETING: &str = "m-1";
pub const HOST: &str = "host";

// ---------------------------------------------------------------------------
// FakeMeetingApi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aufruf {
    Abrufen,
    Beitreten,
    Verlassen,
    Beenden,
    Einladen(Vec<ParticipantId>),
    BenutzerAuflisten,
}

#[derive(Default)]
struct ApiZustand {
    meeting: Option<MeetingInfo>,
    benutzer: Vec<Benutzer>,
    aufrufe: Vec<(ParticipantId, Aufruf)>,
    einladen_scheitert: bool,
}

/// Meeting-Backend im Speicher; Klone fuer andere Benutzer teilen den Zustand
#[derive(Clone)]
pub struct FakeMeetingApi {
    benutzer_id: ParticipantId,
    zustand: Arc<Mutex<ApiZustand>>,
}

impl FakeMeetingApi {
    /// Meeting `m-1` des Hosts `host` mit der gegebenen Dauer in Minuten
    pub fn neu(dauer_minuten: u32) -> Self {
        let meeting: MeetingInfo = serde_json::from_value(json!({
            "id": MEETING,
            "title": "Quartalsplanung",
            "hostId": HOST,
            "hostName": "Hanna Host",
            "duration": dauer_minuten,
            "status": "IN_PROGRESS",
            "participants": [
                {"userId": HOST, "userName": "Hanna Host", "status": "ACCEPTED"},
                {"userId": "bob", "userName": "Bob", "status": "ACCEPTED"},
                {"userId": "cem", "userName": "Cem", "status": "INVITED"}
            ]
        }))
        .unwrap();
        let benutzer: Vec<Benutzer> = serde_json::from_value(json!([
            {"id": HOST, "name": "Hanna Host", "role": "ADMIN"},
            {"id": "bob", "name": "Bob", "role": "EMPLOYEE"},
            {"id": "cem", "name": "Cem", "role": "HR"},
            {"id": "dana", "name": "Dana", "role": "EMPLOYEE"},
            {"id": "emil", "name": "Emil", "role": "EMPLOYEE"}
        ]))
        .unwrap();

        Self {
            benutzer_id: ParticipantId::from(HOST),
            zustand: Arc::new(Mutex::new(ApiZustand {
                meeting: Some(meeting),
                benutzer,
                ..Default::default()
            })),
        }
    }

    /// Gleiches Backend, angemeldet als `benutzer`
    pub fn als(&self, benutzer: &str) -> Self {
        Self {
            benutzer_id: ParticipantId::from(benutzer),
            zustand: Arc::clone(&self.zustand),
        }
    }

    pub fn einladen_scheitert(&self, an: bool) {
        self.zustand.lock().einladen_scheitert = an;
    }

    /// Aufrufe eines Benutzers in Reihenfolge
    pub fn aufrufe_von(&self, benutzer: &str) -> Vec<Aufruf> {
        self.zustand
            .lock()
            .aufrufe
            .iter()
            .filter(|(b, _)| b.as_str() == benutzer)
            .map(|(_, a)| a.clone())
            .collect()
    }

    fn protokollieren(&self, aufruf: Aufruf) {
        self.zustand
            .lock()
            .aufrufe
            .push((self.benutzer_id.clone(), aufruf));
    }

    fn status_setzen(&self, status: TeilnehmerStatus) {
        let mut zustand = self.zustand.lock();
        if let Some(meeting) = zustand.meeting.as_mut() {
            match meeting
                .participants
                .iter_mut()
                .find(|p| p.user_id == self.benutzer_id)
            {
                Some(p) => p.status = status,
                None => meeting.participants.push(TeilnehmerInfo {
                    user_id: self.benutzer_id.clone(),
                    user_name: None,
                    status,
                    joined_at: None,
                }),
            }
        }
    }
}

impl MeetingApi for FakeMeetingApi {
    async fn meeting_abrufen(&self, id: &MeetingId) -> ApiResult<MeetingInfo> {
        self.protokollieren(Aufruf::Abrufen);
        self.zustand
            .lock()
            .meeting
            .clone()
            .filter(|m| m.id == *id)
            .ok_or_else(|| ApiError::NichtGefunden(id.to_string()))
    }

    async fn beitreten(&self, _id: &MeetingId) -> ApiResult<()> {
        self.protokollieren(Aufruf::Beitreten);
        self.status_setzen(TeilnehmerStatus::Beigetreten);
        Ok(())
    }

    async fn verlassen(&self, _id: &MeetingId) -> ApiResult<()> {
        self.protokollieren(Aufruf::Verlassen);
        self.status_setzen(TeilnehmerStatus::Verlassen);
        Ok(())
    }

    async fn beenden(&self, _id: &MeetingId) -> ApiResult<()> {
        self.protokollieren(Aufruf::Beenden);
        if self.benutzer_id.as_str() != HOST {
            return Err(ApiError::Verboten("nur der Host".into()));
        }
        Ok(())
    }

    async fn einladen(&self, _id: &MeetingId, benutzer: &[ParticipantId]) -> ApiResult<()> {
        self.protokollieren(Aufruf::Einladen(benutzer.to_vec()));
        let mut zustand = self.zustand.lock();
        if zustand.einladen_scheitert {
            return Err(ApiError::Server {
                status: 500,
                body: "Einladung fehlgeschlagen".into(),
            });
        }
        if let Some(meeting) = zustand.meeting.as_mut() {
            for id in benutzer {
                if !meeting.participants.iter().any(|p| p.user_id == *id) {
                    meeting.participants.push(TeilnehmerInfo {
                        user_id: id.clone(),
                        user_name: None,
                        status: TeilnehmerStatus::Eingeladen,
                        joined_at: None,
                    });
                }
            }
        }
        Ok(())
    }

    async fn benutzer_auflisten(&self) -> ApiResult<Vec<Benutzer>> {
        self.protokollieren(Aufruf::BenutzerAuflisten);
        Ok(self.zustand.lock().benutzer.clone())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub struct Beteiligter {
    pub session: TestSession,
    pub plattform: SynthetischePlattform,
    pub fabrik: SynthetischeFabrik,
}

/// Erstellt eine Session mit schnellen Zeitkonstanten
pub fn beteiligter(
    api: &FakeMeetingApi,
    bus: &InMemoryBus,
    id: &str,
    name: &str,
    rolle: Rolle,
    aufnahmen: &Path,
) -> Beteiligter {
    let plattform = SynthetischePlattform::neu();
    let fabrik = SynthetischeFabrik::neu();
    fabrik.auto_verbinden(true);

    let mut config = SessionConfig::neu(ParticipantId::from(id), name, rolle);
    config.kanal = KanalConfig {
        reconnect_verzoegerung: Duration::from_millis(50),
    };
    config.verbindungs_timeout = Duration::from_secs(2);
    config.aufnahme_verzeichnis = aufnahmen.to_path_buf();

    let session = MeetingSession::neu(
        api.als(id),
        bus.clone(),
        plattform.clone(),
        fabrik.clone(),
        config,
    );
    Beteiligter {
        session,
        plattform,
        fabrik,
    }
}

pub fn meeting_id() -> MeetingId {
    MeetingId::neu(MEETING).unwrap()
}

/// Verarbeitet Ereignisse aller Sessions, bis keine mehr etwas zu tun hat
pub async fn pumpen(sessions: &mut [&mut TestSession]) {
    loop {
        let mut etwas_passiert = false;
        for session in sessions.iter_mut() {
            while let Ok(Some(ereignis)) =
                tokio::time::timeout(Duration::from_millis(20), session.naechstes_ereignis()).await
            {
                session.ereignis_verarbeiten(ereignis).await;
                etwas_passiert = true;
            }
        }
        if !etwas_passiert {
            return;
        }
    }
}
