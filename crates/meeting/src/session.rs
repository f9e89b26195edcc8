//! MeetingSession – Lebenszyklus einer Teilnahme an einem Meeting
//!
//! ## Zustaende
//!
//! ```text
//! Initialisierung -> Beitretend -> Aktiv -> Beendend -> Beendet
//!                        |                                 ^
//!                        +------- Fehler beim Beitritt ----+
//! ```
//!
//! ## Ereignis-Schleife
//!
//! ```text
//! Bus-Zustellungen ---+
//! Peer-Ereignisse ----+
//! Timer --------------+--> tokio::select! --> ereignis_verarbeiten()
//! Kanal-Status -------+
//! Bildschirm-Ende ----+
//! Befehle (run) ------+
//! ```
//!
//! Alles laeuft auf einer Schleife; die Session besitzt Registry, Medien,
//! Kanal, Timer, Chat und Teilnehmerliste exklusiv. Jeder Handler prueft
//! zuerst, ob die Session noch aktiv ist.

use chrono::Utc;
use empowerly_chat::{ChatNachricht, ChatRelay};
use empowerly_core::{MeetingId, ParticipantId, Rolle};
use empowerly_media::{MediaController, MediaError, MediaPlatform, MedienAnforderung};
use empowerly_mesh::{PeerEreignis, PeerFabrik, PeerRegistry};
use empowerly_protocol::{
    meeting_praefix, typ_aus_topic, JoinPayload, LeaveGrund, LeavePayload, SignalMessage,
    SignalTyp,
};
use empowerly_signaling::{
    BusConnector, KanalConfig, KanalEreignis, SignalingChannel, SignalingError, Zustellung,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::{Benutzer, MeetingApi, MeetingInfo};
use crate::error::{MeetingError, MeetingResult};
use crate::roster::Roster;
use crate::timer::{zeit_formatieren, SessionTimer, TimerEreignis, STANDARD_TICK};

/// Wartezeit auf die erste Bus-Verbindung beim Beitritt
pub const STANDARD_VERBINDUNGS_TIMEOUT: Duration = Duration::from_secs(10);

pub const HINWEIS_BEITRITT_FEHLGESCHLAGEN: &str = "Failed to join meeting";
pub const HINWEIS_ZEIT_ABGELAUFEN: &str = "Meeting time has expired. The meeting will now end.";
pub const HINWEIS_NUR_HOST: &str = "Only the host can end the meeting for everyone";
pub const HINWEIS_VOM_HOST_BEENDET: &str = "The host has ended the meeting";
pub const HINWEIS_EINLADUNG_OK: &str = "Participants invited successfully!";
pub const HINWEIS_EINLADUNG_FEHLER: &str = "Failed to invite participants";

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub teilnehmer_id: ParticipantId,
    pub teilnehmer_name: String,
    pub rolle: Rolle,
    pub kanal: KanalConfig,
    /// Wartezeit auf die erste Bus-Verbindung
    pub verbindungs_timeout: Duration,
    pub tick_intervall: Duration,
    pub medien: MedienAnforderung,
    pub aufnahme_verzeichnis: PathBuf,
}

impl SessionConfig {
    pub fn neu(teilnehmer_id: ParticipantId, teilnehmer_name: impl Into<String>, rolle: Rolle) -> Self {
        Self {
            teilnehmer_id,
            teilnehmer_name: teilnehmer_name.into(),
            rolle,
            kanal: KanalConfig::default(),
            verbindungs_timeout: STANDARD_VERBINDUNGS_TIMEOUT,
            tick_intervall: STANDARD_TICK,
            medien: MedienAnforderung::default(),
            aufnahme_verzeichnis: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Initialisierung,
    Beitretend,
    Aktiv,
    Beendend,
    Beendet,
}

/// Warum eine Session endete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndeGrund {
    Verlassen,
    FuerAlleBeendet,
    ZeitAbgelaufen,
    VomHostBeendet,
    Fehlgeschlagen,
}

/// Ergebnis einer beendeten Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnde {
    pub grund: EndeGrund,
    /// Dashboard-Pfad der eigenen Rolle
    pub ziel: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HinweisStufe {
    Info,
    Erfolg,
    Warnung,
    Fehler,
}

/// Meldung an den Benutzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hinweis {
    pub stufe: HinweisStufe,
    pub text: String,
}

/// Benutzeraktion fuer [`MeetingSession::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBefehl {
    StummUmschalten,
    VideoUmschalten,
    BildschirmUmschalten,
    AufzeichnungUmschalten,
    Chat(String),
    Einladen(Vec<ParticipantId>),
    Verlassen,
    FuerAlleBeenden,
}

/// Ein Ereignis aus einer der Quellen der Schleife
#[derive(Debug)]
pub enum SessionEreignis {
    Zustellung(Zustellung),
    Kanal(KanalEreignis),
    Peer(PeerEreignis),
    Timer(TimerEreignis),
    BildschirmBeendet,
}

// ---------------------------------------------------------------------------
// MeetingSession
// ---------------------------------------------------------------------------

pub struct MeetingSession<A, P, F, C>
where
    A: MeetingApi,
    P: MediaPlatform,
    F: PeerFabrik,
    C: BusConnector,
{
    api: A,
    connector: Option<C>,
    config: SessionConfig,
    status: SessionStatus,
    meeting: Option<MeetingInfo>,
    meeting_id: Option<MeetingId>,
    timer: Option<SessionTimer>,
    verbleibend: Option<Duration>,
    medien: MediaController<P>,
    peers: PeerRegistry<F>,
    kanal: Option<SignalingChannel>,
    kanal_ereignisse: Option<mpsc::UnboundedReceiver<KanalEreignis>>,
    zustellungen_tx: mpsc::UnboundedSender<Zustellung>,
    zustellungen_rx: mpsc::UnboundedReceiver<Zustellung>,
    chat: ChatRelay,
    roster: Roster,
    hinweise: Vec<Hinweis>,
    hinweis_tx: Option<mpsc::UnboundedSender<Hinweis>>,
    ende: Option<SessionEnde>,
    api_beigetreten: bool,
}

impl<A, P, F, C> MeetingSession<A, P, F, C>
where
    A: MeetingApi,
    P: MediaPlatform,
    F: PeerFabrik,
    C: BusConnector,
{
    pub fn neu(api: A, connector: C, plattform: P, fabrik: F, config: SessionConfig) -> Self {
        let (zustellungen_tx, zustellungen_rx) = mpsc::unbounded_channel();
        Self {
            medien: MediaController::neu(plattform, config.aufnahme_verzeichnis.clone()),
            peers: PeerRegistry::neu(config.teilnehmer_id.clone(), fabrik),
            chat: ChatRelay::neu(config.teilnehmer_id.clone(), config.teilnehmer_name.clone()),
            api,
            connector: Some(connector),
            config,
            status: SessionStatus::Initialisierung,
            meeting: None,
            meeting_id: None,
            timer: None,
            verbleibend: None,
            kanal: None,
            kanal_ereignisse: None,
            zustellungen_tx,
            zustellungen_rx,
            roster: Roster::neu(),
            hinweise: Vec::new(),
            hinweis_tx: None,
            ende: None,
            api_beigetreten: false,
        }
    }

    // -----------------------------------------------------------------------
    // Zugriff
    // -----------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn eigene_id(&self) -> &ParticipantId {
        &self.config.teilnehmer_id
    }

    pub fn meeting(&self) -> Option<&MeetingInfo> {
        self.meeting.as_ref()
    }

    pub fn meeting_id(&self) -> Option<&MeetingId> {
        self.meeting_id.as_ref()
    }

    pub fn ist_host(&self) -> bool {
        self.meeting
            .as_ref()
            .is_some_and(|m| m.ist_host(&self.config.teilnehmer_id))
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn peers(&self) -> &PeerRegistry<F> {
        &self.peers
    }

    pub fn medien(&self) -> &MediaController<P> {
        &self.medien
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn chat_verlauf(&self) -> &[ChatNachricht] {
        self.chat.verlauf()
    }

    pub fn hinweise(&self) -> &[Hinweis] {
        &self.hinweise
    }

    /// Gibt alle bisherigen Hinweise zurueck und leert die Liste
    pub fn hinweise_abholen(&mut self) -> Vec<Hinweis> {
        std::mem::take(&mut self.hinweise)
    }

    /// Leitet jeden neuen Hinweis zusaetzlich sofort an `tx` weiter
    ///
    /// Die Liste aus [`Self::hinweise`] wird weiterhin gefuellt.
    pub fn hinweise_weiterleiten(&mut self, tx: mpsc::UnboundedSender<Hinweis>) {
        self.hinweis_tx = Some(tx);
    }

    /// Restzeit des letzten Ticks
    pub fn verbleibend(&self) -> Option<Duration> {
        self.verbleibend
    }

    /// Restzeit als `MM:SS`
    pub fn restzeit_anzeige(&self) -> String {
        zeit_formatieren(self.verbleibend.unwrap_or_default())
    }

    pub fn kanal_verbunden(&self) -> bool {
        self.kanal.as_ref().is_some_and(|k| k.ist_verbunden())
    }

    pub fn ende(&self) -> Option<&SessionEnde> {
        self.ende.as_ref()
    }

    // -----------------------------------------------------------------------
    // Beitritt
    // -----------------------------------------------------------------------

    /// Tritt dem Meeting bei
    ///
    /// Jeder Fehler bricht ab, gibt alles Erworbene frei und beendet die
    /// Session endgueltig.
    pub async fn initialize(&mut self, meeting_id: MeetingId) -> MeetingResult<()> {
        if self.status != SessionStatus::Initialisierung {
            return Err(MeetingError::Beitritt("Session wurde bereits gestartet".into()));
        }
        self.meeting_id = Some(meeting_id.clone());

        match self.beitreten(&meeting_id).await {
            Ok(()) => {
                self.status = SessionStatus::Aktiv;
                tracing::info!(
                    meeting = %meeting_id,
                    teilnehmer = %self.config.teilnehmer_id,
                    "Meeting beigetreten"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(meeting = %meeting_id, fehler = %e, "Beitritt fehlgeschlagen");
                self.hinweis(HinweisStufe::Fehler, HINWEIS_BEITRITT_FEHLGESCHLAGEN);
                if self.api_beigetreten {
                    if let Err(e) = self.api.verlassen(&meeting_id).await {
                        tracing::warn!(meeting = %meeting_id, fehler = %e, "API-Verlassen nach Fehlstart fehlgeschlagen");
                    }
                }
                self.abbau().await;
                self.beenden_mit(EndeGrund::Fehlgeschlagen);
                Err(e)
            }
        }
    }

    async fn beitreten(&mut self, meeting_id: &MeetingId) -> MeetingResult<()> {
        let info = self.api.meeting_abrufen(meeting_id).await?;
        self.timer = Some(SessionTimer::starten(info.dauer(), self.config.tick_intervall));
        self.roster = Roster::aus_meeting(&info);
        self.meeting = Some(info);
        self.status = SessionStatus::Beitretend;

        self.api.beitreten(meeting_id).await?;
        self.api_beigetreten = true;

        self.medien.acquire_local_media(self.config.medien).await?;

        let connector = self
            .connector
            .take()
            .ok_or_else(|| MeetingError::Beitritt("kein Bus-Connector".into()))?;
        let (kanal, mut ereignisse) = SignalingChannel::verbinden(
            connector,
            meeting_praefix(meeting_id),
            self.config.kanal.clone(),
        );
        self.kanal = Some(kanal);

        let verbunden = tokio::time::timeout(self.config.verbindungs_timeout, async {
            while let Some(e) = ereignisse.recv().await {
                match e {
                    KanalEreignis::Verbunden => return true,
                    KanalEreignis::Fehler(grund) => {
                        tracing::warn!(fehler = %grund, "Bus beim Beitritt nicht erreichbar, neuer Versuch folgt");
                    }
                    KanalEreignis::Getrennt => return false,
                }
            }
            false
        })
        .await;
        match verbunden {
            Ok(true) => {}
            Ok(false) => return Err(SignalingError::KanalGeschlossen.into()),
            Err(_) => {
                return Err(SignalingError::Timeout(format!(
                    "keine Bus-Verbindung nach {:?}",
                    self.config.verbindungs_timeout
                ))
                .into())
            }
        }
        self.kanal_ereignisse = Some(ereignisse);

        if let Some(kanal) = &self.kanal {
            for typ in SignalTyp::ALLE {
                kanal.subscribe(typ.as_str(), self.zustellungen_tx.clone());
            }
        }

        let join = SignalMessage::broadcast(
            SignalTyp::Join,
            self.config.teilnehmer_id.clone(),
            JoinPayload {
                user_name: self.config.teilnehmer_name.clone(),
                joined_at: Utc::now(),
            },
        )?;
        self.senden(&join);
        let eigene_id = self.config.teilnehmer_id.clone();
        self.roster
            .beigetreten(&eigene_id, Some(self.config.teilnehmer_name.clone()));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ereignis-Schleife
    // -----------------------------------------------------------------------

    /// Bedient die Session bis sie endet
    ///
    /// Ein geschlossener Befehls-Kanal verlaesst das Meeting.
    pub async fn run(&mut self, mut befehle: mpsc::Receiver<SessionBefehl>) -> MeetingResult<SessionEnde> {
        if self.ende.is_none() && self.status != SessionStatus::Aktiv {
            return Err(MeetingError::NichtAktiv);
        }

        loop {
            if let Some(ende) = &self.ende {
                return Ok(ende.clone());
            }

            tokio::select! {
                befehl = befehle.recv() => match befehl {
                    Some(befehl) => {
                        if let Err(e) = self.befehl_ausfuehren(befehl).await {
                            tracing::warn!(fehler = %e, art = ?e.art(), "Befehl fehlgeschlagen");
                        }
                    }
                    None => {
                        tracing::debug!("Befehls-Kanal geschlossen, Meeting wird verlassen");
                        self.leave().await?;
                    }
                },
                ereignis = self.naechstes_ereignis() => {
                    if let Some(ereignis) = ereignis {
                        self.ereignis_verarbeiten(ereignis).await;
                    }
                }
            }
        }
    }

    pub async fn befehl_ausfuehren(&mut self, befehl: SessionBefehl) -> MeetingResult<()> {
        match befehl {
            SessionBefehl::StummUmschalten => {
                self.toggle_mute()?;
            }
            SessionBefehl::VideoUmschalten => {
                self.toggle_video()?;
            }
            SessionBefehl::BildschirmUmschalten => {
                self.toggle_screen_share().await?;
            }
            SessionBefehl::AufzeichnungUmschalten => {
                self.toggle_recording().await?;
            }
            SessionBefehl::Chat(text) => {
                self.send_chat(&text)?;
            }
            SessionBefehl::Einladen(ids) => self.invite(&ids).await?,
            SessionBefehl::Verlassen => {
                self.leave().await?;
            }
            SessionBefehl::FuerAlleBeenden => {
                self.end_for_all().await?;
            }
        }
        Ok(())
    }

    /// Wartet auf das naechste Ereignis einer beliebigen Quelle
    pub async fn naechstes_ereignis(&mut self) -> Option<SessionEreignis> {
        let bildschirm = self.medien.bildschirm_beendet();

        tokio::select! {
            Some(z) = self.zustellungen_rx.recv() => Some(SessionEreignis::Zustellung(z)),
            Some(e) = self.peers.naechstes_ereignis() => Some(SessionEreignis::Peer(e)),
            Some(t) = timer_ereignis(&mut self.timer) => Some(SessionEreignis::Timer(t)),
            Some(k) = kanal_ereignis(&mut self.kanal_ereignisse) => Some(SessionEreignis::Kanal(k)),
            _ = bildschirm => Some(SessionEreignis::BildschirmBeendet),
            else => None,
        }
    }

    pub async fn ereignis_verarbeiten(&mut self, ereignis: SessionEreignis) {
        if self.status != SessionStatus::Aktiv {
            tracing::trace!(status = ?self.status, "Ereignis nach Session-Ende ignoriert");
            return;
        }

        match ereignis {
            SessionEreignis::Zustellung(z) => self.zustellung_verarbeiten(z).await,
            SessionEreignis::Peer(e) => {
                if let Some(nachricht) = self.peers.ereignis_verarbeiten(e) {
                    self.senden(&nachricht);
                }
            }
            SessionEreignis::Timer(TimerEreignis::Tick { verbleibend }) => {
                self.verbleibend = Some(verbleibend);
            }
            SessionEreignis::Timer(TimerEreignis::Abgelaufen) => {
                self.verbleibend = Some(Duration::ZERO);
                self.zeit_abgelaufen().await;
            }
            SessionEreignis::Kanal(KanalEreignis::Verbunden) => {
                tracing::info!("Signaling-Verbindung wiederhergestellt");
            }
            SessionEreignis::Kanal(KanalEreignis::Fehler(grund)) => {
                tracing::warn!(fehler = %grund, "Signaling-Verbindung gestoert");
            }
            SessionEreignis::Kanal(KanalEreignis::Getrennt) => {
                tracing::debug!("Signaling-Kanal getrennt");
            }
            SessionEreignis::BildschirmBeendet => {
                tracing::info!("Bildschirmfreigabe vom System beendet");
                self.medien.stop_screen_share(&mut self.peers);
            }
        }
    }

    async fn zustellung_verarbeiten(&mut self, zustellung: Zustellung) {
        let nachricht = match typ_aus_topic(&zustellung.topic)
            .and_then(|typ| SignalMessage::aus_koerper(typ, zustellung.body))
        {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(topic = %zustellung.topic, fehler = %e, "Ungueltige Nachricht verworfen");
                return;
            }
        };
        let sender = nachricht.sender_id.clone();
        let von_mir = sender == self.config.teilnehmer_id;

        match nachricht.typ {
            SignalTyp::Chat => {
                if let Err(e) = self.chat.empfangen(&nachricht) {
                    tracing::warn!(sender = %sender, fehler = %e, "Chat-Nachricht verworfen");
                }
                return;
            }
            SignalTyp::Join if !von_mir => {
                let name = nachricht
                    .payload_als::<JoinPayload>()
                    .ok()
                    .map(|p| p.user_name);
                tracing::info!(teilnehmer = %sender, "Teilnehmer beigetreten");
                self.roster.beigetreten(&sender, name);
            }
            SignalTyp::Leave if !von_mir => {
                let payload: LeavePayload = nachricht.payload_als().unwrap_or_default();
                tracing::info!(teilnehmer = %sender, grund = ?payload.reason, "Teilnehmer gegangen");
                self.roster.verlassen(&sender);
                self.peers.remove_peer(&sender);

                if payload.reason == LeaveGrund::MeetingEnded {
                    if self.meeting.as_ref().is_some_and(|m| m.ist_host(&sender)) {
                        self.vom_host_beendet().await;
                    } else {
                        tracing::warn!(teilnehmer = %sender, "Meeting-Ende von Nicht-Host ignoriert");
                    }
                }
                return;
            }
            _ => {}
        }

        let tracks = self.medien.lokale_tracks();
        if let Err(e) = self.peers.signal_verarbeiten(&nachricht, &tracks) {
            tracing::warn!(teilnehmer = %sender, fehler = %e, art = ?e.art(), "Signal nicht verarbeitet");
        }
    }

    // -----------------------------------------------------------------------
    // Beenden
    // -----------------------------------------------------------------------

    /// Verlaesst das Meeting; andere Teilnehmer bleiben verbunden
    pub async fn leave(&mut self) -> MeetingResult<SessionEnde> {
        if let Some(ende) = &self.ende {
            return Ok(ende.clone());
        }
        self.aktiv_pruefen()?;
        self.status = SessionStatus::Beendend;

        if let Some(id) = self.meeting_id.clone() {
            if let Err(e) = self.api.verlassen(&id).await {
                tracing::warn!(meeting = %id, fehler = %e, "API-Verlassen fehlgeschlagen");
            }
        }
        self.leave_senden(LeaveGrund::Left);
        self.abbau().await;
        Ok(self.beenden_mit(EndeGrund::Verlassen))
    }

    /// Beendet das Meeting fuer alle; nur der Host darf das
    pub async fn end_for_all(&mut self) -> MeetingResult<SessionEnde> {
        self.aktiv_pruefen()?;
        if !self.ist_host() {
            self.hinweis(HinweisStufe::Fehler, HINWEIS_NUR_HOST);
            return Err(MeetingError::Autorisierung(HINWEIS_NUR_HOST.into()));
        }
        self.status = SessionStatus::Beendend;

        if let Some(id) = self.meeting_id.clone() {
            if let Err(e) = self.api.beenden(&id).await {
                tracing::warn!(meeting = %id, fehler = %e, "API-Beenden fehlgeschlagen");
            }
        }
        self.leave_senden(LeaveGrund::MeetingEnded);
        self.abbau().await;
        tracing::info!("Meeting fuer alle beendet");
        Ok(self.beenden_mit(EndeGrund::FuerAlleBeendet))
    }

    async fn zeit_abgelaufen(&mut self) {
        self.status = SessionStatus::Beendend;
        self.hinweis(HinweisStufe::Warnung, HINWEIS_ZEIT_ABGELAUFEN);

        if let Some(id) = self.meeting_id.clone() {
            if let Err(e) = self.api.beenden(&id).await {
                tracing::warn!(meeting = %id, fehler = %e, "API-Beenden nach Zeitablauf fehlgeschlagen");
            }
        }
        self.leave_senden(LeaveGrund::Left);
        self.abbau().await;
        self.beenden_mit(EndeGrund::ZeitAbgelaufen);
    }

    async fn vom_host_beendet(&mut self) {
        self.status = SessionStatus::Beendend;
        self.hinweis(HinweisStufe::Info, HINWEIS_VOM_HOST_BEENDET);
        self.abbau().await;
        self.beenden_mit(EndeGrund::VomHostBeendet);
    }

    /// Gibt alle Ressourcen frei; jeder Schritt laeuft unabhaengig
    async fn abbau(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.abbrechen();
        }
        if let Some(kanal) = &self.kanal {
            for typ in SignalTyp::ALLE {
                kanal.unsubscribe(typ.as_str());
            }
        }
        self.peers.alle_entfernen();
        self.medien.cleanup().await;
        if let Some(kanal) = self.kanal.take() {
            kanal.disconnect();
        }
        self.kanal_ereignisse = None;
        tracing::debug!("Session-Ressourcen freigegeben");
    }

    fn beenden_mit(&mut self, grund: EndeGrund) -> SessionEnde {
        let ende = SessionEnde {
            grund,
            ziel: self.config.rolle.dashboard_pfad(),
        };
        self.status = SessionStatus::Beendet;
        self.ende = Some(ende.clone());
        tracing::info!(grund = ?grund, ziel = ende.ziel, "Session beendet");
        ende
    }

    fn aktiv_pruefen(&self) -> MeetingResult<()> {
        match (self.status, &self.ende) {
            (SessionStatus::Aktiv, _) => Ok(()),
            (
                _,
                Some(SessionEnde {
                    grund: EndeGrund::ZeitAbgelaufen,
                    ..
                }),
            ) => Err(MeetingError::SessionAbgelaufen),
            _ => Err(MeetingError::NichtAktiv),
        }
    }

    // -----------------------------------------------------------------------
    // Medien
    // -----------------------------------------------------------------------

    /// Gibt zurueck, ob das Mikrofon danach aktiv ist
    pub fn toggle_mute(&mut self) -> MeetingResult<bool> {
        self.aktiv_pruefen()?;
        Ok(self.medien.toggle_mute())
    }

    pub fn toggle_video(&mut self) -> MeetingResult<bool> {
        self.aktiv_pruefen()?;
        Ok(self.medien.toggle_video())
    }

    /// Gibt zurueck, ob danach eine Freigabe laeuft
    pub async fn toggle_screen_share(&mut self) -> MeetingResult<bool> {
        self.aktiv_pruefen()?;
        if self.medien.ist_bildschirm_aktiv() {
            self.medien.stop_screen_share(&mut self.peers);
            return Ok(false);
        }
        match self.medien.start_screen_share(&mut self.peers).await {
            Ok(_) => Ok(true),
            Err(MediaError::Abgebrochen) => {
                tracing::info!("Bildschirmauswahl abgebrochen");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Gibt zurueck, ob danach aufgezeichnet wird
    pub async fn toggle_recording(&mut self) -> MeetingResult<bool> {
        self.aktiv_pruefen()?;
        if self.medien.ist_aufzeichnung_aktiv() {
            if let Some(pfad) = self.medien.aufzeichnung_stoppen().await? {
                self.hinweis(
                    HinweisStufe::Info,
                    format!("Recording saved: {}", pfad.display()),
                );
            }
            return Ok(false);
        }
        let id = self.meeting_id.clone().ok_or(MeetingError::NichtAktiv)?;
        self.medien.aufzeichnung_starten(&id)?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Chat und Einladungen
    // -----------------------------------------------------------------------

    /// Sendet eine Chat-Nachricht; sie erscheint im Verlauf sobald der Bus
    /// sie zurueckliefert
    pub fn send_chat(&mut self, text: &str) -> MeetingResult<bool> {
        self.aktiv_pruefen()?;
        let kanal = self.kanal.as_ref().ok_or(MeetingError::NichtAktiv)?;
        Ok(self.chat.send_message(kanal, text)?)
    }

    /// Laedt Benutzer ein und aktualisiert danach die Teilnehmerliste
    pub async fn invite(&mut self, benutzer: &[ParticipantId]) -> MeetingResult<()> {
        self.aktiv_pruefen()?;
        if benutzer.is_empty() {
            return Ok(());
        }
        let id = self.meeting_id.clone().ok_or(MeetingError::NichtAktiv)?;

        if let Err(e) = self.api.einladen(&id, benutzer).await {
            tracing::warn!(meeting = %id, fehler = %e, "Einladung fehlgeschlagen");
            self.hinweis(HinweisStufe::Fehler, HINWEIS_EINLADUNG_FEHLER);
            return Err(e.into());
        }
        self.hinweis(HinweisStufe::Erfolg, HINWEIS_EINLADUNG_OK);

        match self.api.meeting_abrufen(&id).await {
            Ok(info) => {
                self.roster.abgleichen(&info);
                self.meeting = Some(info);
            }
            Err(e) => tracing::warn!(meeting = %id, fehler = %e, "Teilnehmerliste nicht aktualisiert"),
        }
        Ok(())
    }

    /// Alle Benutzer, die noch nicht auf der Teilnehmerliste stehen
    pub async fn einladbare_benutzer(&self) -> MeetingResult<Vec<Benutzer>> {
        let benutzer = self.api.benutzer_auflisten().await?;
        Ok(self.roster.einladbar(&benutzer))
    }

    // -----------------------------------------------------------------------
    // Hilfen
    // -----------------------------------------------------------------------

    fn senden(&self, nachricht: &SignalMessage) -> bool {
        let Some(kanal) = &self.kanal else {
            return false;
        };
        match nachricht.koerper() {
            Ok(body) => kanal.publish(nachricht.typ.as_str(), body),
            Err(e) => {
                tracing::warn!(typ = %nachricht.typ, fehler = %e, "Nachricht nicht serialisierbar");
                false
            }
        }
    }

    fn leave_senden(&self, grund: LeaveGrund) {
        match SignalMessage::broadcast(
            SignalTyp::Leave,
            self.config.teilnehmer_id.clone(),
            LeavePayload { reason: grund },
        ) {
            Ok(nachricht) => {
                self.senden(&nachricht);
            }
            Err(e) => tracing::warn!(fehler = %e, "Leave-Nachricht nicht erstellt"),
        }
    }

    fn hinweis(&mut self, stufe: HinweisStufe, text: impl Into<String>) {
        let text = text.into();
        tracing::info!(stufe = ?stufe, hinweis = %text, "Hinweis");
        let hinweis = Hinweis { stufe, text };
        let empfaenger_weg = self
            .hinweis_tx
            .as_ref()
            .is_some_and(|tx| tx.send(hinweis.clone()).is_err());
        if empfaenger_weg {
            self.hinweis_tx = None;
        }
        self.hinweise.push(hinweis);
    }
}

async fn timer_ereignis(timer: &mut Option<SessionTimer>) -> Option<TimerEreignis> {
    match timer {
        Some(t) if t.laeuft() => t.naechstes_ereignis().await,
        _ => std::future::pending().await,
    }
}

async fn kanal_ereignis(
    ereignisse: &mut Option<mpsc::UnboundedReceiver<KanalEreignis>>,
) -> Option<KanalEreignis> {
    match ereignisse {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
