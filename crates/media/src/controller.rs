//! MediaController – besitzt die lokalen Streams einer Session
//!
//! ```text
//! lokal:      [Mikrofon] [Kamera]      <- acquire_local_media()
//! bildschirm: [Bildschirm]             <- start_screen_share()
//!
//! ausgehendes Video = Bildschirm falls aktiv, sonst Kamera
//! ```
//!
//! Stumm-/Videoschaltung kippt nur das `aktiviert`-Flag des geteilten
//! Tracks; Peers muessen dafuer nicht neu verhandeln.

use empowerly_core::MeetingId;
use std::future::Future;
use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};
use crate::platform::{MediaPlatform, MedienAnforderung, VideoSenke};
use crate::recording::Aufzeichnung;
use crate::track::{LokalerStream, MediaTrack};

pub struct MediaController<P: MediaPlatform> {
    plattform: P,
    lokal: Option<LokalerStream>,
    bildschirm: Option<LokalerStream>,
    aufzeichnung: Option<Aufzeichnung>,
    aufnahme_verzeichnis: PathBuf,
}

impl<P: MediaPlatform> MediaController<P> {
    pub fn neu(plattform: P, aufnahme_verzeichnis: impl Into<PathBuf>) -> Self {
        Self {
            plattform,
            lokal: None,
            bildschirm: None,
            aufzeichnung: None,
            aufnahme_verzeichnis: aufnahme_verzeichnis.into(),
        }
    }

    pub fn plattform(&self) -> &P {
        &self.plattform
    }

    /// Oeffnet Kamera und Mikrofon
    ///
    /// Zugriffsfehler werden ohne erneuten Versuch weitergegeben. Ein bereits
    /// erfasster Stream wird wiederverwendet.
    pub async fn acquire_local_media(
        &mut self,
        anforderung: MedienAnforderung,
    ) -> MediaResult<&LokalerStream> {
        if self.lokal.is_none() {
            let stream = self
                .plattform
                .kamera_und_mikrofon(anforderung)
                .await
                .inspect_err(|e| tracing::error!(fehler = %e, "Lokale Medien nicht verfuegbar"))?;
            tracing::info!(tracks = stream.tracks().len(), "Lokale Medien erfasst");
            self.lokal = Some(stream);
        }
        self.lokal.as_ref().ok_or(MediaError::NichtErfasst)
    }

    pub fn lokaler_stream(&self) -> Option<&LokalerStream> {
        self.lokal.as_ref()
    }

    /// Schaltet das Mikrofon um und gibt den neuen `aktiviert`-Zustand zurueck
    pub fn toggle_mute(&mut self) -> bool {
        let Some(track) = self.lokal.as_ref().and_then(|s| s.audio()) else {
            return false;
        };
        let aktiv = !track.ist_aktiviert();
        track.aktiviert_setzen(aktiv);
        tracing::debug!(aktiv, "Mikrofon umgeschaltet");
        aktiv
    }

    /// Schaltet die Kamera um und gibt den neuen `aktiviert`-Zustand zurueck
    pub fn toggle_video(&mut self) -> bool {
        let Some(track) = self.lokal.as_ref().and_then(|s| s.video()) else {
            return false;
        };
        let aktiv = !track.ist_aktiviert();
        track.aktiviert_setzen(aktiv);
        tracing::debug!(aktiv, "Kamera umgeschaltet");
        aktiv
    }

    pub fn ist_audio_aktiv(&self) -> bool {
        self.lokal
            .as_ref()
            .and_then(|s| s.audio())
            .is_some_and(|t| t.ist_aktiviert())
    }

    pub fn ist_video_aktiv(&self) -> bool {
        self.lokal
            .as_ref()
            .and_then(|s| s.video())
            .is_some_and(|t| t.ist_aktiviert())
    }

    pub fn ist_bildschirm_aktiv(&self) -> bool {
        self.bildschirm.is_some()
    }

    /// Video, das neue Peers bekommen: Bildschirm falls aktiv, sonst Kamera
    pub fn ausgehendes_video(&self) -> Option<&MediaTrack> {
        self.bildschirm
            .as_ref()
            .and_then(|s| s.video())
            .or_else(|| self.lokal.as_ref().and_then(|s| s.video()))
    }

    /// Tracks fuer eine neue Peer-Verbindung
    pub fn lokale_tracks(&self) -> Vec<MediaTrack> {
        let mut tracks = Vec::with_capacity(2);
        if let Some(audio) = self.lokal.as_ref().and_then(|s| s.audio()) {
            tracks.push(audio.clone());
        }
        if let Some(video) = self.ausgehendes_video() {
            tracks.push(video.clone());
        }
        tracks
    }

    /// Startet die Bildschirmfreigabe und ersetzt das Video auf allen Peers
    pub async fn start_screen_share(&mut self, senke: &mut impl VideoSenke) -> MediaResult<usize> {
        if self.bildschirm.is_some() {
            return Ok(0);
        }
        let stream = self.plattform.bildschirm_aufnehmen().await?;
        let Some(track) = stream.video().cloned() else {
            stream.stoppen();
            return Err(MediaError::GeraetNichtGefunden("Bildschirm ohne Video-Track".into()));
        };
        self.bildschirm = Some(stream);
        let ersetzt = senke.video_ersetzen(&track);
        tracing::info!(peers = ersetzt, "Bildschirmfreigabe gestartet");
        Ok(ersetzt)
    }

    /// Beendet die Bildschirmfreigabe und stellt die Kamera wieder her
    ///
    /// Ohne laufende Freigabe passiert nichts.
    pub fn stop_screen_share(&mut self, senke: &mut impl VideoSenke) -> usize {
        let Some(stream) = self.bildschirm.take() else {
            return 0;
        };
        stream.stoppen();
        let ersetzt = match self.lokal.as_ref().and_then(|s| s.video()) {
            Some(kamera) => senke.video_ersetzen(kamera),
            None => 0,
        };
        tracing::info!(peers = ersetzt, "Bildschirmfreigabe beendet");
        ersetzt
    }

    /// Future, das fertig wird wenn das System die Freigabe beendet
    ///
    /// Ohne Freigabe bleibt es fuer immer ausstehend.
    pub fn bildschirm_beendet(&self) -> impl Future<Output = ()> + Send + 'static {
        let track = self.bildschirm.as_ref().and_then(|s| s.video()).cloned();
        async move {
            match track {
                Some(t) => t.beendet().await,
                None => std::future::pending().await,
            }
        }
    }

    /// Startet die lokale Aufzeichnung des eigenen Streams
    pub fn aufzeichnung_starten(&mut self, meeting_id: &MeetingId) -> MediaResult<()> {
        if self.aufzeichnung.is_some() {
            return Ok(());
        }
        let stream = self.lokal.as_ref().ok_or(MediaError::NichtErfasst)?;
        let chunks = self.plattform.aufnahme_starten(stream)?;
        self.aufzeichnung = Some(Aufzeichnung::starten(
            meeting_id.clone(),
            &self.aufnahme_verzeichnis,
            chunks,
        ));
        Ok(())
    }

    /// Stoppt die Aufzeichnung; `None` wenn keine lief
    pub async fn aufzeichnung_stoppen(&mut self) -> MediaResult<Option<PathBuf>> {
        match self.aufzeichnung.take() {
            Some(a) => a.stoppen().await.map(Some),
            None => Ok(None),
        }
    }

    pub fn ist_aufzeichnung_aktiv(&self) -> bool {
        self.aufzeichnung.is_some()
    }

    /// Stoppt alle Tracks beider Streams und eine laufende Aufzeichnung
    pub async fn cleanup(&mut self) {
        if let Err(e) = self.aufzeichnung_stoppen().await {
            tracing::warn!(fehler = %e, "Aufzeichnung konnte nicht gespeichert werden");
        }
        if let Some(s) = self.bildschirm.take() {
            s.stoppen();
        }
        if let Some(s) = self.lokal.take() {
            s.stoppen();
        }
        tracing::debug!("Lokale Medien freigegeben");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SynthetischePlattform;
    use crate::track::TrackQuelle;

    /// Merkt sich jeden ersetzten Track
    #[derive(Default)]
    struct TestSenke {
        peers: usize,
        ersetzt: Vec<MediaTrack>,
    }

    impl VideoSenke for TestSenke {
        fn video_ersetzen(&mut self, track: &MediaTrack) -> usize {
            self.ersetzt.push(track.clone());
            self.peers
        }
    }

    fn controller() -> MediaController<SynthetischePlattform> {
        MediaController::neu(SynthetischePlattform::neu(), std::env::temp_dir())
    }

    #[tokio::test]
    async fn doppeltes_stummschalten_stellt_zustand_wieder_her() {
        let mut mc = controller();
        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        assert!(mc.ist_audio_aktiv());
        assert!(!mc.toggle_mute());
        assert!(!mc.ist_audio_aktiv());
        assert!(mc.toggle_mute());
        assert!(mc.ist_audio_aktiv());
    }

    #[tokio::test]
    async fn video_umschalten_kippt_nur_das_flag() {
        let mut mc = controller();
        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        let vorher = mc.ausgehendes_video().cloned().unwrap();
        assert!(!mc.toggle_video());
        assert_eq!(mc.ausgehendes_video(), Some(&vorher));
        assert!(!vorher.ist_aktiviert());
    }

    #[tokio::test]
    async fn umschalten_ohne_medien_liefert_false() {
        let mut mc = controller();
        assert!(!mc.toggle_mute());
        assert!(!mc.toggle_video());
    }

    #[tokio::test]
    async fn verweigerte_berechtigung_wird_weitergegeben() {
        let plattform = SynthetischePlattform::neu();
        plattform.berechtigung_verweigern(true);
        let mut mc = MediaController::neu(plattform, std::env::temp_dir());
        let fehler = mc
            .acquire_local_media(MedienAnforderung::default())
            .await
            .unwrap_err();
        assert!(matches!(fehler, MediaError::BerechtigungVerweigert(_)));
        assert!(fehler.ist_zugriffsfehler());
        assert!(mc.lokaler_stream().is_none());
        assert_eq!(mc.plattform().kamera_anfragen(), 1, "kein erneuter Versuch");
    }

    #[tokio::test]
    async fn bildschirmfreigabe_hin_und_zurueck() {
        let mut mc = controller();
        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        let kamera = mc.ausgehendes_video().cloned().unwrap();
        let mut senke = TestSenke {
            peers: 2,
            ..Default::default()
        };

        assert_eq!(mc.start_screen_share(&mut senke).await.unwrap(), 2);
        assert!(mc.ist_bildschirm_aktiv());
        let bildschirm = mc.ausgehendes_video().cloned().unwrap();
        assert_eq!(bildschirm.quelle(), TrackQuelle::Bildschirm);
        assert_eq!(mc.lokale_tracks().len(), 2);

        assert_eq!(mc.stop_screen_share(&mut senke), 2);
        assert!(bildschirm.ist_gestoppt());
        assert_eq!(mc.ausgehendes_video(), Some(&kamera));
        assert_eq!(senke.ersetzt, vec![bildschirm, kamera]);

        // Zweites Stoppen ist wirkungslos
        assert_eq!(mc.stop_screen_share(&mut senke), 0);
        assert_eq!(senke.ersetzt.len(), 2);
    }

    #[tokio::test]
    async fn abgebrochene_freigabe_aendert_nichts() {
        let mut mc = controller();
        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        mc.plattform().bildschirm_abbrechen(true);
        let mut senke = TestSenke::default();
        assert!(matches!(
            mc.start_screen_share(&mut senke).await,
            Err(MediaError::Abgebrochen)
        ));
        assert!(!mc.ist_bildschirm_aktiv());
        assert!(senke.ersetzt.is_empty());
    }

    #[tokio::test]
    async fn systemseitiges_ende_der_freigabe() {
        let mut mc = controller();
        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        let mut senke = TestSenke::default();
        mc.start_screen_share(&mut senke).await.unwrap();

        let beendet = mc.bildschirm_beendet();
        mc.plattform().letzter_bildschirm().unwrap().extern_beenden();
        tokio::time::timeout(std::time::Duration::from_secs(1), beendet)
            .await
            .expect("Ende der Freigabe muss gemeldet werden");
    }

    #[tokio::test]
    async fn cleanup_ohne_medien_ist_sicher() {
        let mut mc = controller();
        mc.cleanup().await;
        mc.cleanup().await;
        assert!(mc.lokaler_stream().is_none());
    }

    #[tokio::test]
    async fn cleanup_stoppt_alle_tracks() {
        let mut mc = controller();
        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        let mut senke = TestSenke::default();
        mc.start_screen_share(&mut senke).await.unwrap();
        let alle: Vec<MediaTrack> = mc
            .lokaler_stream()
            .unwrap()
            .tracks()
            .iter()
            .cloned()
            .chain(mc.ausgehendes_video().cloned())
            .collect();

        mc.cleanup().await;
        assert!(alle.iter().all(|t| t.ist_gestoppt()));
        assert!(!mc.ist_bildschirm_aktiv());
    }

    #[tokio::test]
    async fn aufzeichnung_schreibt_datei() {
        let dir = tempfile::tempdir().unwrap();
        let mut mc = MediaController::neu(SynthetischePlattform::neu(), dir.path());
        let id = MeetingId::neu("m9").unwrap();

        assert!(matches!(
            mc.aufzeichnung_starten(&id),
            Err(MediaError::NichtErfasst)
        ));

        mc.acquire_local_media(MedienAnforderung::default()).await.unwrap();
        mc.aufzeichnung_starten(&id).unwrap();
        assert!(mc.ist_aufzeichnung_aktiv());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let pfad = mc.aufzeichnung_stoppen().await.unwrap().unwrap();
        assert!(pfad.starts_with(dir.path()));
        assert!(!std::fs::read(&pfad).unwrap().is_empty());
        assert!(mc.aufzeichnung_stoppen().await.unwrap().is_none());
    }
}
