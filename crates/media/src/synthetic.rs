//! Synthetische Medien-Plattform ohne echte Geraete
//!
//! Liefert Tracks ohne Inhalt und einen Recorder, der Platzhalter-Chunks
//! erzeugt. Fehlerfaelle (verweigerte Berechtigung, fehlendes Geraet,
//! abgebrochene Freigabe) lassen sich zur Laufzeit einschalten.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::{MediaError, MediaResult};
use crate::platform::{MediaPlatform, MedienAnforderung};
use crate::track::{LokalerStream, MediaTrack, TrackQuelle};

const WEBM_KOPF: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];
const CHUNK_INTERVALL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct PlattformInner {
    verweigern: AtomicBool,
    kein_geraet: AtomicBool,
    abbrechen: AtomicBool,
    kamera_anfragen: AtomicUsize,
    letzter_bildschirm: Mutex<Option<MediaTrack>>,
}

/// Plattform fuer Tests und den Headless-Client
#[derive(Clone, Default)]
pub struct SynthetischePlattform {
    inner: Arc<PlattformInner>,
}

impl SynthetischePlattform {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Kamera/Mikrofon-Anfragen schlagen mit `BerechtigungVerweigert` fehl
    pub fn berechtigung_verweigern(&self, an: bool) {
        self.inner.verweigern.store(an, Ordering::SeqCst);
    }

    /// Kamera/Mikrofon-Anfragen schlagen mit `GeraetNichtGefunden` fehl
    pub fn kein_geraet(&self, an: bool) {
        self.inner.kein_geraet.store(an, Ordering::SeqCst);
    }

    /// Die Bildschirmauswahl wird vom Benutzer abgebrochen
    pub fn bildschirm_abbrechen(&self, an: bool) {
        self.inner.abbrechen.store(an, Ordering::SeqCst);
    }

    pub fn kamera_anfragen(&self) -> usize {
        self.inner.kamera_anfragen.load(Ordering::SeqCst)
    }

    /// Video-Track der zuletzt gestarteten Bildschirmfreigabe
    pub fn letzter_bildschirm(&self) -> Option<MediaTrack> {
        self.inner.letzter_bildschirm.lock().clone()
    }
}

impl MediaPlatform for SynthetischePlattform {
    async fn kamera_und_mikrofon(
        &self,
        anforderung: MedienAnforderung,
    ) -> MediaResult<LokalerStream> {
        self.inner.kamera_anfragen.fetch_add(1, Ordering::SeqCst);
        if self.inner.verweigern.load(Ordering::SeqCst) {
            return Err(MediaError::BerechtigungVerweigert("NotAllowedError".into()));
        }
        if self.inner.kein_geraet.load(Ordering::SeqCst) {
            return Err(MediaError::GeraetNichtGefunden("NotFoundError".into()));
        }

        let mut tracks = Vec::with_capacity(2);
        if anforderung.audio {
            tracks.push(MediaTrack::neu(TrackQuelle::Mikrofon));
        }
        if anforderung.video {
            tracks.push(MediaTrack::neu(TrackQuelle::Kamera));
        }
        Ok(LokalerStream::neu(tracks))
    }

    async fn bildschirm_aufnehmen(&self) -> MediaResult<LokalerStream> {
        if self.inner.abbrechen.load(Ordering::SeqCst) {
            return Err(MediaError::Abgebrochen);
        }
        let track = MediaTrack::neu(TrackQuelle::Bildschirm);
        *self.inner.letzter_bildschirm.lock() = Some(track.clone());
        Ok(LokalerStream::neu(vec![track]))
    }

    fn aufnahme_starten(&self, stream: &LokalerStream) -> MediaResult<mpsc::Receiver<Bytes>> {
        if stream.tracks().is_empty() {
            return Err(MediaError::Aufnahme("Stream ohne Tracks".into()));
        }
        let tracks = stream.tracks().to_vec();
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            if tx.send(Bytes::from_static(WEBM_KOPF)).await.is_err() {
                return;
            }
            let mut intervall = tokio::time::interval(CHUNK_INTERVALL);
            intervall.tick().await;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = intervall.tick() => {
                        if tracks.iter().all(|t| t.ist_gestoppt()) {
                            break;
                        }
                        if tx.send(Bytes::from(vec![0u8; 64])).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}
