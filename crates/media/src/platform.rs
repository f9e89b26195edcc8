//! Plattform-Abstraktion fuer Kamera, Mikrofon, Bildschirm und Recorder

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::MediaResult;
use crate::track::{LokalerStream, MediaTrack};

/// Welche lokalen Medien angefordert werden
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MedienAnforderung {
    pub audio: bool,
    pub video: bool,
}

impl Default for MedienAnforderung {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Zugriff auf die Medien-Geraete des Systems
#[allow(async_fn_in_trait)]
pub trait MediaPlatform {
    /// Kamera und/oder Mikrofon oeffnen
    async fn kamera_und_mikrofon(&self, anforderung: MedienAnforderung)
        -> MediaResult<LokalerStream>;

    /// Bildschirm-Aufnahme starten (eigener Stream mit einem Video-Track)
    async fn bildschirm_aufnehmen(&self) -> MediaResult<LokalerStream>;

    /// Recorder fuer `stream` starten; liefert kodierte Chunks bis der
    /// Empfaenger gedroppt wird
    fn aufnahme_starten(&self, stream: &LokalerStream) -> MediaResult<mpsc::Receiver<Bytes>>;
}

/// Ziel fuer ausgehendes Video (alle Peer-Verbindungen)
pub trait VideoSenke {
    /// Ersetzt den ausgehenden Video-Track auf jeder lebenden Verbindung;
    /// gibt die Anzahl der aktualisierten Verbindungen zurueck
    fn video_ersetzen(&mut self, track: &MediaTrack) -> usize;
}
