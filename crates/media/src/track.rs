//! Medien-Tracks und lokale Streams
//!
//! Ein [`MediaTrack`] ist ein geteilter Handle (`Arc`): Peers haengen ihn
//! nur an, aktivieren/deaktivieren und stoppen kann ihn nur der
//! `MediaController`. Die Plattform kann einen Track von aussen beenden
//! (z.B. "Freigabe beenden" im Betriebssystem).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// Audio oder Video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackArt {
    Audio,
    Video,
}

/// Herkunft eines Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackQuelle {
    Mikrofon,
    Kamera,
    Bildschirm,
}

impl TrackQuelle {
    pub fn art(&self) -> TrackArt {
        match self {
            Self::Mikrofon => TrackArt::Audio,
            Self::Kamera | Self::Bildschirm => TrackArt::Video,
        }
    }
}

struct TrackInner {
    id: Uuid,
    quelle: TrackQuelle,
    aktiviert: AtomicBool,
    gestoppt: AtomicBool,
    extern_beendet: AtomicBool,
    beendet_signal: Notify,
}

/// Geteilter Handle auf einen Medien-Track
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Erstellt einen aktiven Track
    pub fn neu(quelle: TrackQuelle) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4(),
                quelle,
                aktiviert: AtomicBool::new(true),
                gestoppt: AtomicBool::new(false),
                extern_beendet: AtomicBool::new(false),
                beendet_signal: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn art(&self) -> TrackArt {
        self.inner.quelle.art()
    }

    pub fn quelle(&self) -> TrackQuelle {
        self.inner.quelle
    }

    pub fn ist_aktiviert(&self) -> bool {
        self.inner.aktiviert.load(Ordering::SeqCst)
    }

    pub fn ist_gestoppt(&self) -> bool {
        self.inner.gestoppt.load(Ordering::SeqCst)
    }

    pub(crate) fn aktiviert_setzen(&self, aktiviert: bool) {
        self.inner.aktiviert.store(aktiviert, Ordering::SeqCst);
    }

    pub(crate) fn stoppen(&self) {
        self.inner.gestoppt.store(true, Ordering::SeqCst);
    }

    /// Die Plattform hat den Track beendet (Geraet weg, Freigabe gestoppt)
    pub fn extern_beenden(&self) {
        self.inner.gestoppt.store(true, Ordering::SeqCst);
        self.inner.extern_beendet.store(true, Ordering::SeqCst);
        self.inner.beendet_signal.notify_waiters();
    }

    /// Wartet bis die Plattform den Track beendet
    ///
    /// Ein Stopp durch den Controller loest dieses Future nicht aus.
    pub async fn beendet(&self) {
        loop {
            let benachrichtigt = self.inner.beendet_signal.notified();
            tokio::pin!(benachrichtigt);
            benachrichtigt.as_mut().enable();
            if self.inner.extern_beendet.load(Ordering::SeqCst) {
                return;
            }
            benachrichtigt.await;
        }
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for MediaTrack {}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("quelle", &self.inner.quelle)
            .field("aktiviert", &self.ist_aktiviert())
            .field("gestoppt", &self.ist_gestoppt())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LokalerStream
// ---------------------------------------------------------------------------

/// Zusammengehoerige Tracks einer Aufnahme (Kamera+Mikrofon oder Bildschirm)
#[derive(Debug, Clone, Default)]
pub struct LokalerStream {
    tracks: Vec<MediaTrack>,
}

impl LokalerStream {
    pub fn neu(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.art() == TrackArt::Audio)
    }

    pub fn video(&self) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.art() == TrackArt::Video)
    }

    pub(crate) fn stoppen(&self) {
        for track in &self.tracks {
            track.stoppen();
        }
    }
}
