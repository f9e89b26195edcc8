//! Synthetischer Peer-Transport
//!
//! Erzeugt Angebote, Antworten und Kandidaten ohne echten Medienstack und
//! protokolliert jeden Aufruf. Mit `auto_verbinden` meldet ein Transport
//! nach der ersten angewendeten Session-Description einen Remote-Stream
//! und `Verbunden`.

use empowerly_core::ParticipantId;
use empowerly_media::{MediaTrack, TrackQuelle};
use empowerly_protocol::{IceKandidat, SdpArt, SdpPayload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{MeshError, MeshResult};
use crate::peer::{
    PeerEreignisArt, PeerFabrik, PeerKontext, PeerSignal, PeerTransport, RemoteStream,
};

/// Ein protokollierter Transport-Aufruf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtokollEintrag {
    Erstellt {
        teilnehmer: ParticipantId,
        initiator: bool,
    },
    AngebotErstellt {
        teilnehmer: ParticipantId,
    },
    AngebotAngewendet {
        teilnehmer: ParticipantId,
    },
    AntwortAngewendet {
        teilnehmer: ParticipantId,
    },
    KandidatAngewendet {
        teilnehmer: ParticipantId,
    },
    VideoErsetzt {
        teilnehmer: ParticipantId,
        track: Uuid,
    },
    Geschlossen {
        teilnehmer: ParticipantId,
    },
}

#[derive(Default)]
struct FabrikInner {
    protokoll: Mutex<Vec<ProtokollEintrag>>,
    videos: Mutex<HashMap<ParticipantId, Uuid>>,
    auto_verbinden: AtomicBool,
    scheitern: AtomicBool,
}

impl FabrikInner {
    fn eintragen(&self, eintrag: ProtokollEintrag) {
        self.protokoll.lock().push(eintrag);
    }
}

/// Fabrik fuer synthetische Transports; Klone teilen das Protokoll
#[derive(Clone, Default)]
pub struct SynthetischeFabrik {
    inner: Arc<FabrikInner>,
}

impl SynthetischeFabrik {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn auto_verbinden(&self, an: bool) {
        self.inner.auto_verbinden.store(an, Ordering::SeqCst);
    }

    /// Jedes angewendete Signal schlaegt fehl
    pub fn verhandlung_scheitern(&self, an: bool) {
        self.inner.scheitern.store(an, Ordering::SeqCst);
    }

    pub fn protokoll(&self) -> Vec<ProtokollEintrag> {
        self.inner.protokoll.lock().clone()
    }

    /// Anzahl erzeugter Angebote an `teilnehmer`
    pub fn angebote_an(&self, teilnehmer: &ParticipantId) -> usize {
        self.inner
            .protokoll
            .lock()
            .iter()
            .filter(|e| matches!(e, ProtokollEintrag::AngebotErstellt { teilnehmer: t } if t == teilnehmer))
            .count()
    }

    /// Id des Video-Tracks, den die Verbindung zu `teilnehmer` zuletzt sendet
    pub fn aktuelles_video(&self, teilnehmer: &ParticipantId) -> Option<Uuid> {
        self.inner.videos.lock().get(teilnehmer).copied()
    }
}

impl PeerFabrik for SynthetischeFabrik {
    type Transport = SynthetischerTransport;

    fn erstellen(&self, kontext: PeerKontext) -> MeshResult<SynthetischerTransport> {
        self.inner.eintragen(ProtokollEintrag::Erstellt {
            teilnehmer: kontext.teilnehmer.clone(),
            initiator: kontext.initiator,
        });
        if let Some(video) = kontext.tracks.iter().find(|t| t.quelle() != TrackQuelle::Mikrofon) {
            self.inner
                .videos
                .lock()
                .insert(kontext.teilnehmer.clone(), video.id());
        }

        let transport = SynthetischerTransport {
            kontext,
            inner: Arc::clone(&self.inner),
            remote: None,
            geschlossen: false,
        };

        if transport.kontext.initiator {
            transport.inner.eintragen(ProtokollEintrag::AngebotErstellt {
                teilnehmer: transport.kontext.teilnehmer.clone(),
            });
            transport.kontext.melden(PeerEreignisArt::Signal(PeerSignal::Angebot(
                transport.sdp(SdpArt::Offer),
            )));
            transport.kandidat_melden();
        }
        Ok(transport)
    }
}

/// Transport ohne Medien
pub struct SynthetischerTransport {
    kontext: PeerKontext,
    inner: Arc<FabrikInner>,
    /// Starke Referenz; die Registry haelt nur eine schwache
    remote: Option<Arc<RemoteStream>>,
    geschlossen: bool,
}

impl SynthetischerTransport {
    fn sdp(&self, art: SdpArt) -> SdpPayload {
        SdpPayload {
            art,
            sdp: format!(
                "v=0\r\no={} {} 1 IN IP4 127.0.0.1\r\ns=-\r\n",
                self.kontext.eigene_id, self.kontext.generation
            ),
        }
    }

    fn kandidat_melden(&self) {
        self.kontext
            .melden(PeerEreignisArt::Signal(PeerSignal::Kandidat(IceKandidat {
                candidate: format!(
                    "candidate:{} 1 udp 2122260223 127.0.0.1 9 typ host",
                    self.kontext.generation
                ),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            })));
    }

    fn verbinden(&mut self) {
        if !self.inner.auto_verbinden.load(Ordering::SeqCst) || self.remote.is_some() {
            return;
        }
        let stream = Arc::new(RemoteStream {
            teilnehmer: self.kontext.teilnehmer.clone(),
            tracks: vec![
                MediaTrack::neu(TrackQuelle::Mikrofon),
                MediaTrack::neu(TrackQuelle::Kamera),
            ],
        });
        self.kontext
            .melden(PeerEreignisArt::RemoteStream(Arc::clone(&stream)));
        self.kontext.melden(PeerEreignisArt::Verbunden);
        self.remote = Some(stream);
    }
}

impl PeerTransport for SynthetischerTransport {
    fn signal_anwenden(&mut self, signal: PeerSignal) -> MeshResult<()> {
        if self.geschlossen {
            return Ok(());
        }
        if self.inner.scheitern.load(Ordering::SeqCst) {
            return Err(MeshError::verhandlung(
                &self.kontext.teilnehmer,
                "synthetischer Verhandlungsfehler",
            ));
        }
        let teilnehmer = self.kontext.teilnehmer.clone();
        match signal {
            PeerSignal::Angebot(_) => {
                self.inner
                    .eintragen(ProtokollEintrag::AngebotAngewendet { teilnehmer });
                self.kontext
                    .melden(PeerEreignisArt::Signal(PeerSignal::Antwort(
                        self.sdp(SdpArt::Answer),
                    )));
                self.kandidat_melden();
                self.verbinden();
            }
            PeerSignal::Antwort(_) => {
                self.inner
                    .eintragen(ProtokollEintrag::AntwortAngewendet { teilnehmer });
                self.verbinden();
            }
            PeerSignal::Kandidat(_) => {
                self.inner
                    .eintragen(ProtokollEintrag::KandidatAngewendet { teilnehmer });
            }
        }
        Ok(())
    }

    fn video_ersetzen(&mut self, track: &MediaTrack) {
        if self.geschlossen {
            return;
        }
        self.inner.eintragen(ProtokollEintrag::VideoErsetzt {
            teilnehmer: self.kontext.teilnehmer.clone(),
            track: track.id(),
        });
        self.inner
            .videos
            .lock()
            .insert(self.kontext.teilnehmer.clone(), track.id());
    }

    fn schliessen(&mut self) {
        if self.geschlossen {
            return;
        }
        self.geschlossen = true;
        self.remote = None;
        self.inner.eintragen(ProtokollEintrag::Geschlossen {
            teilnehmer: self.kontext.teilnehmer.clone(),
        });
    }
}
