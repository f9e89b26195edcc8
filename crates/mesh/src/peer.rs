//! Eine Peer-Verbindung zu genau einem entfernten Teilnehmer
//!
//! ## Zustandsmaschine
//!
//! ```text
//! Neu -> Verhandelnd -> Verbunden
//!  |          |             |
//!  +----------+-------------+--> Geschlossen (terminal)
//! ```
//!
//! Der eigentliche Medientransport (WebRTC-Stack, synthetisch in Tests)
//! steckt hinter [`PeerTransport`]. Er meldet ausgehende Signale und
//! Zustandswechsel asynchron ueber die Ereignis-Queue im [`PeerKontext`].

use empowerly_core::ParticipantId;
use empowerly_media::MediaTrack;
use empowerly_protocol::{IceKandidat, SdpPayload};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use crate::error::MeshResult;

/// Verbindungszustand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerZustand {
    Neu,
    Verhandelnd,
    Verbunden,
    Geschlossen,
}

/// Empfangene Medien eines Teilnehmers
#[derive(Debug)]
pub struct RemoteStream {
    pub teilnehmer: ParticipantId,
    pub tracks: Vec<MediaTrack>,
}

/// Signal zwischen zwei Transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerSignal {
    Angebot(SdpPayload),
    Antwort(SdpPayload),
    Kandidat(IceKandidat),
}

/// Was ein Transport meldet
#[derive(Debug, Clone)]
pub enum PeerEreignisArt {
    /// Ausgehendes Signal an den Teilnehmer
    Signal(PeerSignal),
    /// Medien fliessen
    Verbunden,
    /// Empfangener Stream; der Transport haelt die starke Referenz
    RemoteStream(Arc<RemoteStream>),
    /// ICE- oder Transportfehler
    Fehler(String),
    /// Gegenseite hat geschlossen
    Geschlossen,
}

/// Ereignis eines Transports, markiert mit Teilnehmer und Generation
#[derive(Debug, Clone)]
pub struct PeerEreignis {
    pub teilnehmer: ParticipantId,
    /// Ereignisse einer ersetzten Verbindung tragen eine alte Generation
    pub generation: u64,
    pub art: PeerEreignisArt,
}

/// Alles, was ein Transport bei der Erstellung bekommt
#[derive(Debug, Clone)]
pub struct PeerKontext {
    pub eigene_id: ParticipantId,
    pub teilnehmer: ParticipantId,
    pub initiator: bool,
    pub generation: u64,
    /// Lokale Tracks, die an die Verbindung gehaengt werden
    pub tracks: Vec<MediaTrack>,
    pub ereignisse: mpsc::UnboundedSender<PeerEreignis>,
}

impl PeerKontext {
    /// Meldet ein Ereignis an die Registry
    pub fn melden(&self, art: PeerEreignisArt) {
        let _ = self.ereignisse.send(PeerEreignis {
            teilnehmer: self.teilnehmer.clone(),
            generation: self.generation,
            art,
        });
    }
}

/// Medientransport zu einem Teilnehmer
///
/// Ein Initiator-Transport meldet sein Angebot direkt nach der Erstellung.
pub trait PeerTransport {
    /// Wendet ein empfangenes Signal an
    fn signal_anwenden(&mut self, signal: PeerSignal) -> MeshResult<()>;

    /// Ersetzt den ausgehenden Video-Track ohne Neuverhandlung
    fn video_ersetzen(&mut self, track: &MediaTrack);

    /// Gibt alle Ressourcen frei; weitere Ereignisse werden ignoriert
    fn schliessen(&mut self);
}

/// Erstellt Transports fuer neue Peer-Verbindungen
pub trait PeerFabrik {
    type Transport: PeerTransport;

    fn erstellen(&self, kontext: PeerKontext) -> MeshResult<Self::Transport>;
}

// ---------------------------------------------------------------------------
// PeerConnection
// ---------------------------------------------------------------------------

/// Verbindung zu einem entfernten Teilnehmer, im Besitz der Registry
pub struct PeerConnection<T: PeerTransport> {
    teilnehmer: ParticipantId,
    initiator: bool,
    generation: u64,
    zustand: PeerZustand,
    transport: T,
    remote: Weak<RemoteStream>,
}

impl<T: PeerTransport> PeerConnection<T> {
    pub(crate) fn neu(teilnehmer: ParticipantId, initiator: bool, generation: u64, transport: T) -> Self {
        Self {
            teilnehmer,
            initiator,
            generation,
            zustand: PeerZustand::Neu,
            transport,
            remote: Weak::new(),
        }
    }

    pub fn teilnehmer(&self) -> &ParticipantId {
        &self.teilnehmer
    }

    pub fn ist_initiator(&self) -> bool {
        self.initiator
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn zustand(&self) -> PeerZustand {
        self.zustand
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Empfangener Stream, solange der Transport ihn haelt
    pub fn remote_stream(&self) -> Option<Arc<RemoteStream>> {
        self.remote.upgrade()
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Zustandswechsel; aus `Geschlossen` fuehrt kein Weg heraus
    pub(crate) fn zustand_setzen(&mut self, neu: PeerZustand) {
        if self.zustand == PeerZustand::Geschlossen || self.zustand == neu {
            return;
        }
        // Nach Verbunden fuehrt nur Schliessen weiter (Neuverhandlung bleibt Verbunden)
        if self.zustand == PeerZustand::Verbunden && neu != PeerZustand::Geschlossen {
            return;
        }
        tracing::debug!(
            teilnehmer = %self.teilnehmer,
            von = ?self.zustand,
            nach = ?neu,
            "Peer-Zustand gewechselt"
        );
        self.zustand = neu;
    }

    pub(crate) fn remote_setzen(&mut self, stream: &Arc<RemoteStream>) {
        self.remote = Arc::downgrade(stream);
    }

    pub(crate) fn schliessen(&mut self) {
        self.zustand_setzen(PeerZustand::Geschlossen);
        self.transport.schliessen();
        self.remote = Weak::new();
    }
}

impl<T: PeerTransport> std::fmt::Debug for PeerConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("teilnehmer", &self.teilnehmer)
            .field("initiator", &self.initiator)
            .field("generation", &self.generation)
            .field("zustand", &self.zustand)
            .finish()
    }
}
