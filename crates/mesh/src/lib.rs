//! empowerly-mesh – Vollvermaschte Peer-Verbindungen eines Meetings
//!
//! Jeder Teilnehmer haelt zu jedem anderen genau eine Verbindung. Die
//! [`PeerRegistry`] uebersetzt Meeting-Nachrichten (join, offer, answer,
//! ice-candidate, leave) in Aufrufe an die Transports und Transport-Ereignisse
//! zurueck in gezielte Nachrichten.

pub mod error;
pub mod peer;
pub mod registry;
pub mod synthetic;

// Bequeme Re-Exporte
pub use error::{MeshError, MeshResult};
pub use peer::{
    PeerConnection, PeerEreignis, PeerEreignisArt, PeerFabrik, PeerKontext, PeerSignal,
    PeerTransport, PeerZustand, RemoteStream,
};
pub use registry::{PeerRegistry, MAX_GEPUFFERTE_KANDIDATEN};
pub use synthetic::{ProtokollEintrag, SynthetischeFabrik, SynthetischerTransport};
