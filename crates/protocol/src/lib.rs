//! empowerly-protocol – Signal- und Bus-Protokoll
//!
//! Dieses Crate definiert alle Nachrichten die ueber den Pub/Sub-Bus
//! ausgetauscht werden:
//!
//! - [`signal`]: die sechs Meeting-Nachrichtentypen (offer, answer,
//!   ice-candidate, join, leave, chat) samt Topic-Schema
//! - [`payload`]: typisierte Payloads der einzelnen Nachrichtentypen
//! - [`bus`]: Frames zwischen Client und Broker (abonnieren, veroeffentlichen,
//!   zustellen, Heartbeat)
//! - [`wire`]: Laengen-praefixiertes JSON-Framing fuer TCP

pub mod bus;
pub mod error;
pub mod payload;
pub mod signal;
pub mod wire;

pub use bus::BusFrame;
pub use error::{ProtocolError, ProtocolResult};
pub use payload::{ChatPayload, IceKandidat, JoinPayload, LeaveGrund, LeavePayload, SdpArt, SdpPayload};
pub use signal::{meeting_praefix, topic_fuer, typ_aus_topic, SignalKoerper, SignalMessage, SignalTyp};
pub use wire::FrameCodec;
