//! empowerly-signaling – Pub/Sub-Bus fuer Meeting-Signaling
//!
//! Dieser Crate transportiert Signaling-Nachrichten zwischen den
//! Teilnehmern eines Meetings. Er besteht aus einem Topic-Broker, zwei
//! Transporten dorthin und dem clientseitigen `SignalingChannel`.
//!
//! ## Architektur
//!
//! ```text
//! BrokerServer (TCP Listener)          InMemoryBus (Tests, Ein-Prozess)
//!     |  pro Verbindung ein Task            |  pro Verbindung ein Task
//!     v                                     v
//! BrokerState  – Topic -> Abonnenten, Fan-out mit Queue-Limit
//!     ^
//!     |  BusFrame (Laengenpraefix + JSON)
//!     |
//! TcpBusConnector / InMemoryBus   (trait BusConnector)
//!     ^
//!     |
//! SignalingChannel – Praefix, Abonnements, Reconnect, fire-and-forget publish
//! ```

pub mod broker;
pub mod channel;
pub mod connector;
pub mod error;
pub mod memory;
pub mod server;
pub mod tcp;

// Bequeme Re-Exporte
pub use broker::{BrokerState, ClientId};
pub use channel::{KanalConfig, KanalEreignis, SignalingChannel, Zustellung, ZustellungsHandler};
pub use connector::{BusConnector, BusVerbindung};
pub use error::{SignalingError, SignalingResult};
pub use memory::InMemoryBus;
pub use server::{BrokerServer, VerbindungsConfig};
pub use tcp::{TcpBusConfig, TcpBusConnector};
