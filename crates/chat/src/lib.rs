//! empowerly-chat – Text-Chat innerhalb eines Meetings
//!
//! Dieses Crate implementiert:
//! - ChatRelay: Nachrichten pruefen und als Broadcast senden
//! - Verlauf aller empfangenen Nachrichten in Ankunftsreihenfolge

pub mod error;
pub mod relay;
pub mod types;


// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use relay::ChatRelay;
pub use types::{ChatNachricht, MAX_NACHRICHT_LAENGE};
