//! Oeffentliche Typen fuer den Meeting-Chat

use chrono::{DateTime, Utc};
use empowerly_core::ParticipantId;
use serde::{Deserialize, Serialize};

/// Maximale Laenge einer Nachricht in Bytes
pub const MAX_NACHRICHT_LAENGE: usize = 4096;

/// Eine empfangene Chat-Nachricht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatNachricht {
    pub sender_id: ParticipantId,
    pub sender_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
