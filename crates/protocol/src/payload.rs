//! Typisierte Payloads der Meeting-Nachrichten
//!
//! Feldnamen folgen den JSON-Namen des Browser-WebRTC-Stacks
//! (`type`/`sdp`, `candidate`/`sdpMid`/`sdpMLineIndex`), damit
//! Web-Clients und native Clients dieselben Nachrichten austauschen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Art einer Session-Description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpArt {
    Offer,
    Answer,
}

/// Payload von `offer` und `answer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpPayload {
    #[serde(rename = "type")]
    pub art: SdpArt,
    pub sdp: String,
}

/// Payload von `ice-candidate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceKandidat {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

/// Payload von `join`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub user_name: String,
    pub joined_at: DateTime<Utc>,
}

/// Grund eines `leave`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaveGrund {
    /// Teilnehmer hat das Meeting verlassen
    #[default]
    Left,
    /// Host hat das Meeting fuer alle beendet
    MeetingEnded,
}

/// Payload von `leave`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeavePayload {
    #[serde(default)]
    pub reason: LeaveGrund,
}

/// Payload von `chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub message: String,
    pub user_name: String,
}
