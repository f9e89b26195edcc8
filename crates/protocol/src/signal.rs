//! Signal-Nachrichten und Topic-Schema
//!
//! Jede Meeting-Nachricht wird auf einem eigenen Topic pro Typ
//! veroeffentlicht:
//!
//! ```text
//! meeting/{meetingId}/offer
//! meeting/{meetingId}/answer
//! meeting/{meetingId}/ice-candidate
//! meeting/{meetingId}/join
//! meeting/{meetingId}/leave
//! meeting/{meetingId}/chat
//! ```
//!
//! Der Nachrichtentyp steckt im Topic, der JSON-Koerper enthaelt nur
//! `{senderId, targetId?, payload, timestamp}`. `offer`, `answer` und
//! `ice-candidate` sind gezielt: Empfaenger deren ID nicht `targetId`
//! entspricht ignorieren sie.

use chrono::Utc;
use empowerly_core::types::{MeetingId, ParticipantId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};

// ---------------------------------------------------------------------------
// SignalTyp
// ---------------------------------------------------------------------------

/// Typ einer Meeting-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalTyp {
    Offer,
    Answer,
    IceCandidate,
    Join,
    Leave,
    Chat,
}

impl SignalTyp {
    /// Alle Typen in Abonnement-Reihenfolge
    pub const ALLE: [SignalTyp; 6] = [
        SignalTyp::Offer,
        SignalTyp::Answer,
        SignalTyp::IceCandidate,
        SignalTyp::Join,
        SignalTyp::Leave,
        SignalTyp::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Chat => "chat",
        }
    }

    /// Gezielte Typen werden nur vom adressierten Teilnehmer verarbeitet
    pub fn ist_gezielt(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::IceCandidate)
    }

    pub fn aus_str(s: &str) -> Option<Self> {
        Self::ALLE.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for SignalTyp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Topic-Praefix eines Meetings: `meeting/{id}`
pub fn meeting_praefix(meeting: &MeetingId) -> String {
    format!("meeting/{}", meeting)
}

/// Vollstaendiges Topic fuer einen Nachrichtentyp
pub fn topic_fuer(meeting: &MeetingId, typ: SignalTyp) -> String {
    format!("{}/{}", meeting_praefix(meeting), typ.as_str())
}

/// Ermittelt den Nachrichtentyp aus dem letzten Topic-Segment
pub fn typ_aus_topic(topic: &str) -> ProtocolResult<SignalTyp> {
    let segment = topic.rsplit('/').next().unwrap_or(topic);
    SignalTyp::aus_str(segment).ok_or_else(|| ProtocolError::UnbekanntesTopic(topic.to_string()))
}

// ---------------------------------------------------------------------------
// SignalKoerper (Wire-Form)
// ---------------------------------------------------------------------------

/// JSON-Koerper einer Signal-Nachricht wie er auf dem Bus liegt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalKoerper {
    pub sender_id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ParticipantId>,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Unix-Zeit in Millisekunden
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// SignalMessage
// ---------------------------------------------------------------------------

/// Eine Meeting-Nachricht mit Typ
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    pub typ: SignalTyp,
    pub sender_id: ParticipantId,
    pub target_id: Option<ParticipantId>,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

impl SignalMessage {
    /// Erstellt eine Nachricht an alle Teilnehmer (join, leave, chat)
    pub fn broadcast(
        typ: SignalTyp,
        sender_id: ParticipantId,
        payload: impl Serialize,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            typ,
            sender_id,
            target_id: None,
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Erstellt eine gezielte Nachricht (offer, answer, ice-candidate)
    pub fn gezielt(
        typ: SignalTyp,
        sender_id: ParticipantId,
        target_id: ParticipantId,
        payload: impl Serialize,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            typ,
            sender_id,
            target_id: Some(target_id),
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    /// Prueft ob diese Nachricht vom Teilnehmer `eigene_id` verarbeitet wird
    ///
    /// Gezielte Nachrichten ohne `targetId` sind fuer niemanden bestimmt.
    pub fn ist_fuer(&self, eigene_id: &ParticipantId) -> bool {
        if self.typ.ist_gezielt() {
            self.target_id.as_ref() == Some(eigene_id)
        } else {
            true
        }
    }

    /// Deserialisiert die Payload in einen konkreten Typ
    pub fn payload_als<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Erzeugt den JSON-Koerper fuer den Bus
    pub fn koerper(&self) -> ProtocolResult<serde_json::Value> {
        let koerper = SignalKoerper {
            sender_id: self.sender_id.clone(),
            target_id: self.target_id.clone(),
            payload: self.payload.clone(),
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_value(koerper)?)
    }

    /// Rekonstruiert eine Nachricht aus Topic-Typ und JSON-Koerper
    pub fn aus_koerper(typ: SignalTyp, koerper: serde_json::Value) -> ProtocolResult<Self> {
        let k: SignalKoerper = serde_json::from_value(koerper)?;
        Ok(Self {
            typ,
            sender_id: k.sender_id,
            target_id: k.target_id,
            payload: k.payload,
            timestamp: k.timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{ChatPayload, SdpArt, SdpPayload};

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn topics_folgen_dem_meeting_schema() {
        let meeting = MeetingId::neu("m1").unwrap();
        assert_eq!(
            topic_fuer(&meeting, SignalTyp::IceCandidate),
            "meeting/m1/ice-candidate"
        );
        assert_eq!(
            typ_aus_topic("meeting/m1/ice-candidate").unwrap(),
            SignalTyp::IceCandidate
        );
        assert!(typ_aus_topic("meeting/m1/unbekannt").is_err());
    }

    #[test]
    fn gezielte_nachricht_nur_fuer_empfaenger() {
        let sdp = SdpPayload {
            art: SdpArt::Offer,
            sdp: "v=0".into(),
        };
        let msg = SignalMessage::gezielt(SignalTyp::Offer, id("a"), id("b"), &sdp).unwrap();
        assert!(msg.ist_fuer(&id("b")));
        assert!(!msg.ist_fuer(&id("c")));
        assert!(!msg.ist_fuer(&id("a")));
    }

    #[test]
    fn gezielter_typ_ohne_ziel_wird_ignoriert() {
        let msg = SignalMessage {
            typ: SignalTyp::Answer,
            sender_id: id("a"),
            target_id: None,
            payload: serde_json::Value::Null,
            timestamp: 0,
        };
        assert!(!msg.ist_fuer(&id("b")));
    }

    #[test]
    fn broadcast_ist_fuer_alle() {
        let chat = ChatPayload {
            message: "Hallo".into(),
            user_name: "Alice".into(),
        };
        let msg = SignalMessage::broadcast(SignalTyp::Chat, id("a"), &chat).unwrap();
        assert!(msg.ist_fuer(&id("a")));
        assert!(msg.ist_fuer(&id("z")));
    }

    #[test]
    fn koerper_ist_camel_case_ohne_typ() {
        let msg = SignalMessage::gezielt(
            SignalTyp::Answer,
            id("a"),
            id("b"),
            serde_json::json!({"type": "answer", "sdp": "x"}),
        )
        .unwrap();
        let koerper = msg.koerper().unwrap();
        assert_eq!(koerper["senderId"], "a");
        assert_eq!(koerper["targetId"], "b");
        assert!(koerper.get("typ").is_none());

        let zurueck = SignalMessage::aus_koerper(SignalTyp::Answer, koerper).unwrap();
        assert_eq!(zurueck, msg);
    }

    #[test]
    fn broadcast_koerper_ohne_target_feld() {
        let msg = SignalMessage::broadcast(SignalTyp::Join, id("a"), serde_json::json!({})).unwrap();
        let koerper = msg.koerper().unwrap();
        assert!(koerper.get("targetId").is_none());
    }

    #[test]
    fn leerer_absender_wird_abgelehnt() {
        let koerper = serde_json::json!({"senderId": "", "payload": {}, "timestamp": 0});
        assert!(SignalMessage::aus_koerper(SignalTyp::Join, koerper).is_err());

        let koerper = serde_json::json!({
            "senderId": "a", "targetId": " ", "payload": {}, "timestamp": 0
        });
        assert!(SignalMessage::aus_koerper(SignalTyp::Offer, koerper).is_err());
    }
}
