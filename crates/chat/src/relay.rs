//! ChatRelay – Senden und Verlauf des Meeting-Chats
//!
//! Nachrichten gehen als Broadcast auf das `chat`-Topic. Der Broker stellt
//! sie auch dem Absender zu; der Verlauf entsteht deshalb ausschliesslich
//! aus empfangenen Nachrichten, in Ankunftsreihenfolge und ohne
//! De-Duplizierung.

use chrono::{DateTime, Utc};
use empowerly_core::ParticipantId;
use empowerly_protocol::{ChatPayload, SignalMessage, SignalTyp};
use empowerly_signaling::SignalingChannel;

use crate::error::{ChatError, ChatResult};
use crate::types::{ChatNachricht, MAX_NACHRICHT_LAENGE};

pub struct ChatRelay {
    eigene_id: ParticipantId,
    eigener_name: String,
    verlauf: Vec<ChatNachricht>,
}

impl ChatRelay {
    pub fn neu(eigene_id: ParticipantId, eigener_name: impl Into<String>) -> Self {
        Self {
            eigene_id,
            eigener_name: eigener_name.into(),
            verlauf: Vec::new(),
        }
    }

    /// Prueft den Text einer ausgehenden Nachricht
    pub fn text_pruefen(text: &str) -> ChatResult<()> {
        if text.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Nachrichteninhalt darf nicht leer sein".into(),
            ));
        }
        if text.len() > MAX_NACHRICHT_LAENGE {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Nachricht zu lang: {} Bytes (Maximum: {})",
                text.len(),
                MAX_NACHRICHT_LAENGE
            )));
        }
        Ok(())
    }

    /// Baut die Broadcast-Nachricht fuer `text`
    pub fn nachricht_erstellen(&self, text: &str) -> ChatResult<SignalMessage> {
        Self::text_pruefen(text)?;
        Ok(SignalMessage::broadcast(
            SignalTyp::Chat,
            self.eigene_id.clone(),
            ChatPayload {
                message: text.to_string(),
                user_name: self.eigener_name.clone(),
            },
        )?)
    }

    /// Sendet `text` an alle Teilnehmer
    ///
    /// Gibt `false` zurueck, wenn der Kanal gerade keine Verbindung hat; die
    /// Nachricht ist dann verloren.
    pub fn send_message(&self, kanal: &SignalingChannel, text: &str) -> ChatResult<bool> {
        let nachricht = self.nachricht_erstellen(text)?;
        let gesendet = kanal.publish(SignalTyp::Chat.as_str(), nachricht.koerper()?);
        if !gesendet {
            tracing::warn!("Chat-Nachricht verworfen – keine Verbindung");
        }
        Ok(gesendet)
    }

    /// Haengt eine empfangene Chat-Nachricht an den Verlauf
    pub fn empfangen(&mut self, nachricht: &SignalMessage) -> ChatResult<&ChatNachricht> {
        if nachricht.typ != SignalTyp::Chat {
            return Err(ChatError::FalscherTyp(nachricht.typ.to_string()));
        }
        let payload: ChatPayload = nachricht.payload_als()?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(nachricht.timestamp).unwrap_or_else(Utc::now);

        tracing::debug!(sender = %nachricht.sender_id, "Chat-Nachricht empfangen");
        let index = self.verlauf.len();
        self.verlauf.push(ChatNachricht {
            sender_id: nachricht.sender_id.clone(),
            sender_name: payload.user_name,
            text: payload.message,
            timestamp,
        });
        Ok(&self.verlauf[index])
    }

    pub fn verlauf(&self) -> &[ChatNachricht] {
        &self.verlauf
    }
}
