//! Topic-Broker – verteilt veroeffentlichte Nachrichten an Abonnenten
//!
//! Der BrokerState verwaltet die Send-Queues aller verbundenen Bus-Clients
//! und deren Topic-Abonnements. Er ist transportunabhaengig: der TCP-Server
//! und der In-Process-Bus reichen eingehende Frames an
//! [`BrokerState::frame_verarbeiten`] weiter.
//!
//! ## Zustellgarantien
//! - at-most-once: volle Send-Queues verwerfen Frames, nichts wird gepuffert
//! - FIFO pro Sender und Topic: jeder Client wird von genau einem Task
//!   bedient, Zustellungen landen in der Reihenfolge der Veroeffentlichung
//!   in den Queues der Abonnenten
//! - keine Ordnung ueber Sender oder Topics hinweg

use dashmap::DashMap;
use empowerly_observability::BrokerMetriken;
use empowerly_protocol::BusFrame;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Standard-Groesse der Send-Queue pro Client
pub const SEND_QUEUE_GROESSE: usize = 256;

/// Broker-interne ID eines Bus-Clients
pub type ClientId = u64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
struct ClientSender {
    client_id: ClientId,
    tx: mpsc::Sender<BusFrame>,
}

impl ClientSender {
    /// Sendet einen Frame nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    fn senden(&self, frame: BusFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(client = self.client_id, "Send-Queue voll – Frame verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(client = self.client_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BrokerState
// ---------------------------------------------------------------------------

/// Gemeinsamer Broker-Zustand
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct BrokerState {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    clients: DashMap<ClientId, ClientSender>,
    /// topic -> abonnierte Clients
    abonnements: DashMap<String, HashSet<ClientId>>,
    naechste_id: AtomicU64,
    queue_groesse: usize,
    metriken: Option<BrokerMetriken>,
}

impl BrokerState {
    /// Erstellt einen Broker ohne Metriken
    pub fn neu() -> Self {
        Self::mit_optionen(SEND_QUEUE_GROESSE, None)
    }

    /// Erstellt einen Broker mit eigener Queue-Groesse und optionalen Metriken
    pub fn mit_optionen(queue_groesse: usize, metriken: Option<BrokerMetriken>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                clients: DashMap::new(),
                abonnements: DashMap::new(),
                naechste_id: AtomicU64::new(1),
                queue_groesse: queue_groesse.max(1),
                metriken,
            }),
        }
    }

    /// Registriert einen neuen Client und gibt seine Empfangs-Queue zurueck
    ///
    /// Die Transport-Schicht liest aus dieser Queue und liefert an den Client aus.
    pub fn client_registrieren(&self) -> (ClientId, mpsc::Receiver<BusFrame>) {
        let client_id = self.inner.naechste_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        self.inner
            .clients
            .insert(client_id, ClientSender { client_id, tx });
        if let Some(m) = &self.inner.metriken {
            m.connected_clients.inc();
        }
        tracing::debug!(client = client_id, "Bus-Client registriert");
        (client_id, rx)
    }

    /// Entfernt einen Client samt aller Abonnements
    ///
    /// Die Send-Queue wird dabei geschlossen, der Empfaenger sieht `None`.
    pub fn client_entfernen(&self, client_id: ClientId) {
        if self.inner.clients.remove(&client_id).is_none() {
            return;
        }
        self.inner.abonnements.iter_mut().for_each(|mut eintrag| {
            eintrag.value_mut().remove(&client_id);
        });
        self.inner.abonnements.retain(|_, clients| !clients.is_empty());
        if let Some(m) = &self.inner.metriken {
            m.connected_clients.dec();
            m.active_topics.set(self.inner.abonnements.len() as i64);
        }
        tracing::debug!(client = client_id, "Bus-Client entfernt");
    }

    /// Abonniert ein Topic, gibt `true` zurueck wenn das Abonnement neu ist
    pub fn abonnieren(&self, client_id: ClientId, topic: &str) -> bool {
        if !self.inner.clients.contains_key(&client_id) {
            return false;
        }
        let neu = self
            .inner
            .abonnements
            .entry(topic.to_string())
            .or_default()
            .insert(client_id);
        if let Some(m) = &self.inner.metriken {
            m.active_topics.set(self.inner.abonnements.len() as i64);
        }
        tracing::trace!(client = client_id, topic = %topic, neu, "Topic abonniert");
        neu
    }

    /// Beendet ein Abonnement
    pub fn abbestellen(&self, client_id: ClientId, topic: &str) {
        if let Some(mut clients) = self.inner.abonnements.get_mut(topic) {
            clients.remove(&client_id);
        }
        self.inner
            .abonnements
            .remove_if(topic, |_, clients| clients.is_empty());
        if let Some(m) = &self.inner.metriken {
            m.active_topics.set(self.inner.abonnements.len() as i64);
        }
    }

    /// Stellt eine Nachricht an alle Abonnenten eines Topics zu
    ///
    /// Der Absender erhaelt seine eigene Nachricht, wenn er das Topic
    /// abonniert hat. Gibt die Anzahl der erfolgreichen Zustellungen zurueck.
    pub fn veroeffentlichen(&self, topic: &str, body: serde_json::Value) -> usize {
        let empfaenger: Vec<ClientId> = match self.inner.abonnements.get(topic) {
            Some(clients) => clients.iter().copied().collect(),
            None => Vec::new(),
        };

        let mut zugestellt = 0;
        let mut verworfen = 0;
        for client_id in &empfaenger {
            let Some(sender) = self.inner.clients.get(client_id).map(|s| s.clone()) else {
                continue;
            };
            let frame = BusFrame::Zustellung {
                topic: topic.to_string(),
                body: body.clone(),
            };
            if sender.senden(frame) {
                zugestellt += 1;
            } else {
                verworfen += 1;
            }
        }

        if let Some(m) = &self.inner.metriken {
            m.published_total.inc();
            m.delivered_total.inc_by(zugestellt as u64);
            m.dropped_total.inc_by(verworfen as u64);
        }
        tracing::trace!(topic = %topic, zugestellt, verworfen, "Nachricht verteilt");
        zugestellt
    }

    /// Verarbeitet einen Frame den ein Client gesendet hat
    pub fn frame_verarbeiten(&self, client_id: ClientId, frame: BusFrame) {
        match frame {
            BusFrame::Abonnieren { topic } => {
                self.abonnieren(client_id, &topic);
            }
            BusFrame::Abbestellen { topic } => self.abbestellen(client_id, &topic),
            BusFrame::Veroeffentlichen { topic, body } => {
                self.veroeffentlichen(&topic, body);
            }
            BusFrame::Ping { timestamp_ms } => {
                self.an_client_senden(client_id, BusFrame::Pong { timestamp_ms });
            }
            BusFrame::Pong { .. } => {}
            andere @ (BusFrame::Zustellung { .. } | BusFrame::Fehler { .. }) => {
                tracing::debug!(client = client_id, art = andere.art(), "Unerwarteter Frame vom Client");
                self.an_client_senden(
                    client_id,
                    BusFrame::Fehler {
                        nachricht: format!("Frame '{}' ist nur Broker -> Client", andere.art()),
                    },
                );
            }
        }
    }

    /// Sendet einen Frame direkt an einen Client
    pub fn an_client_senden(&self, client_id: ClientId, frame: BusFrame) -> bool {
        match self.inner.clients.get(&client_id) {
            Some(sender) => sender.senden(frame),
            None => false,
        }
    }

    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn topic_anzahl(&self) -> usize {
        self.inner.abonnements.len()
    }

    /// Anzahl der Abonnenten eines Topics
    pub fn abonnenten(&self, topic: &str) -> usize {
        self.inner
            .abonnements
            .get(topic)
            .map(|clients| clients.len())
            .unwrap_or(0)
    }

    pub(crate) fn metriken(&self) -> Option<&BrokerMetriken> {
        self.inner.metriken.as_ref()
    }
}

impl Default for BrokerState {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zustellung_topic(frame: BusFrame) -> String {
        match frame {
            BusFrame::Zustellung { topic, .. } => topic,
            andere => panic!("Zustellung erwartet, erhalten: {:?}", andere),
        }
    }

    #[tokio::test]
    async fn nur_abonnenten_erhalten_nachrichten() {
        let broker = BrokerState::neu();
        let (a, mut rx_a) = broker.client_registrieren();
        let (b, mut rx_b) = broker.client_registrieren();
        let (_c, mut rx_c) = broker.client_registrieren();

        broker.abonnieren(a, "meeting/m1/join");
        broker.abonnieren(b, "meeting/m1/join");

        let zugestellt = broker.veroeffentlichen("meeting/m1/join", json!({"n": 1}));
        assert_eq!(zugestellt, 2);
        assert_eq!(zustellung_topic(rx_a.try_recv().unwrap()), "meeting/m1/join");
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err(), "Nicht-Abonnent darf nichts empfangen");
    }

    #[tokio::test]
    async fn doppeltes_abonnieren_stellt_einmal_zu() {
        let broker = BrokerState::neu();
        let (a, mut rx) = broker.client_registrieren();
        assert!(broker.abonnieren(a, "t"));
        assert!(!broker.abonnieren(a, "t"));

        broker.veroeffentlichen("t", json!(null));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reihenfolge_pro_sender_bleibt_erhalten() {
        let broker = BrokerState::neu();
        let (a, mut rx) = broker.client_registrieren();
        broker.abonnieren(a, "t");
        for n in 0..10 {
            broker.veroeffentlichen("t", json!({ "n": n }));
        }
        for n in 0..10 {
            match rx.try_recv().unwrap() {
                BusFrame::Zustellung { body, .. } => assert_eq!(body["n"], n),
                andere => panic!("unerwartet: {:?}", andere),
            }
        }
    }

    #[tokio::test]
    async fn volle_queue_verwirft_statt_zu_blockieren() {
        let metriken = BrokerMetriken::neu().unwrap();
        let broker = BrokerState::mit_optionen(2, Some(metriken.clone()));
        let (a, _rx) = broker.client_registrieren();
        broker.abonnieren(a, "t");

        let zugestellt: usize = (0..5).map(|_| broker.veroeffentlichen("t", json!(1))).sum();
        assert_eq!(zugestellt, 2);
        assert_eq!(metriken.dropped_total.get(), 3);
        assert_eq!(metriken.published_total.get(), 5);
    }

    #[tokio::test]
    async fn entfernen_bereinigt_abonnements_und_schliesst_queue() {
        let broker = BrokerState::neu();
        let (a, mut rx) = broker.client_registrieren();
        broker.abonnieren(a, "t1");
        broker.abonnieren(a, "t2");
        assert_eq!(broker.topic_anzahl(), 2);

        broker.client_entfernen(a);
        assert_eq!(broker.client_anzahl(), 0);
        assert_eq!(broker.topic_anzahl(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn ping_wird_mit_pong_beantwortet() {
        let broker = BrokerState::neu();
        let (a, mut rx) = broker.client_registrieren();
        broker.frame_verarbeiten(a, BusFrame::Ping { timestamp_ms: 7 });
        assert_eq!(rx.try_recv().unwrap(), BusFrame::Pong { timestamp_ms: 7 });
    }

    #[tokio::test]
    async fn abbestellen_beendet_zustellung() {
        let broker = BrokerState::neu();
        let (a, mut rx) = broker.client_registrieren();
        broker.frame_verarbeiten(a, BusFrame::Abonnieren { topic: "t".into() });
        broker.frame_verarbeiten(a, BusFrame::Abbestellen { topic: "t".into() });
        broker.frame_verarbeiten(
            a,
            BusFrame::Veroeffentlichen {
                topic: "t".into(),
                body: json!(1),
            },
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(broker.abonnenten("t"), 0);
    }
}
