//! SignalingChannel – Topic-Abonnements ueber eine sich selbst erneuernde Bus-Verbindung
//!
//! ## Architektur
//!
//! ```text
//!  SignalingChannel (Handle)          Verbindungs-Task
//!  -------------------------          ----------------
//!  subscribe(topic, handler) --+
//!  publish(topic, body) -------+--> Zustand (Mutex) <---- verbinden() / Reconnect
//!  disconnect() ---------------+          |                     |
//!                                         v                     v
//!                                   ausgang (mpsc) -------> BusConnector
//!                                                               |
//!  handler (mpsc) <----- Zustellung{topic, body} <--------------+
//!  ereignisse (mpsc) <-- Verbunden / Fehler / Getrennt
//! ```
//!
//! ## Garantien
//! - `subscribe` ist pro Topic idempotent, jedes Topic hat hoechstens einen Handler
//! - nach einem Reconnect werden alle registrierten Topics neu abonniert
//! - `publish` ist fire-and-forget: ohne Verbindung wird verworfen, nicht gepuffert
//! - `disconnect` bestellt alle Topics ab und beendet den Task, mehrfach aufrufbar

use empowerly_protocol::BusFrame;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::connector::{BusConnector, BusVerbindung};

/// Standard-Wartezeit zwischen zwei Verbindungsversuchen
pub const STANDARD_RECONNECT: Duration = Duration::from_millis(5000);

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Einstellungen des Kanals
#[derive(Debug, Clone)]
pub struct KanalConfig {
    /// Feste Wartezeit vor jedem erneuten Verbindungsversuch
    pub reconnect_verzoegerung: Duration,
}

impl Default for KanalConfig {
    fn default() -> Self {
        Self {
            reconnect_verzoegerung: STANDARD_RECONNECT,
        }
    }
}

/// Statusmeldungen des Kanals
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KanalEreignis {
    /// Verbindung (wieder) hergestellt, Abonnements sind erneuert
    Verbunden,
    /// Verbindungsversuch gescheitert oder Verbindung verloren
    Fehler(String),
    /// `disconnect()` abgeschlossen, es folgen keine weiteren Ereignisse
    Getrennt,
}

/// Eine zugestellte Nachricht
#[derive(Debug, Clone, PartialEq)]
pub struct Zustellung {
    /// Vollstaendiges Topic
    pub topic: String,
    pub body: serde_json::Value,
}

/// Empfaenger fuer Zustellungen eines Topics
pub type ZustellungsHandler = mpsc::UnboundedSender<Zustellung>;

struct KanalZustand {
    /// vollstaendiges Topic -> Handler
    abonnements: HashMap<String, ZustellungsHandler>,
    /// Queue der aktuell lebenden Verbindung
    ausgang: Option<mpsc::Sender<BusFrame>>,
    getrennt: bool,
}

struct KanalInner {
    praefix: String,
    zustand: Mutex<KanalZustand>,
    abbruch: CancellationToken,
}

// ---------------------------------------------------------------------------
// SignalingChannel
// ---------------------------------------------------------------------------

/// Handle auf einen Signaling-Kanal mit festem Topic-Praefix
pub struct SignalingChannel {
    inner: Arc<KanalInner>,
}

impl SignalingChannel {
    /// Startet den Verbindungs-Task und gibt Handle und Ereignis-Queue zurueck
    ///
    /// Kehrt sofort zurueck; `KanalEreignis::Verbunden` meldet die erste
    /// erfolgreiche Verbindung.
    pub fn verbinden<C: BusConnector>(
        connector: C,
        praefix: impl Into<String>,
        config: KanalConfig,
    ) -> (Self, mpsc::UnboundedReceiver<KanalEreignis>) {
        let inner = Arc::new(KanalInner {
            praefix: praefix.into().trim_end_matches('/').to_string(),
            zustand: Mutex::new(KanalZustand {
                abonnements: HashMap::new(),
                ausgang: None,
                getrennt: false,
            }),
            abbruch: CancellationToken::new(),
        });
        let (ereignis_tx, ereignis_rx) = mpsc::unbounded_channel();

        tokio::spawn(verbindungs_schleife(
            connector,
            Arc::clone(&inner),
            config,
            ereignis_tx,
        ));

        (Self { inner }, ereignis_rx)
    }

    /// Topic-Praefix, z.B. `meeting/m1`
    pub fn praefix(&self) -> &str {
        &self.inner.praefix
    }

    /// Vollstaendiges Topic fuer ein relatives Topic
    pub fn voller_topic(&self, topic: &str) -> String {
        format!("{}/{}", self.inner.praefix, topic)
    }

    pub fn ist_verbunden(&self) -> bool {
        let zustand = self.inner.zustand.lock();
        !zustand.getrennt && zustand.ausgang.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Registriert `handler` fuer ein relatives Topic
    ///
    /// Gibt `false` zurueck wenn das Topic bereits abonniert ist (der
    /// bestehende Handler bleibt) oder der Kanal getrennt wurde.
    pub fn subscribe(&self, topic: &str, handler: ZustellungsHandler) -> bool {
        let voll = self.voller_topic(topic);
        let mut zustand = self.inner.zustand.lock();
        if zustand.getrennt || zustand.abonnements.contains_key(&voll) {
            return false;
        }
        zustand.abonnements.insert(voll.clone(), handler);
        if let Some(tx) = &zustand.ausgang {
            // Schlaegt das fehl, holt der naechste Reconnect das Abonnement nach
            let _ = tx.try_send(BusFrame::Abonnieren { topic: voll.clone() });
        }
        tracing::debug!(topic = %voll, "Topic abonniert");
        true
    }

    /// Entfernt das Abonnement eines relativen Topics
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let voll = self.voller_topic(topic);
        let mut zustand = self.inner.zustand.lock();
        if zustand.abonnements.remove(&voll).is_none() {
            return false;
        }
        if let Some(tx) = &zustand.ausgang {
            let _ = tx.try_send(BusFrame::Abbestellen { topic: voll });
        }
        true
    }

    pub fn abonnement_anzahl(&self) -> usize {
        self.inner.zustand.lock().abonnements.len()
    }

    /// Veroeffentlicht `body` auf einem relativen Topic
    ///
    /// Gibt `true` zurueck wenn die Nachricht einer lebenden Verbindung
    /// uebergeben wurde. Ohne Verbindung wird sie verworfen.
    pub fn publish(&self, topic: &str, body: serde_json::Value) -> bool {
        let voll = self.voller_topic(topic);
        let zustand = self.inner.zustand.lock();
        if zustand.getrennt {
            return false;
        }
        match &zustand.ausgang {
            Some(tx) => match tx.try_send(BusFrame::Veroeffentlichen {
                topic: voll.clone(),
                body,
            }) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(topic = %voll, fehler = %e, "Nachricht verworfen");
                    false
                }
            },
            None => {
                tracing::debug!(topic = %voll, "Nicht verbunden – Nachricht verworfen");
                false
            }
        }
    }

    /// Bestellt alle Topics ab und beendet die Verbindung
    pub fn disconnect(&self) {
        {
            let mut zustand = self.inner.zustand.lock();
            if zustand.getrennt {
                return;
            }
            zustand.getrennt = true;
            let topics: Vec<String> = zustand.abonnements.drain().map(|(t, _)| t).collect();
            if let Some(tx) = zustand.ausgang.take() {
                for topic in topics {
                    let _ = tx.try_send(BusFrame::Abbestellen { topic });
                }
            }
        }
        self.inner.abbruch.cancel();
        tracing::info!(praefix = %self.inner.praefix, "Signaling-Kanal getrennt");
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        self.inner.abbruch.cancel();
    }
}

// ---------------------------------------------------------------------------
// Verbindungs-Task
// ---------------------------------------------------------------------------

async fn verbindungs_schleife<C: BusConnector>(
    connector: C,
    inner: Arc<KanalInner>,
    config: KanalConfig,
    ereignisse: mpsc::UnboundedSender<KanalEreignis>,
) {
    loop {
        let ergebnis = tokio::select! {
            r = connector.verbinden() => r,
            _ = inner.abbruch.cancelled() => break,
        };

        match ergebnis {
            Ok(verbindung) => {
                tracing::info!(praefix = %inner.praefix, "Signaling-Kanal verbunden");
                if !verbindung_bedienen(&inner, verbindung, &ereignisse).await {
                    break;
                }
                tracing::warn!(praefix = %inner.praefix, "Signaling-Verbindung verloren");
                let _ = ereignisse.send(KanalEreignis::Fehler("Verbindung verloren".into()));
            }
            Err(e) => {
                tracing::warn!(praefix = %inner.praefix, fehler = %e, "Verbindungsversuch fehlgeschlagen");
                let _ = ereignisse.send(KanalEreignis::Fehler(e.to_string()));
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_verzoegerung) => {}
            _ = inner.abbruch.cancelled() => break,
        }
    }

    let _ = ereignisse.send(KanalEreignis::Getrennt);
    tracing::debug!(praefix = %inner.praefix, "Verbindungs-Task beendet");
}

/// Bedient eine Verbindung bis sie abbricht
///
/// Gibt `false` zurueck wenn der Kanal getrennt wurde und kein Reconnect folgt.
async fn verbindung_bedienen(
    inner: &KanalInner,
    verbindung: BusVerbindung,
    ereignisse: &mpsc::UnboundedSender<KanalEreignis>,
) -> bool {
    let BusVerbindung {
        ausgang,
        mut eingang,
    } = verbindung;

    // Abonnements erneuern und Verbindung veroeffentlichen, atomar zu subscribe()
    {
        let mut zustand = inner.zustand.lock();
        if zustand.getrennt {
            return false;
        }
        for topic in zustand.abonnements.keys() {
            if ausgang
                .try_send(BusFrame::Abonnieren {
                    topic: topic.clone(),
                })
                .is_err()
            {
                tracing::warn!(topic = %topic, "Abonnement nach Reconnect nicht gesendet");
            }
        }
        zustand.ausgang = Some(ausgang);
    }
    let _ = ereignisse.send(KanalEreignis::Verbunden);

    loop {
        let frame = tokio::select! {
            f = eingang.recv() => f,
            _ = inner.abbruch.cancelled() => return false,
        };

        match frame {
            Some(BusFrame::Zustellung { topic, body }) => {
                let handler = inner.zustand.lock().abonnements.get(&topic).cloned();
                match handler {
                    Some(h) => {
                        let _ = h.send(Zustellung { topic, body });
                    }
                    None => tracing::trace!(topic = %topic, "Zustellung ohne Abonnement verworfen"),
                }
            }
            Some(BusFrame::Fehler { nachricht }) => {
                tracing::warn!(praefix = %inner.praefix, fehler = %nachricht, "Fehler vom Broker");
            }
            Some(andere) => {
                tracing::trace!(art = andere.art(), "Frame ignoriert");
            }
            None => break,
        }
    }

    inner.zustand.lock().ausgang = None;
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBus;
    use serde_json::json;

    const KURZ: Duration = Duration::from_millis(50);

    fn schnelle_config() -> KanalConfig {
        KanalConfig {
            reconnect_verzoegerung: KURZ,
        }
    }

    async fn warte_auf(
        rx: &mut mpsc::UnboundedReceiver<KanalEreignis>,
        erwartet: KanalEreignis,
    ) {
        let ergebnis = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(e) = rx.recv().await {
                if e == erwartet {
                    return;
                }
            }
            panic!("Ereignis-Queue geschlossen ohne {:?}", erwartet);
        })
        .await;
        assert!(ergebnis.is_ok(), "Timeout beim Warten auf {:?}", erwartet);
    }

    async fn naechste(rx: &mut mpsc::UnboundedReceiver<Zustellung>) -> Option<Zustellung> {
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn publish_erreicht_abonnenten_mit_praefix() {
        let bus = InMemoryBus::neu();
        let (a, mut ev_a) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        let (b, mut ev_b) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        warte_auf(&mut ev_a, KanalEreignis::Verbunden).await;
        warte_auf(&mut ev_b, KanalEreignis::Verbunden).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(b.subscribe("chat", tx));
        tokio::time::sleep(KURZ).await;

        assert!(a.publish("chat", json!({"message": "hi"})));
        let z = naechste(&mut rx).await.expect("Zustellung erwartet");
        assert_eq!(z.topic, "meeting/m1/chat");
        assert_eq!(z.body["message"], "hi");
    }

    #[tokio::test]
    async fn subscribe_ist_idempotent() {
        let bus = InMemoryBus::neu();
        let (kanal, mut ev) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        warte_auf(&mut ev, KanalEreignis::Verbunden).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(kanal.subscribe("join", tx.clone()));
        assert!(!kanal.subscribe("join", tx));
        assert_eq!(kanal.abonnement_anzahl(), 1);
        tokio::time::sleep(KURZ).await;

        kanal.publish("join", json!(1));
        assert!(naechste(&mut rx).await.is_some());
        assert!(naechste(&mut rx).await.is_none(), "keine doppelte Zustellung");
    }

    #[tokio::test]
    async fn publish_ohne_verbindung_wird_verworfen() {
        let bus = InMemoryBus::neu();
        bus.erreichbar_setzen(false);
        let (kanal, mut ev) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        warte_auf(&mut ev, KanalEreignis::Fehler("Verbindung zum Bus fehlgeschlagen: In-Process-Bus nicht erreichbar".into())).await;

        assert!(!kanal.ist_verbunden());
        assert!(!kanal.publish("chat", json!("verloren")));

        // Nach dem Reconnect wird nichts nachgeliefert
        let (beobachter, mut ev_b) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        bus.erreichbar_setzen(true);
        warte_auf(&mut ev, KanalEreignis::Verbunden).await;
        warte_auf(&mut ev_b, KanalEreignis::Verbunden).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        beobachter.subscribe("chat", tx);
        assert!(naechste(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn reconnect_erneuert_abonnements() {
        let bus = InMemoryBus::neu();
        let (empfaenger, mut ev) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        warte_auf(&mut ev, KanalEreignis::Verbunden).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        empfaenger.subscribe("offer", tx);

        bus.alle_trennen();
        warte_auf(&mut ev, KanalEreignis::Fehler("Verbindung verloren".into())).await;
        warte_auf(&mut ev, KanalEreignis::Verbunden).await;

        let (sender, mut ev_s) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        warte_auf(&mut ev_s, KanalEreignis::Verbunden).await;
        tokio::time::sleep(KURZ).await;

        assert!(sender.publish("offer", json!({"nach": "reconnect"})));
        let z = naechste(&mut rx).await.expect("Abonnement muss nach Reconnect aktiv sein");
        assert_eq!(z.body["nach"], "reconnect");
        assert_eq!(bus.broker().abonnenten("meeting/m1/offer"), 1);
    }

    #[tokio::test]
    async fn disconnect_ist_mehrfach_aufrufbar() {
        let bus = InMemoryBus::neu();
        let (kanal, mut ev) = SignalingChannel::verbinden(bus.clone(), "meeting/m1", schnelle_config());
        warte_auf(&mut ev, KanalEreignis::Verbunden).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        kanal.subscribe("leave", tx);
        tokio::time::sleep(KURZ).await;
        assert_eq!(bus.broker().abonnenten("meeting/m1/leave"), 1);

        kanal.disconnect();
        kanal.disconnect();
        warte_auf(&mut ev, KanalEreignis::Getrennt).await;

        assert_eq!(kanal.abonnement_anzahl(), 0);
        assert!(!kanal.publish("leave", json!(null)));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!kanal.subscribe("leave", tx));
        tokio::time::sleep(KURZ).await;
        assert_eq!(bus.broker().client_anzahl(), 0);
    }
}
