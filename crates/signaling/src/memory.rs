//! In-Process-Bus
//!
//! Verbindet beliebig viele Clients im selben Prozess mit einem gemeinsamen
//! [`BrokerState`]. Jede Verbindung bekommt einen eigenen Task, der die
//! Frames des Clients der Reihe nach an den Broker weiterreicht.
//!
//! Fuer Tests laesst sich der Bus gezielt stoeren: alle Verbindungen
//! trennen ([`InMemoryBus::alle_trennen`]) oder neue Verbindungen
//! ablehnen ([`InMemoryBus::erreichbar_setzen`]).

use empowerly_protocol::BusFrame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::broker::BrokerState;
use crate::connector::{BusConnector, BusVerbindung, AUSGANG_QUEUE_GROESSE};
use crate::error::{SignalingError, SignalingResult};

/// In-Process-Bus, Clone teilt Broker und Verbindungsliste
#[derive(Clone)]
pub struct InMemoryBus {
    broker: BrokerState,
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    erreichbar: AtomicBool,
    verbindungen: Mutex<Vec<CancellationToken>>,
}

impl InMemoryBus {
    pub fn neu() -> Self {
        Self::mit_broker(BrokerState::neu())
    }

    pub fn mit_broker(broker: BrokerState) -> Self {
        Self {
            broker,
            inner: Arc::new(MemoryInner {
                erreichbar: AtomicBool::new(true),
                verbindungen: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn broker(&self) -> &BrokerState {
        &self.broker
    }

    /// Nicht erreichbar: neue Verbindungsversuche schlagen fehl
    pub fn erreichbar_setzen(&self, erreichbar: bool) {
        self.inner.erreichbar.store(erreichbar, Ordering::SeqCst);
    }

    /// Trennt alle bestehenden Verbindungen (simulierter Netzwerkausfall)
    pub fn alle_trennen(&self) {
        let tokens: Vec<CancellationToken> = self.inner.verbindungen.lock().drain(..).collect();
        tracing::debug!(anzahl = tokens.len(), "In-Process-Bus trennt alle Verbindungen");
        for token in tokens {
            token.cancel();
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::neu()
    }
}

impl BusConnector for InMemoryBus {
    async fn verbinden(&self) -> SignalingResult<BusVerbindung> {
        if !self.inner.erreichbar.load(Ordering::SeqCst) {
            return Err(SignalingError::verbindung("In-Process-Bus nicht erreichbar"));
        }

        let (client_id, eingang) = self.broker.client_registrieren();
        let (ausgang, mut vom_client) = mpsc::channel::<BusFrame>(AUSGANG_QUEUE_GROESSE);

        let token = CancellationToken::new();
        {
            let mut verbindungen = self.inner.verbindungen.lock();
            verbindungen.retain(|t| !t.is_cancelled());
            verbindungen.push(token.clone());
        }

        let broker = self.broker.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = vom_client.recv() => match frame {
                        Some(frame) => broker.frame_verarbeiten(client_id, frame),
                        None => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            // Schliesst auch die Empfangs-Queue des Clients
            broker.client_entfernen(client_id);
            token.cancel();
        });

        Ok(BusVerbindung { ausgang, eingang })
    }
}
