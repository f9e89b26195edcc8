//! TCP-Listener des Brokers
//!
//! Der `BrokerServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task, der Frames liest, an den
//! [`BrokerState`] weiterreicht und Zustellungen zurueckschreibt.
//!
//! ## Keepalive
//! Clients pingen regelmaessig. Kommt laenger als `verbindungs_timeout`
//! kein Frame an, wird die Verbindung getrennt und der Client samt
//! Abonnements entfernt.

use empowerly_protocol::{BusFrame, FrameCodec};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::broker::BrokerState;

/// Einstellungen pro Verbindung
#[derive(Debug, Clone)]
pub struct VerbindungsConfig {
    pub verbindungs_timeout: Duration,
    pub max_frame_groesse: usize,
    pub max_clients: usize,
}

impl Default for VerbindungsConfig {
    fn default() -> Self {
        Self {
            verbindungs_timeout: Duration::from_secs(15),
            max_frame_groesse: empowerly_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            max_clients: 1024,
        }
    }
}

/// TCP-Broker-Server
pub struct BrokerServer {
    state: BrokerState,
    listener: TcpListener,
    config: VerbindungsConfig,
}

impl BrokerServer {
    /// Bindet den TCP-Socket (Port 0 waehlt einen freien Port)
    pub async fn binden(
        state: BrokerState,
        bind_addr: &str,
        config: VerbindungsConfig,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            state,
            listener,
            config,
        })
    }

    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "Bus-Broker gestartet");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            if self.state.client_anzahl() >= self.config.max_clients {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.config.max_clients,
                                    "Broker voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            let state = self.state.clone();
                            let config = self.config.clone();
                            let shutdown = shutdown_rx.clone();
                            tokio::spawn(async move {
                                verbindung_verarbeiten(state, stream, peer_addr, config, shutdown).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Bus-Broker: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("Bus-Broker gestoppt");
        Ok(())
    }
}

/// Bedient eine einzelne Client-Verbindung bis zur Trennung
async fn verbindung_verarbeiten(
    state: BrokerState,
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: VerbindungsConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let _ = stream.set_nodelay(true);
    let mut framed = Framed::new(stream, FrameCodec::with_max_size(config.max_frame_groesse));
    let (client_id, mut zustellungen) = state.client_registrieren();
    let mut letzter_empfang = Instant::now();

    tracing::info!(peer = %peer_addr, client = client_id, "Bus-Client verbunden");

    loop {
        let frist = letzter_empfang + config.verbindungs_timeout;

        tokio::select! {
            frame = framed.next() => match frame {
                Some(Ok(frame)) => {
                    letzter_empfang = Instant::now();
                    tracing::trace!(client = client_id, art = frame.art(), "Frame empfangen");
                    state.frame_verarbeiten(client_id, frame);
                }
                Some(Err(e)) => {
                    tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                    let _ = framed
                        .send(BusFrame::Fehler { nachricht: e.to_string() })
                        .await;
                    break;
                }
                None => {
                    tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                    break;
                }
            },

            ausgehend = zustellungen.recv() => match ausgehend {
                Some(frame) => {
                    if let Err(e) = framed.send(frame).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Zustellung fehlgeschlagen");
                        break;
                    }
                }
                None => break,
            },

            _ = tokio::time::sleep_until(frist) => {
                tracing::warn!(peer = %peer_addr, "Verbindungs-Timeout");
                if let Some(m) = state.metriken() {
                    m.heartbeat_timeouts_total.inc();
                }
                break;
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = framed
                        .send(BusFrame::Fehler { nachricht: "Broker wird heruntergefahren".into() })
                        .await;
                    break;
                }
            }
        }
    }

    state.client_entfernen(client_id);
    tracing::info!(peer = %peer_addr, client = client_id, "Verbindungs-Task beendet");
}
