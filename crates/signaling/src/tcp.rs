//! TCP-Transport zum Broker (Client-Seite)
//!
//! Bruecke zwischen `Framed<TcpStream, FrameCodec>` und den Queues einer
//! [`BusVerbindung`]. Ein Task pro Verbindung:
//!
//! ```text
//! ausgang (mpsc) --> Sink  --> TCP --> Broker
//! eingang (mpsc) <-- Stream <-- TCP <-- Broker
//!                    Ping alle `heartbeat`
//! ```
//!
//! ## Keepalive
//! - Client sendet alle `heartbeat` einen Ping
//! - Kommt laenger als `heartbeat_timeout` kein Frame an, wird getrennt
//! - Pong-Frames werden nicht an den Kanal weitergereicht

use empowerly_protocol::{wire::DEFAULT_MAX_FRAME_SIZE, BusFrame, FrameCodec};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::Framed;

use crate::connector::{BusConnector, BusVerbindung, AUSGANG_QUEUE_GROESSE};
use crate::error::{SignalingError, SignalingResult};

/// Wartezeit auf das Schliessen durch den Broker nach eigenem FIN
const ABSCHLUSS_TIMEOUT: Duration = Duration::from_secs(1);

/// Einstellungen des TCP-Transports
#[derive(Debug, Clone)]
pub struct TcpBusConfig {
    /// Ping-Intervall
    pub heartbeat: Duration,
    /// Trennen wenn so lange nichts empfangen wurde
    pub heartbeat_timeout: Duration,
    /// Zeitlimit fuer den TCP-Verbindungsaufbau
    pub verbindungs_timeout: Duration,
    pub max_frame_groesse: usize,
}

impl Default for TcpBusConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_millis(4000),
            heartbeat_timeout: Duration::from_millis(12000),
            verbindungs_timeout: Duration::from_secs(5),
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Verbindet per TCP mit einem Empowerly-Broker
#[derive(Debug, Clone)]
pub struct TcpBusConnector {
    adresse: String,
    config: TcpBusConfig,
}

impl TcpBusConnector {
    pub fn neu(adresse: impl Into<String>, config: TcpBusConfig) -> Self {
        Self {
            adresse: adresse.into(),
            config,
        }
    }

    pub fn adresse(&self) -> &str {
        &self.adresse
    }
}

impl BusConnector for TcpBusConnector {
    async fn verbinden(&self) -> SignalingResult<BusVerbindung> {
        let stream = tokio::time::timeout(
            self.config.verbindungs_timeout,
            TcpStream::connect(&self.adresse),
        )
        .await
        .map_err(|_| SignalingError::Timeout(format!("Verbindungsaufbau zu {}", self.adresse)))?
        .map_err(|e| SignalingError::verbindung(format!("{}: {}", self.adresse, e)))?;
        stream.set_nodelay(true)?;

        tracing::debug!(adresse = %self.adresse, "TCP-Verbindung zum Broker hergestellt");

        let framed = Framed::new(stream, FrameCodec::with_max_size(self.config.max_frame_groesse));
        let (ausgang, vom_kanal) = mpsc::channel(AUSGANG_QUEUE_GROESSE);
        let (zum_kanal, eingang) = mpsc::channel(AUSGANG_QUEUE_GROESSE);

        tokio::spawn(bruecke(
            framed,
            vom_kanal,
            zum_kanal,
            self.config.clone(),
            self.adresse.clone(),
        ));

        Ok(BusVerbindung { ausgang, eingang })
    }
}

/// Verbindungs-Task: laeuft bis TCP, Heartbeat oder Kanal aufgeben
///
/// Hat der Kanal den Empfang bereits aufgegeben, werden keine Frames mehr
/// gelesen, ausstehende ausgehende Frames aber noch gesendet.
async fn bruecke(
    framed: Framed<TcpStream, FrameCodec>,
    mut vom_kanal: mpsc::Receiver<BusFrame>,
    zum_kanal: mpsc::Sender<BusFrame>,
    config: TcpBusConfig,
    adresse: String,
) {
    let (mut sink, mut stream) = framed.split();
    let mut heartbeat = tokio::time::interval(config.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut letzter_empfang = Instant::now();
    let mut empfang_offen = true;
    let mut geordnet = false;

    loop {
        tokio::select! {
            ausgehend = vom_kanal.recv() => match ausgehend {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        tracing::warn!(adresse = %adresse, fehler = %e, "Senden an Broker fehlgeschlagen");
                        break;
                    }
                }
                // Kanal hat die Verbindung aufgegeben, alles Ausstehende ist gesendet
                None => {
                    geordnet = true;
                    break;
                }
            },

            eingehend = stream.next(), if empfang_offen => match eingehend {
                Some(Ok(BusFrame::Pong { .. })) => letzter_empfang = Instant::now(),
                Some(Ok(frame)) => {
                    letzter_empfang = Instant::now();
                    if zum_kanal.send(frame).await.is_err() {
                        tracing::debug!(adresse = %adresse, "Kanal getrennt – sende ausstehende Frames");
                        empfang_offen = false;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(adresse = %adresse, fehler = %e, "Frame-Lesefehler");
                    break;
                }
                None => {
                    tracing::info!(adresse = %adresse, "Broker hat die Verbindung geschlossen");
                    break;
                }
            },

            _ = heartbeat.tick(), if empfang_offen => {
                if letzter_empfang.elapsed() > config.heartbeat_timeout {
                    tracing::warn!(adresse = %adresse, "Heartbeat-Timeout – Verbindung wird getrennt");
                    break;
                }
                if let Err(e) = sink.send(BusFrame::ping_jetzt()).await {
                    tracing::warn!(adresse = %adresse, fehler = %e, "Ping-Senden fehlgeschlagen");
                    break;
                }
            }
        }
    }

    if geordnet {
        // FIN senden und restliche Zustellungen verwerfen bis der Broker schliesst,
        // sonst kann ein RST die letzten Frames beim Broker verwerfen
        if sink.close().await.is_ok() {
            let _ = tokio::time::timeout(ABSCHLUSS_TIMEOUT, async {
                while let Some(Ok(_)) = stream.next().await {}
            })
            .await;
        }
    }

    tracing::debug!(adresse = %adresse, "TCP-Bruecke beendet");
}
