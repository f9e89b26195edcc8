//! Bus-Transport-Abstraktion
//!
//! Ein [`BusConnector`] baut eine Verbindung zum Broker auf und liefert sie
//! als Paar von Queues. Die Verbindung gilt als getrennt, sobald `eingang`
//! `None` liefert; das Droppen von `ausgang` trennt sie von Client-Seite.

use empowerly_protocol::BusFrame;
use std::future::Future;
use tokio::sync::mpsc;

use crate::error::SignalingResult;

/// Queue-Groesse Richtung Broker
pub const AUSGANG_QUEUE_GROESSE: usize = 256;

/// Eine aufgebaute Bus-Verbindung
#[derive(Debug)]
pub struct BusVerbindung {
    /// Frames an den Broker
    pub ausgang: mpsc::Sender<BusFrame>,
    /// Frames vom Broker (Zustellungen, Fehler)
    pub eingang: mpsc::Receiver<BusFrame>,
}

/// Baut Verbindungen zum Pub/Sub-Bus auf
///
/// Wird vom Reconnect-Task des SignalingChannel wiederholt aufgerufen,
/// deshalb muss das Future `Send` sein.
pub trait BusConnector: Send + Sync + 'static {
    fn verbinden(&self) -> impl Future<Output = SignalingResult<BusVerbindung>> + Send;
}
