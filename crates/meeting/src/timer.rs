//! SessionTimer – Countdown bis zum Meeting-Ende
//!
//! ```text
//! starten(dauer) ──> Tick{verbleibend} (sofort, dann jede Sekunde)
//!                      ...
//!                    Abgelaufen (genau einmal, danach Ende)
//! ```
//!
//! Die Endzeit wird einmal beim Start auf der monotonen Uhr festgelegt und
//! nie neu berechnet. Die Wanduhr-Endzeit dient nur der Anzeige.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Standard-Intervall der Ticks
pub const STANDARD_TICK: Duration = Duration::from_secs(1);

/// Ereignis des Timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEreignis {
    Tick { verbleibend: Duration },
    Abgelaufen,
}

/// Anzeige-Stufe der Restzeit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warnstufe {
    Normal,
    /// weniger als 5 Minuten
    Bald,
    /// weniger als 1 Minute
    Kritisch,
}

impl Warnstufe {
    pub fn fuer(verbleibend: Duration) -> Self {
        if verbleibend < Duration::from_secs(60) {
            Self::Kritisch
        } else if verbleibend < Duration::from_secs(5 * 60) {
            Self::Bald
        } else {
            Self::Normal
        }
    }
}

/// Formatiert eine Restzeit als `MM:SS`
pub fn zeit_formatieren(verbleibend: Duration) -> String {
    let sekunden = verbleibend.as_secs();
    format!("{:02}:{:02}", sekunden / 60, sekunden % 60)
}

pub struct SessionTimer {
    endzeit: Instant,
    wand_endzeit: DateTime<Utc>,
    ereignisse: Option<mpsc::UnboundedReceiver<TimerEreignis>>,
    task: JoinHandle<()>,
}

impl SessionTimer {
    /// Startet den Countdown; der erste Tick kommt sofort
    pub fn starten(dauer: Duration, intervall: Duration) -> Self {
        let endzeit = Instant::now() + dauer;
        let wand_endzeit = Utc::now()
            + chrono::Duration::from_std(dauer).unwrap_or_else(|_| chrono::Duration::zero());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(timer_schleife(endzeit, intervall, tx));

        tracing::debug!(dauer_s = dauer.as_secs(), ende = %wand_endzeit, "Session-Timer gestartet");
        Self {
            endzeit,
            wand_endzeit,
            ereignisse: Some(rx),
            task,
        }
    }

    pub fn verbleibend(&self) -> Duration {
        self.endzeit.saturating_duration_since(Instant::now())
    }

    pub fn endzeit(&self) -> Instant {
        self.endzeit
    }

    pub fn wand_endzeit(&self) -> DateTime<Utc> {
        self.wand_endzeit
    }

    pub fn laeuft(&self) -> bool {
        self.ereignisse.is_some()
    }

    /// Naechstes Ereignis; `None` nach `abbrechen()` oder nach `Abgelaufen`
    pub async fn naechstes_ereignis(&mut self) -> Option<TimerEreignis> {
        let rx = self.ereignisse.as_mut()?;
        let ereignis = rx.recv().await;
        if matches!(ereignis, None | Some(TimerEreignis::Abgelaufen)) {
            self.ereignisse = None;
        }
        ereignis
    }

    /// Stoppt den Timer; bereits erzeugte Ereignisse werden verworfen
    pub fn abbrechen(&mut self) {
        if self.ereignisse.take().is_some() {
            tracing::debug!("Session-Timer abgebrochen");
        }
        self.task.abort();
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn timer_schleife(
    endzeit: Instant,
    intervall: Duration,
    tx: mpsc::UnboundedSender<TimerEreignis>,
) {
    let mut takt = tokio::time::interval(intervall);
    takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = takt.tick() => {}
            _ = tokio::time::sleep_until(endzeit) => {}
        }
        let verbleibend = endzeit.saturating_duration_since(Instant::now());
        if verbleibend.is_zero() {
            tracing::info!("Meeting-Zeit abgelaufen");
            let _ = tx.send(TimerEreignis::Abgelaufen);
            return;
        }
        if tx.send(TimerEreignis::Tick { verbleibend }).is_err() {
            return;
        }
    }
}
