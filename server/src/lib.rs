//! empowerly-broker – Bibliotheks-Root
//!
//! Setzt Konfiguration, Metriken, Health-Check und den TCP-Bus zu einem
//! lauffaehigen Broker zusammen. Integrationstests binden ihn auf Port 0.

pub mod config;

use anyhow::{Context, Result};
use config::BrokerConfig;
use empowerly_observability::{observability_server_starten, BrokerMetriken, HealthState};
use empowerly_signaling::{BrokerServer, BrokerState};
use std::net::SocketAddr;
use tokio::sync::watch;

/// Haelt den Broker-Zustand zusammen
pub struct Broker {
    pub config: BrokerConfig,
    state: BrokerState,
    metriken: BrokerMetriken,
    health: HealthState,
}

impl Broker {
    /// Erstellt einen neuen Broker aus der gegebenen Konfiguration
    pub fn neu(config: BrokerConfig) -> Result<Self> {
        let metriken = BrokerMetriken::neu().context("Metriken nicht registrierbar")?;
        let state = BrokerState::mit_optionen(config.bus.queue_groesse, Some(metriken.clone()));
        Ok(Self {
            config,
            state,
            metriken,
            health: HealthState::neu(),
        })
    }

    pub fn state(&self) -> &BrokerState {
        &self.state
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    /// Bindet TCP-Bus und (optional) den Observability-Server
    pub async fn binden(self) -> Result<GebundenerBroker> {
        let adresse = self.config.tcp_bind_adresse();
        let server = BrokerServer::binden(
            self.state.clone(),
            &adresse,
            self.config.bus.verbindungs_config(),
        )
        .await
        .with_context(|| format!("TCP-Bus auf '{adresse}' nicht bindbar"))?;

        if self.config.observability.aktiviert {
            let obs_addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let metriken = self.metriken.clone();
            let health = self.health.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(obs_addr, metriken, health).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        self.health.bus_status_setzen(true);
        Ok(GebundenerBroker {
            server,
            health: self.health,
        })
    }

    /// Bindet und laeuft bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        self.binden().await?.starten(shutdown_rx).await
    }
}

/// Broker mit gebundenem Listener
pub struct GebundenerBroker {
    server: BrokerServer,
    health: HealthState,
}

impl GebundenerBroker {
    pub fn lokale_adresse(&self) -> Result<SocketAddr> {
        Ok(self.server.lokale_adresse()?)
    }

    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let ergebnis = self.server.starten(shutdown_rx).await;
        self.health.bus_status_setzen(false);
        ergebnis?;
        Ok(())
    }
}
