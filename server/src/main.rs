//! Empowerly Broker – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Broker.

use anyhow::Result;
use empowerly_broker::{config::BrokerConfig, Broker};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("EC_BROKER_CONFIG").unwrap_or_else(|_| "broker.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = BrokerConfig::laden(&config_pfad)?;

    empowerly_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        tcp = %config.tcp_bind_adresse(),
        "Empowerly Broker wird initialisiert"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown-Signal empfangen, Broker wird beendet");
            let _ = shutdown_tx.send(true);
        }
    });

    Broker::neu(config)?.starten(shutdown_rx).await
}
