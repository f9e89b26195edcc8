//! Empowerly Client – Einstiegspunkt
//!
//! Tritt einem Meeting mit synthetischen Medien bei und liest Befehle von
//! stdin. Aufruf: `empowerly-client [meeting-id]`.

mod befehle;
mod config;

use anyhow::{Context, Result};
use config::ClientConfig;
use empowerly_core::MeetingId;
use empowerly_media::SynthetischePlattform;
use empowerly_meeting::{Hinweis, HinweisStufe, HttpMeetingApi, MeetingSession};
use empowerly_mesh::SynthetischeFabrik;
use empowerly_signaling::TcpBusConnector;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var("EC_CLIENT_CONFIG").unwrap_or_else(|_| "client.toml".into());
    let config = ClientConfig::laden(&config_pfad)?;

    empowerly_observability::logging_initialisieren(&config.logging.level, &config.logging.format);

    let meeting_id = std::env::args()
        .nth(1)
        .or_else(|| config.session.meeting_id.clone())
        .context("Keine Meeting-ID angegeben")?;
    let meeting_id = MeetingId::neu(meeting_id)?;
    let session_config = config.session_config()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        meeting = %meeting_id,
        teilnehmer = %session_config.teilnehmer_id,
        bus = %config.bus.adresse,
        "Empowerly Client wird initialisiert"
    );

    let api = HttpMeetingApi::neu(&config.api.url, config.api.token.clone(), config.api_timeout())?;
    let connector = TcpBusConnector::neu(&config.bus.adresse, config.tcp_bus_config());
    let fabrik = SynthetischeFabrik::neu();
    fabrik.auto_verbinden(true);

    let mut session = MeetingSession::neu(
        api,
        connector,
        SynthetischePlattform::neu(),
        fabrik,
        session_config,
    );

    let (hinweis_tx, mut hinweise) = mpsc::unbounded_channel();
    session.hinweise_weiterleiten(hinweis_tx);

    if let Err(e) = session.initialize(meeting_id).await {
        while let Ok(hinweis) = hinweise.try_recv() {
            eprintln!("{}", hinweis_zeile(&hinweis));
        }
        return Err(e.into());
    }
    println!("{}", befehle::HILFE);

    // Hinweise erscheinen sofort, nicht erst am Ende
    let ausgabe = tokio::spawn(async move {
        while let Some(hinweis) = hinweise.recv().await {
            println!("{}", hinweis_zeile(&hinweis));
        }
    });

    let (befehl_tx, befehl_rx) = mpsc::channel(32);
    tokio::spawn(eingabe_lesen(befehl_tx));

    let ende = session.run(befehl_rx).await?;
    // Session schliesst den Hinweis-Kanal, die Ausgabe laeuft leer
    drop(session);
    let _ = ausgabe.await;
    tracing::info!(grund = ?ende.grund, ziel = ende.ziel, "Meeting beendet");
    println!("Meeting beendet ({:?}), weiter zu {}", ende.grund, ende.ziel);
    Ok(())
}

fn hinweis_zeile(hinweis: &Hinweis) -> String {
    let stufe = match hinweis.stufe {
        HinweisStufe::Info => "Info",
        HinweisStufe::Erfolg => "OK",
        HinweisStufe::Warnung => "Warnung",
        HinweisStufe::Fehler => "Fehler",
    };
    format!("[{stufe}] {}", hinweis.text)
}

/// Liest stdin zeilenweise; EOF schliesst den Kanal und verlaesst damit das Meeting
async fn eingabe_lesen(befehle: mpsc::Sender<empowerly_meeting::SessionBefehl>) {
    let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let zeile = match zeilen.next_line().await {
            Ok(Some(zeile)) => zeile,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(fehler = %e, "stdin nicht lesbar");
                break;
            }
        };
        match befehle::parsen(&zeile) {
            Ok(Some(befehl)) => {
                if befehle.send(befehl).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{e}. {}", befehle::HILFE),
        }
    }
}
