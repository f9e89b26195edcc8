//! Client-Konfiguration
//!
//! TOML-Datei mit Standardwerten fuer alle Felder. Ohne Datei verbindet sich
//! der Client mit einem lokalen Broker und einer lokalen Meeting-API.

use anyhow::Context;
use empowerly_core::{ParticipantId, Rolle};
use empowerly_meeting::{SessionConfig, STANDARD_API_URL};
use empowerly_signaling::{KanalConfig, TcpBusConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Meeting-API (REST)
    pub api: ApiEinstellungen,
    /// Signaling-Bus
    pub bus: BusEinstellungen,
    /// Eigene Identitaet
    pub teilnehmer: TeilnehmerEinstellungen,
    pub session: SessionEinstellungen,
    pub logging: LoggingEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEinstellungen {
    pub url: String,
    /// Bearer-Token (leer = ohne Authentifizierung)
    pub token: Option<String>,
    pub timeout_s: u64,
}

impl Default for ApiEinstellungen {
    fn default() -> Self {
        Self {
            url: STANDARD_API_URL.into(),
            token: None,
            timeout_s: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusEinstellungen {
    /// Adresse des Brokers (host:port)
    pub adresse: String,
    pub heartbeat_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// Pause vor einem erneuten Verbindungsversuch
    pub reconnect_ms: u64,
    /// Wartezeit auf die erste Verbindung beim Beitritt
    pub verbindungs_timeout_s: u64,
}

impl Default for BusEinstellungen {
    fn default() -> Self {
        Self {
            adresse: "127.0.0.1:61613".into(),
            heartbeat_ms: 4000,
            heartbeat_timeout_ms: 12000,
            reconnect_ms: 5000,
            verbindungs_timeout_s: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeilnehmerEinstellungen {
    pub id: String,
    pub name: String,
    /// ADMIN, HR oder EMPLOYEE
    pub rolle: String,
}

impl Default for TeilnehmerEinstellungen {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "Gast".into(),
            rolle: Rolle::Mitarbeiter.as_str().into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Meeting das ohne Kommandozeilen-Argument betreten wird
    pub meeting_id: Option<String>,
    pub tick_ms: u64,
    pub aufnahme_verzeichnis: PathBuf,
    pub audio: bool,
    pub video: bool,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            meeting_id: None,
            tick_ms: 1000,
            aufnahme_verzeichnis: PathBuf::from("."),
            audio: true,
            video: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    pub level: String,
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn tcp_bus_config(&self) -> TcpBusConfig {
        TcpBusConfig {
            heartbeat: Duration::from_millis(self.bus.heartbeat_ms.max(1)),
            heartbeat_timeout: Duration::from_millis(self.bus.heartbeat_timeout_ms.max(1)),
            ..TcpBusConfig::default()
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_s.max(1))
    }

    /// Baut die Session-Konfiguration; Identitaet und Rolle muessen gueltig sein
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let id = ParticipantId::neu(self.teilnehmer.id.as_str())
            .context("[teilnehmer] id fehlt")?;
        let rolle: Rolle = self
            .teilnehmer
            .rolle
            .parse()
            .with_context(|| format!("[teilnehmer] rolle '{}'", self.teilnehmer.rolle))?;

        let mut config = SessionConfig::neu(id, self.teilnehmer.name.clone(), rolle);
        config.kanal = KanalConfig {
            reconnect_verzoegerung: Duration::from_millis(self.bus.reconnect_ms),
        };
        config.verbindungs_timeout = Duration::from_secs(self.bus.verbindungs_timeout_s.max(1));
        config.tick_intervall = Duration::from_millis(self.session.tick_ms.max(10));
        config.medien.audio = self.session.audio;
        config.medien.video = self.session.video;
        config.aufnahme_verzeichnis = self.session.aufnahme_verzeichnis.clone();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardwerte() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.api.url, STANDARD_API_URL);
        assert_eq!(cfg.bus.adresse, "127.0.0.1:61613");
        assert_eq!(cfg.bus.reconnect_ms, 5000);
        assert_eq!(cfg.tcp_bus_config().heartbeat, Duration::from_millis(4000));
    }

    #[test]
    fn ohne_id_keine_session() {
        let cfg = ClientConfig::default();
        assert!(cfg.session_config().is_err());
    }

    #[test]
    fn session_config_aus_toml() {
        let toml = r#"
            [teilnehmer]
            id = "u-17"
            name = "Ida"
            rolle = "hr"

            [bus]
            reconnect_ms = 250

            [session]
            video = false
            aufnahme_verzeichnis = "/tmp/aufnahmen"
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        let sc = cfg.session_config().unwrap();
        assert_eq!(sc.teilnehmer_id.as_str(), "u-17");
        assert_eq!(sc.rolle, Rolle::Personal);
        assert_eq!(sc.kanal.reconnect_verzoegerung, Duration::from_millis(250));
        assert!(sc.medien.audio);
        assert!(!sc.medien.video);
        assert_eq!(sc.aufnahme_verzeichnis, PathBuf::from("/tmp/aufnahmen"));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(sc.tick_intervall, Duration::from_secs(1));
    }

    #[test]
    fn unbekannte_rolle_ist_fehler() {
        let mut cfg = ClientConfig::default();
        cfg.teilnehmer.id = "u-1".into();
        cfg.teilnehmer.rolle = "manager".into();
        assert!(cfg.session_config().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("client.toml");
        let cfg = ClientConfig::laden(pfad.to_str().unwrap()).unwrap();
        assert_eq!(cfg.teilnehmer.name, "Gast");
    }
}
