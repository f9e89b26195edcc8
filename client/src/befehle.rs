//! Eingabezeilen des Kommandozeilen-Clients
//!
//! Zeilen mit `/` sind Befehle, alles andere geht als Chat-Nachricht raus.
//!
//! ```text
//! /mute            Mikrofon an/aus
//! /video           Kamera an/aus
//! /screen          Bildschirmfreigabe an/aus
//! /rec             Aufzeichnung an/aus
//! /invite a,b c    Benutzer einladen
//! /leave           Meeting verlassen
//! /end             Meeting fuer alle beenden (nur Host)
//! ```

use empowerly_core::ParticipantId;
use empowerly_meeting::SessionBefehl;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BefehlsFehler {
    #[error("Unbekannter Befehl: /{0}")]
    Unbekannt(String),

    #[error("/invite braucht mindestens eine Benutzer-ID")]
    KeineEmpfaenger,
}

pub const HILFE: &str =
    "Befehle: /mute /video /screen /rec /invite <ids> /leave /end, sonst Chat-Text";

/// Uebersetzt eine Eingabezeile; leere Zeilen ergeben `None`
pub fn parsen(zeile: &str) -> Result<Option<SessionBefehl>, BefehlsFehler> {
    let zeile = zeile.trim();
    if zeile.is_empty() {
        return Ok(None);
    }

    let Some(befehl) = zeile.strip_prefix('/') else {
        return Ok(Some(SessionBefehl::Chat(zeile.to_string())));
    };

    let (name, rest) = befehl
        .split_once(char::is_whitespace)
        .unwrap_or((befehl, ""));

    let befehl = match name.to_ascii_lowercase().as_str() {
        "mute" => SessionBefehl::StummUmschalten,
        "video" => SessionBefehl::VideoUmschalten,
        "screen" => SessionBefehl::BildschirmUmschalten,
        "rec" => SessionBefehl::AufzeichnungUmschalten,
        "leave" => SessionBefehl::Verlassen,
        "end" => SessionBefehl::FuerAlleBeenden,
        "invite" => {
            let ids: Vec<ParticipantId> = rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(ParticipantId::from)
                .collect();
            if ids.is_empty() {
                return Err(BefehlsFehler::KeineEmpfaenger);
            }
            SessionBefehl::Einladen(ids)
        }
        andere => return Err(BefehlsFehler::Unbekannt(andere.to_string())),
    };
    Ok(Some(befehl))
}
