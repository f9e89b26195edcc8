//! Teilnehmerliste einer Session
//!
//! Startet mit den Teilnehmern aus den Meeting-Metadaten und wird durch
//! `join`/`leave`-Nachrichten fortgeschrieben. Reihenfolge = erste Sichtung.

use chrono::{NaiveDateTime, Utc};
use empowerly_core::ParticipantId;
use serde::{Deserialize, Serialize};

use crate::api::{Benutzer, MeetingInfo};

/// Status eines Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeilnehmerStatus {
    #[serde(rename = "INVITED", alias = "ACCEPTED")]
    Eingeladen,
    #[serde(rename = "JOINED")]
    Beigetreten,
    #[serde(rename = "LEFT", alias = "DECLINED")]
    Verlassen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Teilnehmer {
    pub id: ParticipantId,
    pub name: Option<String>,
    pub status: TeilnehmerStatus,
    pub joined_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    eintraege: Vec<Teilnehmer>,
}

impl Roster {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn aus_meeting(info: &MeetingInfo) -> Self {
        let mut roster = Self::neu();
        roster.abgleichen(info);
        roster
    }

    /// Uebernimmt den Stand der API; unbekannte Teilnehmer werden angehaengt
    pub fn abgleichen(&mut self, info: &MeetingInfo) {
        for p in &info.participants {
            match self.eintraege.iter_mut().find(|t| t.id == p.user_id) {
                Some(t) => {
                    t.status = p.status;
                    if p.user_name.is_some() {
                        t.name = p.user_name.clone();
                    }
                    if p.joined_at.is_some() {
                        t.joined_at = p.joined_at;
                    }
                }
                None => self.eintraege.push(Teilnehmer {
                    id: p.user_id.clone(),
                    name: p.user_name.clone(),
                    status: p.status,
                    joined_at: p.joined_at,
                }),
            }
        }
    }

    /// Markiert einen Teilnehmer als beigetreten
    pub fn beigetreten(&mut self, id: &ParticipantId, name: Option<String>) {
        let jetzt = Utc::now().naive_utc();
        match self.eintraege.iter_mut().find(|t| t.id == *id) {
            Some(t) => {
                t.status = TeilnehmerStatus::Beigetreten;
                t.joined_at = Some(jetzt);
                if name.is_some() {
                    t.name = name;
                }
            }
            None => self.eintraege.push(Teilnehmer {
                id: id.clone(),
                name,
                status: TeilnehmerStatus::Beigetreten,
                joined_at: Some(jetzt),
            }),
        }
    }

    /// Markiert einen Teilnehmer als gegangen; unbekannte Ids werden ignoriert
    pub fn verlassen(&mut self, id: &ParticipantId) -> bool {
        match self.eintraege.iter_mut().find(|t| t.id == *id) {
            Some(t) => {
                t.status = TeilnehmerStatus::Verlassen;
                true
            }
            None => false,
        }
    }

    pub fn alle(&self) -> &[Teilnehmer] {
        &self.eintraege
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Teilnehmer> {
        self.eintraege.iter().find(|t| t.id == *id)
    }

    /// Aktuell anwesende Teilnehmer
    pub fn aktive(&self) -> impl Iterator<Item = &Teilnehmer> {
        self.eintraege
            .iter()
            .filter(|t| t.status == TeilnehmerStatus::Beigetreten)
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.eintraege.iter().map(|t| t.id.clone()).collect()
    }

    /// Benutzer, die noch nicht auf der Liste stehen
    pub fn einladbar(&self, benutzer: &[Benutzer]) -> Vec<Benutzer> {
        benutzer
            .iter()
            .filter(|b| self.get(&b.id).is_none())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info() -> MeetingInfo {
        serde_json::from_value(json!({
            "id": "m-1",
            "title": "Planung",
            "hostId": "u-1",
            "status": "IN_PROGRESS",
            "participants": [
                {"userId": "u-1", "userName": "Alice", "status": "JOINED"},
                {"userId": "u-2", "userName": "Bob", "status": "INVITED"},
                {"userId": "u-3", "userName": "Cem", "status": "DECLINED"}
            ]
        }))
        .unwrap()
    }

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn api_status_aliase() {
        let s: TeilnehmerStatus = serde_json::from_str("\"ACCEPTED\"").unwrap();
        assert_eq!(s, TeilnehmerStatus::Eingeladen);
        let s: TeilnehmerStatus = serde_json::from_str("\"DECLINED\"").unwrap();
        assert_eq!(s, TeilnehmerStatus::Verlassen);
        assert_eq!(serde_json::to_string(&TeilnehmerStatus::Beigetreten).unwrap(), "\"JOINED\"");
    }

    #[test]
    fn beitritt_und_verlassen_aktualisieren_status() {
        let mut roster = Roster::aus_meeting(&info());
        assert_eq!(roster.aktive().count(), 1);

        roster.beigetreten(&id("u-2"), None);
        assert_eq!(roster.aktive().count(), 2);
        assert_eq!(roster.get(&id("u-2")).unwrap().name.as_deref(), Some("Bob"));

        assert!(roster.verlassen(&id("u-1")));
        assert!(!roster.verlassen(&id("u-9")));
        let aktive: Vec<_> = roster.aktive().map(|t| t.id.clone()).collect();
        assert_eq!(aktive, vec![id("u-2")]);
    }

    #[test]
    fn unbekannter_teilnehmer_wird_angehaengt() {
        let mut roster = Roster::aus_meeting(&info());
        roster.beigetreten(&id("gast"), Some("Gast".into()));
        assert_eq!(roster.ids().last(), Some(&id("gast")));
    }

    #[test]
    fn abgleichen_behaelt_reihenfolge() {
        let mut roster = Roster::neu();
        roster.beigetreten(&id("u-2"), Some("Bob".into()));
        roster.abgleichen(&info());
        assert_eq!(roster.ids(), vec![id("u-2"), id("u-1"), id("u-3")]);
        assert_eq!(roster.get(&id("u-2")).unwrap().status, TeilnehmerStatus::Eingeladen);
    }

    #[test]
    fn einladbar_ohne_bisherige_teilnehmer() {
        let roster = Roster::aus_meeting(&info());
        let benutzer: Vec<Benutzer> = serde_json::from_value(json!([
            {"id": "u-1", "name": "Alice"},
            {"id": "u-4", "name": "Dana"},
            {"id": "u-3", "name": "Cem"}
        ]))
        .unwrap();
        let ids: Vec<_> = roster.einladbar(&benutzer).into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![id("u-4")]);
    }
}
