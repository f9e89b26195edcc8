//! PeerRegistry – genau eine Verbindung pro entferntem Teilnehmer
//!
//! ## Ablauf
//!
//! ```text
//! join  von X          -> Initiator-Verbindung zu X (ersetzt eine alte)
//! offer von X an mich  -> Antwortende Verbindung, Angebot anwenden
//! answer von X         -> auf bestehende Verbindung anwenden, sonst verwerfen
//! ice   von X          -> anwenden oder puffern bis die Verbindung existiert
//! leave von X          -> remove_peer(X)
//! ```
//!
//! ## Gleichzeitige Angebote
//! Sehen sich zwei Teilnehmer gegenseitig beim Beitritt, schicken beide ein
//! Angebot. Die lexikographisch groessere Id gibt nach: sie verwirft die
//! eigene Verbindung und antwortet. Die kleinere Id ignoriert das fremde
//! Angebot.
//!
//! Alle Mutationen laufen ueber `&mut self`; die Registry gehoert exklusiv
//! einer Session und wird nur aus deren Ereignis-Schleife aufgerufen.

use empowerly_core::ParticipantId;
use empowerly_media::{MediaTrack, VideoSenke};
use empowerly_protocol::{IceKandidat, SdpPayload, SignalMessage, SignalTyp};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{MeshError, MeshResult};
use crate::peer::{
    PeerConnection, PeerEreignis, PeerEreignisArt, PeerFabrik, PeerKontext, PeerSignal,
    PeerTransport, PeerZustand, RemoteStream,
};

/// Maximal gepufferte ICE-Kandidaten pro Absender
pub const MAX_GEPUFFERTE_KANDIDATEN: usize = 64;

pub struct PeerRegistry<F: PeerFabrik> {
    eigene_id: ParticipantId,
    fabrik: F,
    peers: HashMap<ParticipantId, PeerConnection<F::Transport>>,
    /// Kandidaten, die vor ihrer Verbindung ankamen
    kandidaten_puffer: HashMap<ParticipantId, VecDeque<IceKandidat>>,
    naechste_generation: u64,
    ereignis_tx: mpsc::UnboundedSender<PeerEreignis>,
    ereignis_rx: mpsc::UnboundedReceiver<PeerEreignis>,
}

impl<F: PeerFabrik> PeerRegistry<F> {
    pub fn neu(eigene_id: ParticipantId, fabrik: F) -> Self {
        let (ereignis_tx, ereignis_rx) = mpsc::unbounded_channel();
        Self {
            eigene_id,
            fabrik,
            peers: HashMap::new(),
            kandidaten_puffer: HashMap::new(),
            naechste_generation: 0,
            ereignis_tx,
            ereignis_rx,
        }
    }

    pub fn eigene_id(&self) -> &ParticipantId {
        &self.eigene_id
    }

    pub fn fabrik(&self) -> &F {
        &self.fabrik
    }

    pub fn anzahl(&self) -> usize {
        self.peers.len()
    }

    pub fn peer(&self, teilnehmer: &ParticipantId) -> Option<&PeerConnection<F::Transport>> {
        self.peers.get(teilnehmer)
    }

    /// Ids aller verbundenen Teilnehmer, sortiert
    pub fn teilnehmer(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn remote_stream(&self, teilnehmer: &ParticipantId) -> Option<Arc<RemoteStream>> {
        self.peers.get(teilnehmer).and_then(|p| p.remote_stream())
    }

    pub fn gepufferte_kandidaten(&self, teilnehmer: &ParticipantId) -> usize {
        self.kandidaten_puffer.get(teilnehmer).map_or(0, |q| q.len())
    }

    // -----------------------------------------------------------------------
    // Eingehende Signale
    // -----------------------------------------------------------------------

    /// Verarbeitet eine Meeting-Nachricht
    ///
    /// Eigene Nachrichten und gezielte Nachrichten an andere werden
    /// ignoriert. `tracks` sind die lokalen Tracks fuer neue Verbindungen.
    /// Ein Verhandlungsfehler entfernt nur die betroffene Verbindung.
    pub fn signal_verarbeiten(
        &mut self,
        nachricht: &SignalMessage,
        tracks: &[MediaTrack],
    ) -> MeshResult<()> {
        let sender = &nachricht.sender_id;
        if *sender == self.eigene_id || !nachricht.ist_fuer(&self.eigene_id) {
            return Ok(());
        }

        match nachricht.typ {
            SignalTyp::Join => self.beitritt(sender, tracks),
            SignalTyp::Offer => {
                let sdp: SdpPayload = nachricht.payload_als()?;
                self.angebot(sender, sdp, tracks)
            }
            SignalTyp::Answer => {
                let sdp: SdpPayload = nachricht.payload_als()?;
                self.antwort(sender, sdp)
            }
            SignalTyp::IceCandidate => {
                let kandidat: IceKandidat = nachricht.payload_als()?;
                self.kandidat(sender, kandidat)
            }
            SignalTyp::Leave => {
                self.remove_peer(sender);
                Ok(())
            }
            SignalTyp::Chat => Ok(()),
        }
    }

    fn beitritt(&mut self, sender: &ParticipantId, tracks: &[MediaTrack]) -> MeshResult<()> {
        if self.remove_peer(sender) {
            tracing::info!(teilnehmer = %sender, "Teilnehmer erneut beigetreten – Verbindung ersetzt");
        }
        tracing::info!(teilnehmer = %sender, "Neuer Teilnehmer – sende Angebot");
        self.peer_erstellen(sender, true, tracks)?;
        self.kandidaten_nachreichen(sender);
        Ok(())
    }

    fn angebot(
        &mut self,
        sender: &ParticipantId,
        sdp: SdpPayload,
        tracks: &[MediaTrack],
    ) -> MeshResult<()> {
        if let Some(peer) = self.peers.get(sender) {
            if peer.ist_initiator() && peer.zustand() != PeerZustand::Verbunden {
                if self.eigene_id < *sender {
                    tracing::debug!(teilnehmer = %sender, "Gleichzeitiges Angebot ignoriert");
                    return Ok(());
                }
                tracing::debug!(teilnehmer = %sender, "Gleichzeitiges Angebot – gebe nach");
                self.remove_peer(sender);
            } else {
                tracing::debug!(teilnehmer = %sender, "Neuverhandlung");
                return self.anwenden(sender, PeerSignal::Angebot(sdp));
            }
        }

        self.peer_erstellen(sender, false, tracks)?;
        self.anwenden(sender, PeerSignal::Angebot(sdp))?;
        self.kandidaten_nachreichen(sender);
        Ok(())
    }

    fn antwort(&mut self, sender: &ParticipantId, sdp: SdpPayload) -> MeshResult<()> {
        if !self.peers.contains_key(sender) {
            tracing::debug!(teilnehmer = %sender, "Antwort ohne Verbindung verworfen");
            return Ok(());
        }
        self.anwenden(sender, PeerSignal::Antwort(sdp))
    }

    fn kandidat(&mut self, sender: &ParticipantId, kandidat: IceKandidat) -> MeshResult<()> {
        if self.peers.contains_key(sender) {
            return self.anwenden(sender, PeerSignal::Kandidat(kandidat));
        }
        let puffer = self.kandidaten_puffer.entry(sender.clone()).or_default();
        if puffer.len() >= MAX_GEPUFFERTE_KANDIDATEN {
            puffer.pop_front();
            tracing::warn!(teilnehmer = %sender, "Kandidaten-Puffer voll – aeltester verworfen");
        }
        puffer.push_back(kandidat);
        Ok(())
    }

    fn peer_erstellen(
        &mut self,
        teilnehmer: &ParticipantId,
        initiator: bool,
        tracks: &[MediaTrack],
    ) -> MeshResult<()> {
        self.naechste_generation += 1;
        let generation = self.naechste_generation;
        let kontext = PeerKontext {
            eigene_id: self.eigene_id.clone(),
            teilnehmer: teilnehmer.clone(),
            initiator,
            generation,
            tracks: tracks.to_vec(),
            ereignisse: self.ereignis_tx.clone(),
        };
        let transport = self.fabrik.erstellen(kontext)?;
        let mut peer = PeerConnection::neu(teilnehmer.clone(), initiator, generation, transport);
        if initiator {
            peer.zustand_setzen(PeerZustand::Verhandelnd);
        }
        self.peers.insert(teilnehmer.clone(), peer);
        Ok(())
    }

    fn kandidaten_nachreichen(&mut self, teilnehmer: &ParticipantId) {
        let Some(puffer) = self.kandidaten_puffer.remove(teilnehmer) else {
            return;
        };
        tracing::debug!(teilnehmer = %teilnehmer, anzahl = puffer.len(), "Gepufferte Kandidaten angewendet");
        for kandidat in puffer {
            if let Err(e) = self.anwenden(teilnehmer, PeerSignal::Kandidat(kandidat)) {
                tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Gepufferter Kandidat abgelehnt");
                return;
            }
        }
    }

    /// Wendet ein Signal an; bei Fehler wird die Verbindung entfernt
    fn anwenden(&mut self, teilnehmer: &ParticipantId, signal: PeerSignal) -> MeshResult<()> {
        let Some(peer) = self.peers.get_mut(teilnehmer) else {
            return Ok(());
        };
        if matches!(signal, PeerSignal::Angebot(_) | PeerSignal::Antwort(_)) {
            peer.zustand_setzen(PeerZustand::Verhandelnd);
        }
        match peer.transport_mut().signal_anwenden(signal) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Verhandlung fehlgeschlagen");
                self.remove_peer(teilnehmer);
                Err(match e {
                    MeshError::Verhandlung { .. } => e,
                    andere => MeshError::verhandlung(teilnehmer, andere.to_string()),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transport-Ereignisse
    // -----------------------------------------------------------------------

    /// Wartet auf das naechste Transport-Ereignis
    pub async fn naechstes_ereignis(&mut self) -> Option<PeerEreignis> {
        self.ereignis_rx.recv().await
    }

    /// Verarbeitet ein Transport-Ereignis
    ///
    /// Gibt eine zu veroeffentlichende Nachricht zurueck, wenn der Transport
    /// ein Signal an den Teilnehmer senden will.
    pub fn ereignis_verarbeiten(&mut self, ereignis: PeerEreignis) -> Option<SignalMessage> {
        let PeerEreignis {
            teilnehmer,
            generation,
            art,
        } = ereignis;

        let peer = match self.peers.get_mut(&teilnehmer) {
            Some(p) if p.generation() == generation => p,
            _ => {
                tracing::trace!(teilnehmer = %teilnehmer, generation, "Veraltetes Peer-Ereignis ignoriert");
                return None;
            }
        };

        match art {
            PeerEreignisArt::Signal(signal) => {
                let ergebnis = match signal {
                    PeerSignal::Angebot(sdp) => {
                        SignalMessage::gezielt(SignalTyp::Offer, self.eigene_id.clone(), teilnehmer.clone(), sdp)
                    }
                    PeerSignal::Antwort(sdp) => {
                        SignalMessage::gezielt(SignalTyp::Answer, self.eigene_id.clone(), teilnehmer.clone(), sdp)
                    }
                    PeerSignal::Kandidat(k) => SignalMessage::gezielt(
                        SignalTyp::IceCandidate,
                        self.eigene_id.clone(),
                        teilnehmer.clone(),
                        k,
                    ),
                };
                match ergebnis {
                    Ok(nachricht) => Some(nachricht),
                    Err(e) => {
                        tracing::warn!(teilnehmer = %teilnehmer, fehler = %e, "Signal nicht serialisierbar");
                        None
                    }
                }
            }
            PeerEreignisArt::Verbunden => {
                peer.zustand_setzen(PeerZustand::Verbunden);
                tracing::info!(teilnehmer = %teilnehmer, "Peer verbunden");
                None
            }
            PeerEreignisArt::RemoteStream(stream) => {
                peer.remote_setzen(&stream);
                tracing::debug!(teilnehmer = %teilnehmer, tracks = stream.tracks.len(), "Remote-Stream empfangen");
                None
            }
            PeerEreignisArt::Fehler(grund) => {
                tracing::warn!(teilnehmer = %teilnehmer, grund = %grund, "Peer-Verbindung fehlgeschlagen");
                self.remove_peer(&teilnehmer);
                None
            }
            PeerEreignisArt::Geschlossen => {
                tracing::info!(teilnehmer = %teilnehmer, "Peer-Verbindung geschlossen");
                self.remove_peer(&teilnehmer);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Entfernen
    // -----------------------------------------------------------------------

    /// Schliesst und entfernt die Verbindung zu `teilnehmer`
    ///
    /// Gibt `false` zurueck, wenn keine Verbindung bestand.
    pub fn remove_peer(&mut self, teilnehmer: &ParticipantId) -> bool {
        self.kandidaten_puffer.remove(teilnehmer);
        match self.peers.remove(teilnehmer) {
            Some(mut peer) => {
                peer.schliessen();
                tracing::debug!(teilnehmer = %teilnehmer, "Peer entfernt");
                true
            }
            None => false,
        }
    }

    /// Schliesst alle Verbindungen
    pub fn alle_entfernen(&mut self) {
        let ids: Vec<ParticipantId> = self.peers.keys().cloned().collect();
        for id in ids {
            self.remove_peer(&id);
        }
        self.kandidaten_puffer.clear();
    }
}

impl<F: PeerFabrik> VideoSenke for PeerRegistry<F> {
    fn video_ersetzen(&mut self, track: &MediaTrack) -> usize {
        let mut anzahl = 0;
        for peer in self.peers.values_mut() {
            if peer.zustand() != PeerZustand::Geschlossen {
                peer.transport_mut().video_ersetzen(track);
                anzahl += 1;
            }
        }
        anzahl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{ProtokollEintrag, SynthetischeFabrik};
    use empowerly_media::TrackQuelle;
    use empowerly_protocol::{LeavePayload, SdpArt};
    use serde_json::json;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn join(von: &str) -> SignalMessage {
        SignalMessage::broadcast(SignalTyp::Join, pid(von), json!({})).unwrap()
    }

    fn angebot(von: &str, an: &str) -> SignalMessage {
        SignalMessage::gezielt(
            SignalTyp::Offer,
            pid(von),
            pid(an),
            SdpPayload {
                art: SdpArt::Offer,
                sdp: format!("angebot-{}", von),
            },
        )
        .unwrap()
    }

    fn kandidat(von: &str, an: &str, n: usize) -> SignalMessage {
        SignalMessage::gezielt(
            SignalTyp::IceCandidate,
            pid(von),
            pid(an),
            IceKandidat {
                candidate: format!("candidate:{}", n),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            },
        )
        .unwrap()
    }

    fn registry(id: &str) -> PeerRegistry<SynthetischeFabrik> {
        PeerRegistry::neu(pid(id), SynthetischeFabrik::neu())
    }

    /// Verarbeitet alle anstehenden Ereignisse und sammelt ausgehende Nachrichten
    fn ereignisse_leeren(reg: &mut PeerRegistry<SynthetischeFabrik>) -> Vec<SignalMessage> {
        let mut raus = Vec::new();
        while let Ok(e) = reg.ereignis_rx.try_recv() {
            if let Some(n) = reg.ereignis_verarbeiten(e) {
                raus.push(n);
            }
        }
        raus
    }

    #[test]
    fn join_erstellt_initiator_und_angebot() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();

        let peer = reg.peer(&pid("b")).unwrap();
        assert!(peer.ist_initiator());
        assert_eq!(peer.zustand(), PeerZustand::Verhandelnd);

        let raus = ereignisse_leeren(&mut reg);
        let angebote: Vec<_> = raus.iter().filter(|n| n.typ == SignalTyp::Offer).collect();
        assert_eq!(angebote.len(), 1);
        assert_eq!(angebote[0].target_id, Some(pid("b")));
    }

    #[test]
    fn eigene_nachrichten_werden_ignoriert() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("a"), &[]).unwrap();
        assert_eq!(reg.anzahl(), 0);
    }

    #[test]
    fn angebot_an_andere_wird_ignoriert() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&angebot("b", "c"), &[]).unwrap();
        assert_eq!(reg.anzahl(), 0);
    }

    #[test]
    fn wiederholter_join_haelt_eine_verbindung() {
        let mut reg = registry("a");
        for _ in 0..5 {
            reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        }
        assert_eq!(reg.anzahl(), 1);
        assert_eq!(reg.peer(&pid("b")).unwrap().generation(), 5);
        // Vier ersetzte Transports wurden geschlossen
        let geschlossen = reg
            .fabrik()
            .protokoll()
            .iter()
            .filter(|e| matches!(e, ProtokollEintrag::Geschlossen { .. }))
            .count();
        assert_eq!(geschlossen, 4);
    }

    #[test]
    fn ereignisse_ersetzter_verbindungen_werden_ignoriert() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        let raus = ereignisse_leeren(&mut reg);
        // Nur das Angebot der zweiten Verbindung geht raus
        assert_eq!(raus.iter().filter(|n| n.typ == SignalTyp::Offer).count(), 1);
    }

    #[test]
    fn angebot_erzeugt_antwort() {
        let mut reg = registry("b");
        reg.signal_verarbeiten(&angebot("a", "b"), &[]).unwrap();
        let peer = reg.peer(&pid("a")).unwrap();
        assert!(!peer.ist_initiator());

        let raus = ereignisse_leeren(&mut reg);
        assert!(raus
            .iter()
            .any(|n| n.typ == SignalTyp::Answer && n.target_id == Some(pid("a"))));
    }

    #[test]
    fn antwort_ohne_verbindung_wird_verworfen() {
        let mut reg = registry("a");
        let antwort = SignalMessage::gezielt(
            SignalTyp::Answer,
            pid("b"),
            pid("a"),
            SdpPayload {
                art: SdpArt::Answer,
                sdp: "x".into(),
            },
        )
        .unwrap();
        reg.signal_verarbeiten(&antwort, &[]).unwrap();
        assert_eq!(reg.anzahl(), 0);
    }

    #[test]
    fn fruehe_kandidaten_werden_gepuffert_und_nachgereicht() {
        let mut reg = registry("b");
        for n in 0..3 {
            reg.signal_verarbeiten(&kandidat("a", "b", n), &[]).unwrap();
        }
        assert_eq!(reg.gepufferte_kandidaten(&pid("a")), 3);

        reg.signal_verarbeiten(&angebot("a", "b"), &[]).unwrap();
        assert_eq!(reg.gepufferte_kandidaten(&pid("a")), 0);
        let angewendet = reg
            .fabrik()
            .protokoll()
            .iter()
            .filter(|e| matches!(e, ProtokollEintrag::KandidatAngewendet { .. }))
            .count();
        assert_eq!(angewendet, 3);
    }

    #[test]
    fn kandidaten_puffer_ist_begrenzt() {
        let mut reg = registry("b");
        for n in 0..(MAX_GEPUFFERTE_KANDIDATEN + 10) {
            reg.signal_verarbeiten(&kandidat("a", "b", n), &[]).unwrap();
        }
        assert_eq!(reg.gepufferte_kandidaten(&pid("a")), MAX_GEPUFFERTE_KANDIDATEN);
        assert!(!reg.remove_peer(&pid("a")));
        assert_eq!(reg.gepufferte_kandidaten(&pid("a")), 0);
    }

    #[test]
    fn gleichzeitige_angebote_kleinere_id_ignoriert() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        let generation = reg.peer(&pid("b")).unwrap().generation();

        reg.signal_verarbeiten(&angebot("b", "a"), &[]).unwrap();
        let peer = reg.peer(&pid("b")).unwrap();
        assert!(peer.ist_initiator());
        assert_eq!(peer.generation(), generation);
    }

    #[test]
    fn gleichzeitige_angebote_groessere_id_gibt_nach() {
        let mut reg = registry("b");
        reg.signal_verarbeiten(&join("a"), &[]).unwrap();

        reg.signal_verarbeiten(&angebot("a", "b"), &[]).unwrap();
        let peer = reg.peer(&pid("a")).unwrap();
        assert!(!peer.ist_initiator());
        assert_eq!(reg.anzahl(), 1);
    }

    #[test]
    fn leave_entfernt_verhandelnden_peer() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        assert_eq!(reg.peer(&pid("b")).unwrap().zustand(), PeerZustand::Verhandelnd);

        let leave = SignalMessage::broadcast(SignalTyp::Leave, pid("b"), LeavePayload::default()).unwrap();
        reg.signal_verarbeiten(&leave, &[]).unwrap();
        assert_eq!(reg.anzahl(), 0);
        assert!(reg
            .fabrik()
            .protokoll()
            .contains(&ProtokollEintrag::Geschlossen { teilnehmer: pid("b") }));
        // Zweites Entfernen ist wirkungslos
        assert!(!reg.remove_peer(&pid("b")));
    }

    #[test]
    fn entfernen_gibt_remote_stream_frei() {
        let mut reg = registry("b");
        reg.fabrik().auto_verbinden(true);
        reg.signal_verarbeiten(&angebot("a", "b"), &[]).unwrap();
        ereignisse_leeren(&mut reg);

        assert_eq!(reg.peer(&pid("a")).unwrap().zustand(), PeerZustand::Verbunden);
        let schwach = Arc::downgrade(&reg.remote_stream(&pid("a")).unwrap());
        assert!(schwach.upgrade().is_some());

        assert!(reg.remove_peer(&pid("a")));
        assert!(schwach.upgrade().is_none());
    }

    #[test]
    fn transportfehler_entfernt_nur_diesen_peer() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        reg.signal_verarbeiten(&join("c"), &[]).unwrap();
        ereignisse_leeren(&mut reg);

        let generation = reg.peer(&pid("b")).unwrap().generation();
        let fehler = PeerEreignis {
            teilnehmer: pid("b"),
            generation,
            art: PeerEreignisArt::Fehler("ICE failed".into()),
        };
        assert!(reg.ereignis_verarbeiten(fehler).is_none());
        assert_eq!(reg.teilnehmer(), vec![pid("c")]);
    }

    #[test]
    fn gescheiterte_verhandlung_liefert_fehler() {
        let mut reg = registry("b");
        reg.fabrik().verhandlung_scheitern(true);
        let e = reg.signal_verarbeiten(&angebot("a", "b"), &[]).unwrap_err();
        assert!(matches!(e, MeshError::Verhandlung { .. }));
        assert_eq!(reg.anzahl(), 0);
    }

    #[test]
    fn video_ersatz_erreicht_alle_peers() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        reg.signal_verarbeiten(&join("c"), &[]).unwrap();
        let track = MediaTrack::neu(TrackQuelle::Bildschirm);
        assert_eq!(reg.video_ersetzen(&track), 2);
        for id in ["b", "c"] {
            assert_eq!(reg.fabrik().aktuelles_video(&pid(id)), Some(track.id()));
        }
    }

    #[test]
    fn alle_entfernen_schliesst_alles() {
        let mut reg = registry("a");
        reg.signal_verarbeiten(&join("b"), &[]).unwrap();
        reg.signal_verarbeiten(&kandidat("c", "a", 1), &[]).unwrap();
        reg.alle_entfernen();
        assert_eq!(reg.anzahl(), 0);
        assert_eq!(reg.gepufferte_kandidaten(&pid("c")), 0);
    }
}
