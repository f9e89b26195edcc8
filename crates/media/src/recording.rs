//! Lokale Aufzeichnung eines Meetings
//!
//! Ein Task sammelt die Chunks des Plattform-Recorders, bis die Aufzeichnung
//! gestoppt wird, und schreibt sie dann als
//! `meeting-{id}-{epochMillis}.webm` in das Aufnahme-Verzeichnis.

use bytes::{Bytes, BytesMut};
use empowerly_core::MeetingId;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{MediaError, MediaResult};

/// Dateiname einer Aufzeichnung
pub fn aufzeichnungs_dateiname(meeting_id: &MeetingId, epoch_millis: i64) -> String {
    format!("meeting-{}-{}.webm", meeting_id, epoch_millis)
}

/// Laufende Aufzeichnung
pub struct Aufzeichnung {
    stopp_tx: oneshot::Sender<()>,
    task: JoinHandle<MediaResult<PathBuf>>,
}

impl Aufzeichnung {
    pub fn starten(
        meeting_id: MeetingId,
        verzeichnis: impl AsRef<Path>,
        mut chunks: mpsc::Receiver<Bytes>,
    ) -> Self {
        let verzeichnis = verzeichnis.as_ref().to_path_buf();
        let (stopp_tx, mut stopp_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut puffer = BytesMut::new();
            let mut offen = true;
            loop {
                tokio::select! {
                    _ = &mut stopp_rx => break,
                    chunk = chunks.recv(), if offen => match chunk {
                        Some(c) => puffer.extend_from_slice(&c),
                        None => offen = false,
                    },
                }
            }
            drop(chunks);

            let name = aufzeichnungs_dateiname(&meeting_id, chrono::Utc::now().timestamp_millis());
            let pfad = verzeichnis.join(name);
            tokio::fs::create_dir_all(&verzeichnis).await?;
            tokio::fs::write(&pfad, &puffer).await?;
            tracing::info!(
                pfad = %pfad.display(),
                bytes = puffer.len(),
                "Aufzeichnung gespeichert"
            );
            Ok(pfad)
        });

        tracing::info!("Aufzeichnung gestartet");
        Self { stopp_tx, task }
    }

    /// Stoppt die Aufzeichnung und gibt den Pfad der geschriebenen Datei zurueck
    pub async fn stoppen(self) -> MediaResult<PathBuf> {
        // Task kann schon beendet sein, dann liefert `task` das Ergebnis
        let _ = self.stopp_tx.send(());
        self.task
            .await
            .map_err(|e| MediaError::Aufnahme(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dateiname_folgt_dem_muster() {
        let id = MeetingId::neu("m7").unwrap();
        assert_eq!(
            aufzeichnungs_dateiname(&id, 1_700_000_000_123),
            "meeting-m7-1700000000123.webm"
        );
    }

    #[tokio::test]
    async fn chunks_werden_in_datei_geschrieben() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let aufzeichnung = Aufzeichnung::starten(MeetingId::neu("m1").unwrap(), dir.path(), rx);

        tx.send(Bytes::from_static(b"abc")).await.unwrap();
        tx.send(Bytes::from_static(b"def")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let pfad = aufzeichnung.stoppen().await.unwrap();
        let name = pfad.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("meeting-m1-"));
        assert!(name.ends_with(".webm"));
        assert_eq!(std::fs::read(&pfad).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn geschlossene_quelle_wartet_auf_stopp() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let aufzeichnung = Aufzeichnung::starten(MeetingId::neu("m2").unwrap(), dir.path(), rx);
        tx.send(Bytes::from_static(b"x")).await.unwrap();
        drop(tx);

        let pfad = aufzeichnung.stoppen().await.unwrap();
        assert_eq!(std::fs::read(&pfad).unwrap(), b"x");
    }
}
