//! empowerly-media – Lokale Medien einer Meeting-Session
//!
//! - Kamera und Mikrofon erfassen (ohne Wiederholung bei Zugriffsfehlern)
//! - Stumm- und Videoschaltung ueber geteilte Track-Handles
//! - Bildschirmfreigabe mit Video-Ersatz auf allen Peers
//! - Lokale Aufzeichnung als WebM-Datei
//! - Synthetische Plattform fuer Tests und den Headless-Client

pub mod controller;
pub mod error;
pub mod platform;
pub mod recording;
pub mod synthetic;
pub mod track;

// Bequeme Re-Exporte der wichtigsten Typen
pub use controller::MediaController;
pub use error::{MediaError, MediaResult};
pub use platform::{MediaPlatform, MedienAnforderung, VideoSenke};
pub use recording::{aufzeichnungs_dateiname, Aufzeichnung};
pub use synthetic::SynthetischePlattform;
pub use track::{LokalerStream, MediaTrack, TrackArt, TrackQuelle};
