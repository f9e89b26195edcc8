//! empowerly-meeting – Meeting-Session von Beitritt bis Abbau
//!
//! Dieses Crate verbindet die anderen Bausteine zu einer Teilnahme:
//! - [`api`] / [`http_api`]: Meeting-Metadaten, Beitritt, Einladungen (REST)
//! - [`timer`]: Countdown bis zum Meeting-Ende
//! - [`roster`]: Teilnehmerliste
//! - [`session`]: Lebenszyklus, Ereignis-Schleife, Abbau

pub mod api;
pub mod error;
pub mod http_api;
pub mod roster;
pub mod session;
pub mod timer;

// Bequeme Re-Exporte
pub use api::{
    ApiError, ApiResult, Benutzer, EinladungsAnfrage, MeetingApi, MeetingInfo, MeetingStatus,
    TeilnehmerInfo, STANDARD_DAUER_MINUTEN,
};
pub use error::{MeetingError, MeetingResult};
pub use http_api::{HttpMeetingApi, STANDARD_API_URL};
pub use roster::{Roster, Teilnehmer, TeilnehmerStatus};
pub use session::{
    EndeGrund, Hinweis, HinweisStufe, MeetingSession, SessionBefehl, SessionConfig, SessionEnde,
    SessionEreignis, SessionStatus,
};
pub use timer::{zeit_formatieren, SessionTimer, TimerEreignis, Warnstufe, STANDARD_TICK};
