//! Ghost Race (§4.10, C10): single-player mode replaying a saved
//! [`GhostRecording`] against a challenge. A degenerate specialization of
//! the Match FSM (C5) and Replay Log (C7): one player instead of two, and
//! playback instead of capture.

mod race;
mod recording;
#[cfg(feature = "database")]
pub mod repository;

pub use race::GhostRace;
pub use race::RaceOutcome;
pub use race::RaceStatus;
pub use recording::GhostEvent;
pub use recording::GhostRecording;
pub use recording::from_match_replay;
pub use recording::synthesize_ai_ghost;
#[cfg(feature = "database")]
pub use repository::GhostRepository;
#[cfg(feature = "database")]
pub use repository::schema::GhostRecordings;
