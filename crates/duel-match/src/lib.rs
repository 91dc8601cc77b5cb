//! Match state, the lobby/countdown/active/completed finite state machine,
//! power-ups, hints, and Elo (§4.3, §4.5, §4.6, §4.8, §4.9 step 8).
//!
//! ## Submodules
//!
//! - [`state`] — `MatchState` (C3, ephemeral) and `Match` (durable row)
//! - [`engine`] — `MatchEngine`, the typestate-encoded FSM (C5)
//! - [`powerup`] — `PowerUpState`, the three-effect power-up engine (C6)
//! - [`hint`] — `HintState` and hidden-data redaction (C9)
//! - [`elo`] — the K=32 logistic rating update (§4.9 step 8)
//! - [`repository`] — durable persistence for `Match` rows

pub mod elo;
pub mod engine;
pub mod hint;
pub mod powerup;
#[cfg(feature = "database")]
pub mod repository;
pub mod state;

pub use elo::{Outcome, delta, update_pair};
pub use engine::MatchEngine;
pub use hint::{HintAvailability, HintState, redact_hidden_data};
pub use powerup::{ActivateError, ActivationEffect, PowerUpState};
#[cfg(feature = "database")]
pub use repository::MatchRepository;
pub use state::{Match, MatchState, MatchStatus, PlayerSlot};
