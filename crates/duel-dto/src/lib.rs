//! Wire-format types shared between every edge of the duel backend:
//! the bidirectional event channel (§6.1) and the player-observable error
//! taxonomy (§7). Kept dependency-light and serde-only so both the server
//! and any client bindings can share it.

pub mod error;
pub mod event;

pub use error::DuelError;
pub use event::duel_ghost_event::GhostEventKind;
pub use event::{ClientEvent, Cursor, PowerUpType, ServerEvent, TestCaseResult};
