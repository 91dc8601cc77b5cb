//! Core type aliases, traits, and constants for the duel backend.
//!
//! This crate provides the foundational identity types and timing
//! parameters used throughout the match-orchestration workspace.
#![allow(dead_code)]

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Skill rating, stored and transmitted as a plain integer (Elo-style).
pub type Rating = i32;
/// Milliseconds elapsed since a match's `startedAt`.
pub type MillisOffset = i64;
/// A component score in the 0..N point scale used by the judging pipeline.
pub type Score = f32;

// ============================================================================
// TRAITS
// ============================================================================
/// Random instance generation for testing.
pub trait Arbitrary {
    /// Generate a uniformly random instance.
    fn random() -> Self;
}

/// Unique identifier trait for domain entities.
pub trait Unique<T = Self> {
    fn id(&self) -> ID<T>;
}

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

/// Generic ID wrapper providing compile-time type safety over uuid::Uuid.
pub struct ID<T> {
    inner: uuid::Uuid,
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Cast ID<T> to ID<U> while preserving the underlying UUID.
    /// Useful for converting between marker types that share storage,
    /// e.g. a `Match` id reused as a `ReplayLog` id.
    pub fn cast<U>(self) -> ID<U> {
        ID {
            inner: self.inner,
            marker: PhantomData,
        }
    }
}

impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}
impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self {
            inner: uuid::Uuid::now_v7(),
            marker: PhantomData,
        }
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl<T> serde::Serialize for ID<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::from(uuid::Uuid::deserialize(deserializer)?))
    }
}

// ============================================================================
// ENTITY MARKERS
// Zero-sized marker types parameterizing `ID<T>` for each domain entity.
// Entity structs living in downstream crates implement `Unique<Marker>`;
// keeping the markers here lets every crate in the workspace share one
// `ID<Player>`/`ID<Match>` vocabulary without a dependency cycle.
// ============================================================================
pub struct Player;
pub struct Match;
pub struct Challenge;
pub struct Session;
pub struct ReplayLog;
pub struct Race;
pub struct GhostRecording;

pub type PlayerId = ID<Player>;
pub type MatchId = ID<Match>;
pub type ChallengeId = ID<Challenge>;
pub type SessionId = ID<Session>;
pub type RaceId = ID<Race>;
pub type GhostId = ID<GhostRecording>;

// ============================================================================
// MATCH LIFECYCLE TIMING
// ============================================================================
/// Number of players in a duel.
pub const N: usize = 2;
/// Countdown between both players readying up and the match clock starting.
pub const COUNTDOWN: std::time::Duration = std::time::Duration::from_secs(30);
/// Interval between server-authoritative `timer_sync` broadcasts.
pub const TIMER_SYNC_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
/// Grace window during which a dropped connection may rebind before downstream
/// cleanup (queue removal, race abandonment) runs.
pub const DISCONNECT_GRACE: std::time::Duration = std::time::Duration::from_secs(5);
/// Global watchdog around the judging pipeline; past this, a fallback
/// completion is forced rather than leaving the match stuck `active`.
pub const JUDGING_WATCHDOG: std::time::Duration = std::time::Duration::from_secs(60);
/// Per-test-case sandbox wall-clock deadline.
pub const SANDBOX_CASE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);
/// Whole-submission sandbox wall-clock deadline.
pub const SANDBOX_SUBMIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(45);

// ============================================================================
// POWER-UPS
// ============================================================================
/// Starting count for each power-up type, allocated once per match per player.
pub const POWERUP_STARTING_COUNT: u8 = 1;
/// Shared cooldown across all power-up types after any activation.
pub const POWERUP_COOLDOWN: std::time::Duration = std::time::Duration::from_secs(60);
/// `time_freeze` effect duration.
pub const TIME_FREEZE_DURATION: std::time::Duration = std::time::Duration::from_secs(10);
/// `code_peek` display window, reported to the client but not enforced server-side.
pub const CODE_PEEK_DURATION: std::time::Duration = std::time::Duration::from_secs(5);
/// `debug_shield` charge count, consumed one per test run regardless of failures.
pub const DEBUG_SHIELD_CHARGES: u8 = 3;

// ============================================================================
// HINTS
// ============================================================================
/// Minimum interval between successful hint requests for the same player.
pub const HINT_COOLDOWN: std::time::Duration = std::time::Duration::from_secs(60);
/// Maximum hints a player may use in a single match.
pub const HINT_LIMIT: u8 = 3;
/// Score multiplier penalty applied per hint used: `1 - HINT_PENALTY * hintsUsed`.
pub const HINT_PENALTY: f32 = 0.05;

// ============================================================================
// SCORING WEIGHTS
// ============================================================================
/// Maximum correctness component of the final score.
pub const SCORE_CORRECTNESS_MAX: Score = 400.0;
/// Maximum efficiency component of the final score.
pub const SCORE_EFFICIENCY_MAX: Score = 300.0;
/// Maximum quality component of the final score.
pub const SCORE_QUALITY_MAX: Score = 200.0;
/// Maximum creativity component of the final score.
pub const SCORE_CREATIVITY_MAX: Score = 100.0;

// ============================================================================
// MATCHMAKING
// ============================================================================
/// Initial rating tolerance window for pairing two queued players.
pub const MATCHMAKING_TOLERANCE_START: Rating = 100;
/// Additional tolerance granted per second waited in queue.
pub const MATCHMAKING_TOLERANCE_GROWTH_PER_SEC: Rating = 10;
/// Interval between `queue_position` feedback broadcasts to waiting players.
pub const QUEUE_POSITION_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3);
/// Starting rating for newly created players.
pub const STARTING_RATING: Rating = 1000;
/// K-factor for the Elo rating update.
pub const ELO_K: f32 = 32.0;

// ============================================================================
// REPLAY LOG
// ============================================================================
/// Number of buffered events that triggers an eager flush.
pub const REPLAY_BATCH_SIZE: usize = 10;
/// Periodic flush interval regardless of buffer size.
pub const REPLAY_FLUSH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

// ============================================================================
// GHOST RACE
// ============================================================================
/// Playback tick interval for replaying a ghost's recorded events.
pub const GHOST_PLAYBACK_TICK: std::time::Duration = std::time::Duration::from_millis(50);

// ============================================================================
// INPUT LIMITS
// ============================================================================
/// Maximum accepted submitted-code length, in characters.
pub const MAX_CODE_LENGTH: usize = 5_000;
/// Minimum accepted interval between accepted `code_update` events per player per match.
pub const CODE_UPDATE_THROTTLE: std::time::Duration = std::time::Duration::from_millis(100);

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
#[cfg(feature = "server")]
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

/// Global interrupt flag for graceful shutdown coordination.
#[cfg(feature = "server")]
static INTERRUPTED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Spawn the ctrl-c listener that flips the graceful interrupt flag.
/// Callers drain in-flight replay flushes and close listeners on the next
/// poll of [`interrupted`] rather than dying mid-write.
#[cfg(feature = "server")]
pub fn brb() {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("graceful shutdown requested, draining in-flight work...");
            INTERRUPTED.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });
}

/// Check whether graceful shutdown was requested.
#[cfg(feature = "server")]
pub fn interrupted() -> bool {
    INTERRUPTED.load(std::sync::atomic::Ordering::Relaxed)
}
/// No-op interrupt check when the server feature is disabled.
#[cfg(not(feature = "server"))]
pub fn interrupted() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Match;
    struct Replay;

    #[test]
    fn id_roundtrips_through_uuid() {
        let id = ID::<Match>::default();
        let uuid: uuid::Uuid = id.into();
        let back = ID::<Match>::from(uuid);
        assert_eq!(id, back);
    }

    #[test]
    fn id_cast_preserves_bytes() {
        let id = ID::<Match>::default();
        let raw = id.inner();
        let cast: ID<Replay> = id.cast();
        assert_eq!(cast.inner(), raw);
    }

    #[test]
    fn ids_are_ordered_like_their_uuids() {
        let a = ID::<Match>::default();
        let b = ID::<Match>::default();
        assert_eq!(a.cmp(&b), a.inner().cmp(&b.inner()));
    }
}
