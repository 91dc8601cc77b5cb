//! Shared application state: one instance per process, held behind
//! `web::Data` and cloned (by `Arc`) into every request/connection handler.
//! Mirrors the shape of the teacher's unified `rbp_server::run` state, with
//! one `web::Data` per subsystem rather than a single god struct, so each
//! handler only depends on what it actually touches.

use crate::grader::HttpAiGrader;
use crate::sandbox::HttpSandbox;
use duel_auth::AuthRepository;
use duel_challenge::ChallengeCatalog;
use duel_core::MatchId;
use duel_core::PlayerId;
use duel_core::RaceId;
use duel_core::Rating;
use duel_core::STARTING_RATING;
use duel_ghost::GhostRace;
use duel_match::HintState;
use duel_match::MatchEngine;
use duel_match::PowerUpState;
use duel_queue::Matchmaker;
use duel_replay::ReplayLog;
use duel_room::RoomFabric;
use duel_session::SessionDirectory;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::Client;

/// Everything a running match needs beyond the durable row: the typestate
/// engine, each player's power-up/hint counters, and the buffered replay
/// log. Lives only as long as the match is in memory (lobby through
/// shortly after completion), per §4.3.
pub struct MatchRuntime {
    pub engine: MatchEngine,
    pub challenge: duel_challenge::Challenge,
    pub powerups: HashMap<PlayerId, PowerUpState>,
    pub hints: HashMap<PlayerId, HintState>,
    pub replay: Arc<ReplayLog<Arc<Client>>>,
    /// Last accepted `code_update` per player, enforcing
    /// `duel_core::CODE_UPDATE_THROTTLE`.
    pub last_code_update: HashMap<PlayerId, std::time::Instant>,
}

impl MatchRuntime {
    pub fn new(engine: MatchEngine, challenge: duel_challenge::Challenge, replay: Arc<ReplayLog<Arc<Client>>>) -> Self {
        let player1 = engine.state().player1;
        let player2 = engine.state().player2;
        let mut powerups = HashMap::new();
        powerups.insert(player1, PowerUpState::default());
        powerups.insert(player2, PowerUpState::default());
        let mut hints = HashMap::new();
        hints.insert(player1, HintState::default());
        hints.insert(player2, HintState::default());
        Self {
            engine,
            challenge,
            powerups,
            hints,
            replay,
            last_code_update: HashMap::new(),
        }
    }
}

/// A single player's live ghost-race playback (§4.10, C10), the
/// single-player degenerate specialization of [`MatchRuntime`].
pub struct GhostRaceRuntime {
    pub race: GhostRace,
    pub challenge: duel_challenge::Challenge,
    pub language: String,
    pub ghost_username: String,
    pub ghost_score: f32,
}

pub struct AppState {
    pub db: Arc<Client>,
    pub crypto: duel_auth::Crypto,
    pub sessions: Arc<SessionDirectory>,
    pub rooms: Arc<RoomFabric>,
    pub matchmaker: Arc<Matchmaker>,
    pub matches: RwLock<HashMap<MatchId, MatchRuntime>>,
    /// Reverse index for reconnect handling and disconnect cleanup: which
    /// match (if any) a player is currently part of.
    pub player_matches: RwLock<HashMap<PlayerId, MatchId>>,
    pub races: RwLock<HashMap<RaceId, GhostRaceRuntime>>,
    pub catalog: Arc<dyn ChallengeCatalog + Send + Sync>,
    pub sandbox: HttpSandbox,
    pub grader: HttpAiGrader,
}

/// `duel-auth`'s `Member` id and this crate's `PlayerId` share the same
/// underlying UUID space (one account, one competitor) but are distinct
/// marker types so neither crate depends on the other's domain.
pub fn member_id(player: PlayerId) -> duel_core::ID<duel_auth::Member> {
    duel_core::ID::from(player.inner())
}

pub fn player_id(member: duel_core::ID<duel_auth::Member>) -> PlayerId {
    duel_core::ID::from(member.inner())
}

impl AppState {
    pub async fn rating_of(&self, player: PlayerId) -> Rating {
        self.db
            .rating(member_id(player))
            .await
            .ok()
            .flatten()
            .unwrap_or(STARTING_RATING)
    }

    pub async fn username_of(&self, player: PlayerId) -> String {
        self.db
            .username_of(member_id(player))
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "player".to_string())
    }
}
