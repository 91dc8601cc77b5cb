use duel_core::{ChallengeId, GhostId, MatchId, PlayerId, RaceId};
use serde::{Deserialize, Serialize};

/// Cursor position inside a code editor buffer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cursor {
    pub line: u32,
    pub col: u32,
}

/// Power-up type, shared between activation requests and broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpType {
    TimeFreeze,
    CodePeek,
    DebugShield,
}

/// Outcome of a single test case run, as reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub passed: bool,
    pub hidden: bool,
    pub actual_output: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub timed_out: bool,
    pub shielded: bool,
}

/// Every message a client may send, tagged by `event` with the payload
/// inlined by field (adjacently tagged) rather than a duck-typed `data: any`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    Authenticate {
        token: String,
    },
    JoinQueue {
        difficulty: Option<String>,
        language: Option<String>,
    },
    LeaveQueue {},
    JoinLobby {
        match_id: MatchId,
    },
    ReadyUp {
        match_id: MatchId,
    },
    CodeUpdate {
        match_id: MatchId,
        code: String,
        cursor: Cursor,
    },
    RunCode {
        match_id: MatchId,
        code: String,
    },
    SubmitSolution {
        match_id: MatchId,
        code: String,
    },
    RequestHint {
        match_id: MatchId,
        current_code: String,
        language: String,
    },
    ActivatePowerup {
        match_id: MatchId,
        power_up_type: PowerUpType,
    },
    JoinSpectate {
        match_id: MatchId,
    },
    SpectatorMessage {
        match_id: MatchId,
        message: String,
    },
    SpectatorReaction {
        match_id: MatchId,
        emoji: String,
    },
    StartGhostRace {
        challenge_id: ChallengeId,
        language: String,
    },
    GhostCodeUpdate {
        race_id: RaceId,
        code: String,
        cursor: Cursor,
    },
    SubmitGhostSolution {
        race_id: RaceId,
        code: String,
    },
    AbandonGhostRace {
        race_id: RaceId,
    },
}

/// Every message the server may push, tagged the same way as [`ClientEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    Authenticated {
        player_id: PlayerId,
    },
    QueuePosition {
        position: u32,
        estimated_wait_secs: u32,
    },
    MatchFound {
        match_id: MatchId,
        challenge_id: ChallengeId,
        opponent_id: PlayerId,
        opponent_username: String,
        opponent_rating: i32,
    },
    OpponentJoined,
    OpponentReady {
        is_ready: bool,
    },
    MatchStarting {
        countdown_ms: u64,
    },
    LobbyState {
        player1_ready: bool,
        player2_ready: bool,
    },
    MatchStarted {
        start_time_ms: i64,
        time_limit_secs: u32,
        remaining_secs: u32,
    },
    TimerSync {
        remaining_secs: u32,
    },
    OpponentCodeUpdate {
        code: String,
        cursor: Cursor,
    },
    OpponentTestRun {
        is_running: bool,
    },
    TestResult {
        results: Vec<TestCaseResult>,
        debug_shield_active: bool,
        shield_charges_remaining: u8,
    },
    OpponentSubmitted,
    MatchResult {
        match_id: MatchId,
        winner_id: Option<PlayerId>,
        player1_score: f32,
        player2_score: f32,
        duration_secs: u32,
        feedback: String,
    },
    PowerupActivated {
        player_id: PlayerId,
        power_up_type: PowerUpType,
        opponent_code: Option<String>,
        freeze_expires_at_ms: Option<i64>,
        shield_charges_remaining: Option<u8>,
    },
    PowerupStateUpdate {
        time_freeze: u8,
        code_peek: u8,
        debug_shield: u8,
        cooldown_remaining_ms: u64,
    },
    PowerupError {
        code: &'static str,
        message: String,
    },
    OpponentUsedPowerup {
        power_up_type: PowerUpType,
    },
    PowerupEffectExpired {
        player_id: PlayerId,
        power_up_type: PowerUpType,
    },
    HintResponse {
        hint: String,
        level: u8,
    },
    HintError {
        code: &'static str,
        message: String,
    },
    HintStatusUpdate {
        used: u8,
        remaining: u8,
    },
    AnalysisReady,
    AnalysisError {
        message: String,
    },
    Reconnected {
        match_id: MatchId,
        status: String,
        remaining_secs: u32,
    },
    SpectatorBroadcast {
        username: String,
        message: String,
    },
    SpectatorReactionBroadcast {
        username: String,
        emoji: String,
    },
    GhostRaceStarted {
        race_id: RaceId,
        ghost_id: GhostId,
        ghost_username: String,
        is_ai: bool,
    },
    GhostEventReplay {
        race_id: RaceId,
        timestamp_ms: i64,
        kind: duel_ghost_event::GhostEventKind,
    },
    GhostRaceResult {
        race_id: RaceId,
        player_score: f32,
        ghost_score: f32,
        player_wins: Option<bool>,
    },
    Error {
        code: &'static str,
        message: String,
        cooldown_remaining_ms: Option<u64>,
    },
}

/// Wire shape for a single replayed ghost tick, kept independent of
/// `duel_replay::EventKind` so this crate never depends on the replay
/// crate just to describe the wire format.
pub mod duel_ghost_event {
    use super::Cursor;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum GhostEventKind {
        CodeUpdate { code: String, cursor: Cursor },
        TestRun { passed: bool },
        Submission { code: String, language: String },
        CursorMove { cursor: Cursor },
    }
}

impl From<crate::error::DuelError> for ServerEvent {
    fn from(err: crate::error::DuelError) -> Self {
        let payload = err.to_payload();
        ServerEvent::Error {
            code: payload.code,
            message: payload.message,
            cooldown_remaining_ms: payload.cooldown_remaining_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_round_trips_through_json() {
        let id = MatchId::default();
        let ev = ClientEvent::ReadyUp { match_id: id };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"event\":\"ready_up\""));
        let back: ClientEvent = serde_json::from_str(&json).unwrap();
        match back {
            ClientEvent::ReadyUp { match_id } => assert_eq!(match_id, id),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn error_converts_to_tagged_server_event() {
        let ev: ServerEvent = crate::error::DuelError::MatchNotFound.into();
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("MATCH_NOT_FOUND"));
    }
}
