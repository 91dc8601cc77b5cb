use duel_core::ChallengeId;
use duel_core::MatchId;
use duel_core::PlayerId;
use duel_core::Unique;
use duel_dto::Cursor;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a match, monotone: lobby -> active -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Lobby,
    Active,
    Completed,
}

/// Per-player live editor state, mirrored between both players during a match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub code: String,
    pub cursor: Option<Cursor>,
    pub language: String,
    pub ready: bool,
    pub submitted: bool,
    pub score: Option<f32>,
}

/// Ephemeral per-match shared state (§4.3). Created when a match enters
/// lobby, mirrored to the durable store on terminal transitions, deleted
/// shortly after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchState {
    pub id: MatchId,
    pub challenge_id: ChallengeId,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub status: MatchStatus,
    pub slot1: PlayerSlot,
    pub slot2: PlayerSlot,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub winner: Option<PlayerId>,
    pub time_limit_secs: u32,
}

impl MatchState {
    pub fn new(
        id: MatchId,
        challenge_id: ChallengeId,
        player1: PlayerId,
        player2: PlayerId,
        language1: String,
        language2: String,
        time_limit_secs: u32,
    ) -> Self {
        Self {
            id,
            challenge_id,
            player1,
            player2,
            status: MatchStatus::Lobby,
            slot1: PlayerSlot {
                language: language1,
                ..Default::default()
            },
            slot2: PlayerSlot {
                language: language2,
                ..Default::default()
            },
            started_at_ms: None,
            completed_at_ms: None,
            winner: None,
            time_limit_secs,
        }
    }

    /// The slot belonging to `player`, or `None` if not part of this match.
    pub fn mine_mut(&mut self, player: PlayerId) -> Option<&mut PlayerSlot> {
        if player == self.player1 {
            Some(&mut self.slot1)
        } else if player == self.player2 {
            Some(&mut self.slot2)
        } else {
            None
        }
    }

    /// The slot belonging to `player`, read-only.
    pub fn mine(&self, player: PlayerId) -> Option<&PlayerSlot> {
        if player == self.player1 {
            Some(&self.slot1)
        } else if player == self.player2 {
            Some(&self.slot2)
        } else {
            None
        }
    }

    /// The opponent's slot relative to `player`.
    pub fn theirs(&self, player: PlayerId) -> Option<&PlayerSlot> {
        if player == self.player1 {
            Some(&self.slot2)
        } else if player == self.player2 {
            Some(&self.slot1)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        if player == self.player1 {
            Some(self.player2)
        } else if player == self.player2 {
            Some(self.player1)
        } else {
            None
        }
    }

    pub fn remaining_secs(&self, now_ms: i64) -> u32 {
        match self.started_at_ms {
            None => self.time_limit_secs,
            Some(start) => {
                let elapsed_secs = ((now_ms - start).max(0) / 1000) as u32;
                self.time_limit_secs.saturating_sub(elapsed_secs)
            }
        }
    }

    pub fn both_ready(&self) -> bool {
        self.slot1.ready && self.slot2.ready
    }

    pub fn both_submitted(&self) -> bool {
        self.slot1.submitted && self.slot2.submitted
    }
}

/// Durable match row (§3), the row-level counterpart to [`MatchState`].
#[derive(Debug, Clone)]
pub struct Match {
    pub id: MatchId,
    pub challenge_id: ChallengeId,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub status: MatchStatus,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub winner: Option<PlayerId>,
    pub player1_score: Option<f32>,
    pub player2_score: Option<f32>,
    pub player1_code: Option<String>,
    pub player2_code: Option<String>,
    pub player1_language: String,
    pub player2_language: String,
    pub duration_secs: Option<u32>,
}

impl Unique<duel_core::Match> for Match {
    fn id(&self) -> MatchId {
        self.id
    }
}

impl From<&MatchState> for Match {
    fn from(state: &MatchState) -> Self {
        Self {
            id: state.id,
            challenge_id: state.challenge_id,
            player1: state.player1,
            player2: state.player2,
            status: state.status,
            started_at_ms: state.started_at_ms,
            completed_at_ms: state.completed_at_ms,
            winner: state.winner,
            player1_score: state.slot1.score,
            player2_score: state.slot2.score,
            player1_code: Some(state.slot1.code.clone()),
            player2_code: Some(state.slot2.code.clone()),
            player1_language: state.slot1.language.clone(),
            player2_language: state.slot2.language.clone(),
            duration_secs: state
                .completed_at_ms
                .zip(state.started_at_ms)
                .map(|(end, start)| ((end - start).max(0) / 1000) as u32),
        }
    }
}

#[cfg(feature = "database")]
pub(crate) mod schema {
    use super::*;
    use duel_pg::*;

    impl Schema for Match {
        fn name() -> &'static str {
            MATCHES
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                MATCHES,
                " (
                    id                UUID PRIMARY KEY,
                    challenge_id      UUID NOT NULL,
                    player1_id        UUID NOT NULL,
                    player2_id        UUID NOT NULL,
                    status            VARCHAR(16) NOT NULL DEFAULT 'lobby',
                    started_at_ms     BIGINT,
                    completed_at_ms   BIGINT,
                    winner_id         UUID,
                    player1_score     REAL,
                    player2_score     REAL,
                    player1_code      TEXT,
                    player2_code      TEXT,
                    player1_language  VARCHAR(32) NOT NULL,
                    player2_language  VARCHAR(32) NOT NULL,
                    duration_secs     INTEGER
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_matches_players ON ",
                MATCHES,
                " (player1_id, player2_id);
                 CREATE INDEX IF NOT EXISTS idx_matches_status ON ",
                MATCHES,
                " (status);"
            )
        }
        fn truncates() -> &'static str {
            const_format::concatcp!("TRUNCATE TABLE ", MATCHES, " CASCADE;")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> MatchState {
        MatchState::new(
            MatchId::default(),
            ChallengeId::default(),
            PlayerId::default(),
            PlayerId::default(),
            "rust".into(),
            "rust".into(),
            1800,
        )
    }

    #[test]
    fn remaining_counts_down_from_time_limit() {
        let mut s = state();
        s.started_at_ms = Some(0);
        assert_eq!(s.remaining_secs(0), 1800);
        assert_eq!(s.remaining_secs(60_000), 1740);
        assert_eq!(s.remaining_secs(10_000_000), 0);
    }

    #[test]
    fn mine_and_theirs_resolve_opposite_slots() {
        let mut s = state();
        let p1 = s.player1;
        let p2 = s.player2;
        s.mine_mut(p1).unwrap().code = "self".into();
        s.mine_mut(p2).unwrap().code = "other".into();
        assert_eq!(s.slot1.code, "self");
        assert_eq!(s.slot2.code, "other");
        assert_eq!(s.theirs(p1).unwrap().code, "other");
        assert_eq!(s.opponent_of(p1), Some(p2));
    }

    #[test]
    fn both_ready_requires_both_slots() {
        let mut s = state();
        assert!(!s.both_ready());
        s.slot1.ready = true;
        assert!(!s.both_ready());
        s.slot2.ready = true;
        assert!(s.both_ready());
    }
}
