use crate::GhostEvent;
use crate::GhostRecording;
use duel_core::ChallengeId;
use duel_core::GhostId;
use duel_core::PlayerId;
use duel_core::RaceId;

/// Lifecycle status of a single-player ghost race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceStatus {
    Active,
    Completed,
    Abandoned,
}

/// A running ghost race (§4.10 `GhostRecording` playback state).
pub struct GhostRace {
    pub id: RaceId,
    pub player_id: PlayerId,
    pub ghost_id: GhostId,
    pub challenge_id: ChallengeId,
    pub status: RaceStatus,
    pub started_at_ms: i64,
    pub current_ghost_event_index: usize,
    pub player_code: String,
    ghost_events: Vec<GhostEvent>,
}

impl GhostRace {
    pub fn start(id: RaceId, player_id: PlayerId, ghost: &GhostRecording, started_at_ms: i64) -> Self {
        Self {
            id,
            player_id,
            ghost_id: ghost.id,
            challenge_id: ghost.challenge_id,
            status: RaceStatus::Active,
            started_at_ms,
            current_ghost_event_index: 0,
            player_code: String::new(),
            ghost_events: ghost.events.clone(),
        }
    }

    /// Advances playback to `now_ms`, returning every ghost event whose
    /// `timestamp_ms <= (now_ms - started_at_ms)` that hasn't already been
    /// emitted (§4.10: "emits all ghost events whose timestamp <= elapsed
    /// and advances the index"). Called from the ≈50ms playback tick.
    pub fn advance(&mut self, now_ms: i64) -> &[GhostEvent] {
        if self.status != RaceStatus::Active {
            return &[];
        }
        let elapsed = (now_ms - self.started_at_ms).max(0);
        let start = self.current_ghost_event_index;
        let mut end = start;
        while end < self.ghost_events.len() && self.ghost_events[end].timestamp_ms <= elapsed {
            end += 1;
        }
        self.current_ghost_event_index = end;
        &self.ghost_events[start..end]
    }

    pub fn update_code(&mut self, code: String) {
        if self.status == RaceStatus::Active {
            self.player_code = code;
        }
    }

    pub fn abandon(&mut self) {
        if self.status == RaceStatus::Active {
            self.status = RaceStatus::Abandoned;
        }
    }

    /// Marks the race completed and reports the player's score against the
    /// ghost's stored score (§4.10 "runs the player's code against visible
    /// tests and reports a winner vs. the ghost's stored score").
    pub fn complete(&mut self, player_score: f32, ghost_score: f32) -> RaceOutcome {
        self.status = RaceStatus::Completed;
        let player_wins = if player_score > ghost_score {
            Some(true)
        } else if ghost_score > player_score {
            Some(false)
        } else {
            None
        };
        RaceOutcome {
            player_score,
            ghost_score,
            player_wins,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RaceOutcome {
    pub player_score: f32,
    pub ghost_score: f32,
    /// `Some(true)` player beat the ghost, `Some(false)` the ghost won,
    /// `None` tie.
    pub player_wins: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_dto::Cursor;

    fn ghost() -> GhostRecording {
        GhostRecording {
            id: GhostId::default(),
            challenge_id: ChallengeId::default(),
            owner_id: None,
            username: "ghost".into(),
            score: 900.0,
            duration_ms: 1000,
            is_ai: false,
            events: vec![
                GhostEvent {
                    timestamp_ms: 100,
                    kind: duel_replay::EventKind::CursorMove {
                        cursor: Cursor { line: 0, col: 1 },
                    },
                },
                GhostEvent {
                    timestamp_ms: 900,
                    kind: duel_replay::EventKind::Submission {
                        code: "solved".into(),
                        language: "rust".into(),
                    },
                },
            ],
        }
    }

    #[test]
    fn advance_emits_only_events_due_by_now() {
        let mut race = GhostRace::start(RaceId::default(), PlayerId::default(), &ghost(), 0);
        assert_eq!(race.advance(50).len(), 0);
        assert_eq!(race.advance(150).len(), 1);
        assert_eq!(race.advance(150).len(), 0); // already emitted, no duplicates
        assert_eq!(race.advance(1_000).len(), 1);
    }

    #[test]
    fn abandon_is_terminal_and_stops_code_updates() {
        let mut race = GhostRace::start(RaceId::default(), PlayerId::default(), &ghost(), 0);
        race.abandon();
        race.update_code("ignored".into());
        assert_eq!(race.player_code, "");
        assert_eq!(race.status, RaceStatus::Abandoned);
    }

    #[test]
    fn complete_reports_winner_against_ghost_score() {
        let mut race = GhostRace::start(RaceId::default(), PlayerId::default(), &ghost(), 0);
        let outcome = race.complete(950.0, 900.0);
        assert_eq!(outcome.player_wins, Some(true));
        assert_eq!(race.status, RaceStatus::Completed);
    }
}
