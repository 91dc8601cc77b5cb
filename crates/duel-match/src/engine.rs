use crate::state::MatchState;
use crate::state::MatchStatus;
use duel_core::PlayerId;
use std::marker::PhantomData;
use std::time::Duration;
use std::time::Instant;

/// Phase: players configuring language and readying up.
pub struct Lobby;
/// Phase: both players ready, fixed countdown running before the clock starts.
pub struct Countdown;
/// Phase: match clock running, code edits and submissions flowing.
pub struct Active;
/// Phase: judging has produced a final result (or fallback).
pub struct Completed;

/// Functional core of a single match (§4.5). Owns lifecycle transitions and
/// their side effects; driven by the Room Fabric (imperative shell), which
/// handles connection fan-out and persistence.
///
/// Uses the typestate pattern to encode valid phase transitions at compile
/// time: `ready_up` on a completed match, or a second countdown on an
/// already-counting-down match, are rejected by the type system rather than
/// a runtime check.
pub struct Engine<Phase> {
    state: MatchState,
    countdown_deadline: Option<Instant>,
    phase: PhantomData<Phase>,
}

impl<T> Engine<T> {
    pub fn state(&self) -> &MatchState {
        &self.state
    }
}

impl Engine<Lobby> {
    pub fn new(state: MatchState) -> Self {
        Self {
            state,
            countdown_deadline: None,
            phase: PhantomData,
        }
    }

    pub fn set_language(&mut self, player: PlayerId, language: String) -> Option<()> {
        self.state.mine_mut(player).map(|slot| slot.language = language)
    }

    /// Marks a player ready. Returns `true` once both players are ready,
    /// signalling the caller to invoke [`Self::start_countdown`].
    pub fn ready_up(&mut self, player: PlayerId) -> bool {
        if let Some(slot) = self.state.mine_mut(player) {
            slot.ready = true;
        }
        self.state.both_ready()
    }

    /// Transition to Countdown. Only valid once both players are ready;
    /// callers must check [`Self::ready_up`]'s return before calling this.
    pub fn start_countdown(self, countdown: Duration) -> Engine<Countdown> {
        Engine {
            state: self.state,
            countdown_deadline: Some(Instant::now() + countdown),
            phase: PhantomData,
        }
    }
}

impl Engine<Countdown> {
    /// Remaining time before the match clock starts. Reconnecting clients
    /// use this to reconstruct the countdown display.
    pub fn remaining(&self) -> Duration {
        self.countdown_deadline
            .expect("countdown deadline set on entry to Countdown phase")
            .saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Transition to Active. Stamps `started_at` as the single source of
    /// truth for the match clock; every reconnecting client recomputes
    /// `remaining` from this instant rather than trusting a locally-held
    /// countdown.
    pub fn begin(mut self, now_ms: i64) -> Engine<Active> {
        self.state.started_at_ms = Some(now_ms);
        self.state.status = MatchStatus::Active;
        Engine {
            state: self.state,
            countdown_deadline: None,
            phase: PhantomData,
        }
    }
}

impl Engine<Active> {
    pub fn remaining_secs(&self, now_ms: i64) -> u32 {
        self.state.remaining_secs(now_ms)
    }

    pub fn update_code(
        &mut self,
        player: PlayerId,
        code: String,
        cursor: duel_dto::Cursor,
    ) -> Option<()> {
        let slot = self.state.mine_mut(player)?;
        slot.code = code;
        slot.cursor = Some(cursor);
        Some(())
    }

    /// Marks a player's final submission. Returns `true` once both players
    /// have submitted, signalling the caller that judging should begin
    /// exactly once for this match.
    pub fn mark_submitted(&mut self, player: PlayerId, code: String) -> Option<bool> {
        let slot = self.state.mine_mut(player)?;
        slot.submitted = true;
        slot.code = code;
        Some(self.state.both_submitted())
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.state.opponent_of(player)
    }

    /// Transition to Completed with the judging pipeline's result.
    /// `scores` and `winner` are `None` on the §4.5 fallback path (judging
    /// watchdog exceeded), in which case no rating update should follow.
    pub fn complete(
        mut self,
        winner: Option<PlayerId>,
        player1_score: f32,
        player2_score: f32,
        completed_at_ms: i64,
    ) -> Engine<Completed> {
        self.state.winner = winner;
        self.state.slot1.score = Some(player1_score);
        self.state.slot2.score = Some(player2_score);
        self.state.completed_at_ms = Some(completed_at_ms);
        self.state.status = MatchStatus::Completed;
        Engine {
            state: self.state,
            countdown_deadline: None,
            phase: PhantomData,
        }
    }
}

impl Engine<Completed> {
    pub fn winner(&self) -> Option<PlayerId> {
        self.state.winner
    }
}

/// Wrapper enum letting the Room Fabric hold an Engine in any phase without
/// knowing which at compile time. Phase transitions take `self` by value, so
/// `std::mem::replace` extracts the owned engine out of `&mut self` before
/// re-storing the transitioned variant.
pub enum MatchEngine {
    Lobby(Engine<Lobby>),
    Countdown(Engine<Countdown>),
    Active(Engine<Active>),
    Completed(Engine<Completed>),
}

impl MatchEngine {
    pub fn new(state: MatchState) -> Self {
        Self::Lobby(Engine::new(state))
    }

    pub fn state(&self) -> &MatchState {
        match self {
            Self::Lobby(e) => e.state(),
            Self::Countdown(e) => e.state(),
            Self::Active(e) => e.state(),
            Self::Completed(e) => e.state(),
        }
    }

    /// Marks a player ready; if both are now ready and no countdown is
    /// running yet, starts exactly one. Returns the countdown remaining if
    /// one is (now or already) running, so a second `ready_up` is idempotent.
    pub fn ready_up(&mut self, player: PlayerId, countdown: Duration) -> Option<Duration> {
        match self {
            Self::Lobby(e) => {
                let both_ready = e.ready_up(player);
                if both_ready {
                    let state = std::mem::replace(self, Self::placeholder());
                    match state {
                        Self::Lobby(e) => {
                            let e = e.start_countdown(countdown);
                            let remaining = e.remaining();
                            *self = Self::Countdown(e);
                            Some(remaining)
                        }
                        _ => unreachable!(),
                    }
                } else {
                    None
                }
            }
            Self::Countdown(e) => Some(e.remaining()),
            _ => None,
        }
    }

    /// Advances Countdown -> Active once the deadline has passed. A no-op
    /// outside Countdown or before expiry.
    pub fn try_begin(&mut self, now_ms: i64) -> bool {
        match self {
            Self::Countdown(e) if e.expired() => {
                let state = std::mem::replace(self, Self::placeholder());
                match state {
                    Self::Countdown(e) => {
                        *self = Self::Active(e.begin(now_ms));
                        true
                    }
                    _ => unreachable!(),
                }
            }
            _ => false,
        }
    }

    pub fn mark_submitted(&mut self, player: PlayerId, code: String) -> Option<bool> {
        match self {
            Self::Active(e) => e.mark_submitted(player, code),
            _ => None,
        }
    }

    pub fn complete(
        &mut self,
        winner: Option<PlayerId>,
        player1_score: f32,
        player2_score: f32,
        completed_at_ms: i64,
    ) {
        let state = std::mem::replace(self, Self::placeholder());
        match state {
            Self::Active(e) => {
                *self = Self::Completed(e.complete(
                    winner,
                    player1_score,
                    player2_score,
                    completed_at_ms,
                ))
            }
            other => *self = other,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Only reachable transiently inside a transition method; a match
    /// actually observing this phase indicates a panic unwound mid-swap.
    fn placeholder() -> Self {
        Self::Lobby(Engine::new(MatchState::new(
            Default::default(),
            Default::default(),
            Default::default(),
            Default::default(),
            String::new(),
            String::new(),
            0,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_core::{ChallengeId, MatchId};

    fn fresh() -> MatchEngine {
        MatchEngine::new(MatchState::new(
            MatchId::default(),
            ChallengeId::default(),
            PlayerId::default(),
            PlayerId::default(),
            "rust".into(),
            "rust".into(),
            1800,
        ))
    }

    #[test]
    fn ready_up_starts_exactly_one_countdown() {
        let mut engine = fresh();
        let p1 = engine.state().player1;
        let p2 = engine.state().player2;
        assert!(engine.ready_up(p1, Duration::from_secs(30)).is_none());
        assert!(matches!(engine, MatchEngine::Lobby(_)));
        let first = engine.ready_up(p2, Duration::from_secs(30)).unwrap();
        assert!(matches!(engine, MatchEngine::Countdown(_)));
        // A late/duplicate ready_up returns the *same* running countdown
        // rather than starting a second one.
        let second = engine.ready_up(p1, Duration::from_secs(30)).unwrap();
        assert!(second <= first);
    }

    #[test]
    fn try_begin_is_a_no_op_before_expiry() {
        let mut engine = fresh();
        let p1 = engine.state().player1;
        let p2 = engine.state().player2;
        engine.ready_up(p1, Duration::from_secs(30));
        engine.ready_up(p2, Duration::from_secs(30));
        assert!(!engine.try_begin(0));
        assert!(matches!(engine, MatchEngine::Countdown(_)));
    }

    #[test]
    fn try_begin_transitions_to_active_after_expiry() {
        let mut engine = fresh();
        let p1 = engine.state().player1;
        let p2 = engine.state().player2;
        engine.ready_up(p1, Duration::from_millis(1));
        engine.ready_up(p2, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(engine.try_begin(1_000));
        assert!(matches!(engine, MatchEngine::Active(_)));
        assert_eq!(engine.state().started_at_ms, Some(1_000));
    }

    #[test]
    fn completion_is_exactly_once() {
        let mut engine = fresh();
        let p1 = engine.state().player1;
        let p2 = engine.state().player2;
        engine.ready_up(p1, Duration::from_millis(1));
        engine.ready_up(p2, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        engine.try_begin(0);
        engine.mark_submitted(p1, "a".into());
        let both = engine.mark_submitted(p2, "b".into()).unwrap();
        assert!(both);
        engine.complete(Some(p1), 900.0, 800.0, 120_000);
        assert!(engine.is_completed());
        // A second completion attempt on an already-completed match is a
        // no-op: the match stays Completed rather than panicking.
        engine.complete(Some(p2), 1.0, 1.0, 999_999);
        assert_eq!(engine.state().winner, Some(p1));
    }
}
