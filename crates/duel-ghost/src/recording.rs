use duel_core::ChallengeId;
use duel_core::GhostId;
use duel_core::PlayerId;
use duel_replay::EventKind;
use serde::Deserialize;
use serde::Serialize;

/// One tick of a ghost's recorded timeline. Lighter than a full
/// `duel_replay::ReplayEvent` — a ghost has no match, so it carries only
/// what playback needs: when, and what.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostEvent {
    pub timestamp_ms: i64,
    pub kind: EventKind,
}

/// A persisted replay timeline played back as a single-player opponent
/// (§3 `GhostRecording`). Immutable once saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostRecording {
    pub id: GhostId,
    pub challenge_id: ChallengeId,
    pub owner_id: Option<PlayerId>,
    pub username: String,
    pub score: f32,
    pub duration_ms: i64,
    pub is_ai: bool,
    pub events: Vec<GhostEvent>,
}

/// Synthesizes a plausible AI-ghost recording from a reference solution
/// when no human recording exists for a challenge (§4.10 "AI-ghost
/// fallback"). Emits incremental `code_update` events that grow the
/// reference solution character-by-character-ish (in fixed-size chunks,
/// to keep the event count bounded), spaced evenly across a plausible
/// typing duration, followed by a final `submission`.
pub fn synthesize_ai_ghost(
    id: GhostId,
    challenge_id: ChallengeId,
    reference_solution: &str,
    language: &str,
    target_score: f32,
    duration_ms: i64,
) -> GhostRecording {
    const CHUNK_CHARS: usize = 12;
    let chars: Vec<char> = reference_solution.chars().collect();
    let chunk_count = chars.len().div_ceil(CHUNK_CHARS).max(1);
    let interval_ms = duration_ms / chunk_count as i64;

    let mut events = Vec::with_capacity(chunk_count + 1);
    for i in 1..=chunk_count {
        let prefix_len = (i * CHUNK_CHARS).min(chars.len());
        let code: String = chars[..prefix_len].iter().collect();
        let line = code.matches('\n').count() as u32;
        let col = code.rsplit('\n').next().map(|s| s.chars().count()).unwrap_or(0) as u32;
        events.push(GhostEvent {
            timestamp_ms: interval_ms * i as i64,
            kind: EventKind::CodeUpdate {
                code,
                cursor: duel_dto::Cursor { line, col },
            },
        });
    }
    events.push(GhostEvent {
        timestamp_ms: duration_ms,
        kind: EventKind::Submission {
            code: reference_solution.to_string(),
            language: language.to_string(),
        },
    });

    GhostRecording {
        id,
        challenge_id,
        owner_id: None,
        username: "AI Ghost".to_string(),
        score: target_score,
        duration_ms,
        is_ai: true,
        events,
    }
}

/// Builds a [`GhostRecording`] from a human player's match replay,
/// discarding the `match_id`/`player_id` envelope a full `ReplayEvent`
/// carries (a ghost only needs `when` and `what`).
pub fn from_match_replay(
    id: GhostId,
    challenge_id: ChallengeId,
    owner_id: PlayerId,
    username: String,
    score: f32,
    duration_ms: i64,
    events: &[duel_replay::ReplayEvent],
) -> GhostRecording {
    GhostRecording {
        id,
        challenge_id,
        owner_id: Some(owner_id),
        username,
        score,
        duration_ms,
        is_ai: false,
        events: events
            .iter()
            .map(|e| GhostEvent {
                timestamp_ms: e.timestamp_ms,
                kind: e.kind.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_ghost_ends_with_the_full_solution() {
        let ghost = synthesize_ai_ghost(
            GhostId::default(),
            ChallengeId::default(),
            "fn main() { println!(\"hi\"); }",
            "rust",
            850.0,
            60_000,
        );
        assert!(ghost.is_ai);
        let last = ghost.events.last().unwrap();
        match &last.kind {
            EventKind::Submission { code, .. } => assert_eq!(code, "fn main() { println!(\"hi\"); }"),
            _ => panic!("expected a trailing submission event"),
        }
        // timestamps are monotone-nondecreasing, per §5 ordering guarantees
        assert!(ghost.events.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }
}
