//! Ghost Race dispatch (§4.10, C10): the single-player counterpart to
//! `dispatch.rs`, driving a [`duel_ghost::GhostRace`] instead of a full
//! [`duel_match::MatchEngine`]. Four client events in, two server events out,
//! plus a playback ticker that has no analogue on the two-player side.

use crate::state::AppState;
use crate::state::GhostRaceRuntime;
use crate::time::now_ms;
use duel_core::ChallengeId;
use duel_core::GhostId;
use duel_core::MAX_CODE_LENGTH;
use duel_core::PlayerId;
use duel_core::RaceId;
use duel_dto::Cursor;
use duel_dto::DuelError;
use duel_dto::ServerEvent;
use duel_dto::TestCaseResult;
use duel_ghost::GhostRace;
use duel_ghost::GhostRepository;
use duel_ghost::RaceStatus;
use duel_ghost::synthesize_ai_ghost;
use duel_replay::EventKind;
use duel_room::ghost_race_room;
use duel_session::ConnectionId;
use std::sync::Arc;

/// Target score assigned to a synthesized AI ghost, on the same
/// `correctness_score` scale `submit` below grades the player on: strong
/// but not unbeatable.
const AI_GHOST_TARGET_SCORE: f32 = duel_core::SCORE_CORRECTNESS_MAX * 0.8;

fn stringify(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Picks a saved human recording for `challenge_id`, falling back to a
/// synthesized AI ghost typing out the reference solution when none exist
/// yet (§4.10 "AI-ghost fallback").
async fn pick_ghost(state: &Arc<AppState>, challenge: &duel_challenge::Challenge, language: &str) -> duel_ghost::GhostRecording {
    match GhostRepository::random_recording(&state.db, challenge.id).await {
        Ok(Some(recording)) => recording,
        Ok(None) | Err(_) => {
            let duration_ms = (challenge.time_limit_secs as i64 * 1000) / 2;
            synthesize_ai_ghost(GhostId::default(), challenge.id, &challenge.reference_solution, language, AI_GHOST_TARGET_SCORE, duration_ms)
        }
    }
}

pub async fn start_race(
    state: &Arc<AppState>,
    connection: ConnectionId,
    me: PlayerId,
    challenge_id: ChallengeId,
    language: String,
) -> Result<(), DuelError> {
    let challenge = state
        .catalog
        .get(challenge_id)
        .await
        .map_err(|err| DuelError::ExecutionFailed(err.to_string()))?
        .ok_or(DuelError::NoGhostAvailable)?;

    let recording = pick_ghost(state, &challenge, &language).await;
    let race_id = RaceId::default();
    let race = GhostRace::start(race_id, me, &recording, now_ms());
    let ghost_id = race.ghost_id;
    let ghost_username = recording.username.clone();
    let is_ai = recording.is_ai;

    let runtime = GhostRaceRuntime {
        race,
        challenge,
        language,
        ghost_username: ghost_username.clone(),
        ghost_score: recording.score,
    };
    state.races.write().await.insert(race_id, runtime);
    state.rooms.join(connection, &ghost_race_room(race_id)).await;
    state
        .rooms
        .send_to(connection, &ServerEvent::GhostRaceStarted { race_id, ghost_id, ghost_username, is_ai })
        .await;

    spawn_playback(Arc::clone(state), race_id, connection);
    Ok(())
}

/// Converts a `duel_replay::EventKind` into the wire-level, replay-crate
/// independent `GhostEventKind` (kept separate so `duel-dto` never depends
/// on `duel-replay` just to describe a ghost tick).
fn to_wire_kind(kind: &EventKind) -> duel_dto::duel_ghost_event::GhostEventKind {
    match kind {
        EventKind::CodeUpdate { code, cursor } => duel_dto::duel_ghost_event::GhostEventKind::CodeUpdate { code: code.clone(), cursor: *cursor },
        EventKind::TestRun { results } => duel_dto::duel_ghost_event::GhostEventKind::TestRun { passed: results.iter().all(|r| r.passed) },
        EventKind::Submission { code, language } => {
            duel_dto::duel_ghost_event::GhostEventKind::Submission { code: code.clone(), language: language.clone() }
        }
        EventKind::CursorMove { cursor } => duel_dto::duel_ghost_event::GhostEventKind::CursorMove { cursor: *cursor },
    }
}

/// Drains newly-due ghost events into `GhostEventReplay` broadcasts every
/// `GHOST_PLAYBACK_TICK`, self-terminating once the race leaves `Active`
/// (mirrors `dispatch::spawn_timer_sync`'s self-terminating-ticker shape).
fn spawn_playback(state: Arc<AppState>, race_id: RaceId, connection: ConnectionId) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(duel_core::GHOST_PLAYBACK_TICK);
        loop {
            ticker.tick().await;
            let events = {
                let mut races = state.races.write().await;
                let Some(runtime) = races.get_mut(&race_id) else { return };
                if runtime.race.status != RaceStatus::Active {
                    return;
                }
                runtime.race.advance(now_ms()).to_vec()
            };
            for event in events {
                state
                    .rooms
                    .send_to(
                        connection,
                        &ServerEvent::GhostEventReplay { race_id, timestamp_ms: event.timestamp_ms, kind: to_wire_kind(&event.kind) },
                    )
                    .await;
            }
        }
    });
}

pub async fn code_update(state: &Arc<AppState>, me: PlayerId, race_id: RaceId, code: String, _cursor: Cursor) -> Result<(), DuelError> {
    if code.len() > MAX_CODE_LENGTH {
        return Err(DuelError::CodeTooLong);
    }
    let mut races = state.races.write().await;
    let runtime = races.get_mut(&race_id).ok_or(DuelError::RaceNotFound)?;
    if runtime.race.player_id != me {
        return Err(DuelError::Unauthorized);
    }
    if runtime.race.status != RaceStatus::Active {
        return Err(DuelError::RaceNotActive);
    }
    runtime.race.update_code(code);
    Ok(())
}

pub async fn submit(state: &Arc<AppState>, connection: ConnectionId, me: PlayerId, race_id: RaceId, code: String) -> Result<(), DuelError> {
    if code.len() > MAX_CODE_LENGTH {
        return Err(DuelError::CodeTooLong);
    }
    let (language, cases, ghost_score) = {
        let races = state.races.read().await;
        let runtime = races.get(&race_id).ok_or(DuelError::RaceNotFound)?;
        if runtime.race.player_id != me {
            return Err(DuelError::Unauthorized);
        }
        if runtime.race.status != RaceStatus::Active {
            return Err(DuelError::RaceNotActive);
        }
        let cases: Vec<duel_challenge::TestCase> = runtime.challenge.visible_cases().cloned().collect();
        (runtime.language.clone(), cases, runtime.ghost_score)
    };

    let mut results = Vec::with_capacity(cases.len());
    for case in &cases {
        let request = duel_judge::SandboxRequest {
            language: &language,
            code: &code,
            test_input_json: &stringify(&case.input),
            timeout_ms: duel_core::SANDBOX_CASE_TIMEOUT.as_millis() as u64,
        };
        let response = tokio::time::timeout(duel_core::SANDBOX_CASE_TIMEOUT, duel_judge::Sandbox::execute(&state.sandbox, request)).await;
        results.push(match response {
            Ok(Ok(r)) => TestCaseResult {
                passed: !r.timed_out && duel_judge::score::outputs_match(&r.stdout, &stringify(&case.expected_output)),
                hidden: false,
                actual_output: Some(r.stdout.clone()),
                stdout: r.stdout,
                stderr: r.stderr,
                execution_time_ms: r.execution_time_ms,
                timed_out: r.timed_out,
                shielded: false,
            },
            Ok(Err(err)) => TestCaseResult {
                passed: false,
                hidden: false,
                actual_output: None,
                stdout: String::new(),
                stderr: err.to_string(),
                execution_time_ms: 0,
                timed_out: false,
                shielded: false,
            },
            Err(_) => TestCaseResult {
                passed: false,
                hidden: false,
                actual_output: None,
                stdout: String::new(),
                stderr: String::new(),
                execution_time_ms: duel_core::SANDBOX_CASE_TIMEOUT.as_millis() as u64,
                timed_out: true,
                shielded: false,
            },
        });
    }
    let judge_cases: Vec<duel_judge::score::TestCase> = cases
        .iter()
        .map(|c| duel_judge::score::TestCase {
            input: stringify(&c.input),
            expected_output: stringify(&c.expected_output),
            hidden: c.hidden,
            weight: c.weight,
        })
        .collect();
    let player_score = duel_judge::score::correctness_score(&judge_cases, &results);

    let outcome = {
        let mut races = state.races.write().await;
        let runtime = races.get_mut(&race_id).ok_or(DuelError::RaceNotFound)?;
        runtime.race.complete(player_score, ghost_score)
    };
    state
        .rooms
        .send_to(
            connection,
            &ServerEvent::GhostRaceResult {
                race_id,
                player_score: outcome.player_score,
                ghost_score: outcome.ghost_score,
                player_wins: outcome.player_wins,
            },
        )
        .await;
    Ok(())
}

pub async fn abandon(state: &Arc<AppState>, me: PlayerId, race_id: RaceId) -> Result<(), DuelError> {
    let mut races = state.races.write().await;
    let runtime = races.get_mut(&race_id).ok_or(DuelError::RaceNotFound)?;
    if runtime.race.player_id != me {
        return Err(DuelError::Unauthorized);
    }
    runtime.race.abandon();
    Ok(())
}
