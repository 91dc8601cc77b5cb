//! Event dispatch: the imperative shell around the Match FSM (§4.5), the
//! Power-up Engine (§4.6), the Hint/Coach Service (§4.8), and the Judging
//! Pipeline (§4.9). One `handle` call per inbound [`ClientEvent`]; every
//! path either mutates state and fans out a broadcast, or returns a
//! [`DuelError`] for the caller to turn into an `error` event.

use crate::state::AppState;
use crate::state::MatchRuntime;
use crate::state::member_id;
use crate::state::player_id;
use crate::time::now_ms;
use duel_challenge::Difficulty;
use duel_core::MatchId;
use duel_core::PlayerId;
use duel_core::{COUNTDOWN, MAX_CODE_LENGTH};
use duel_dto::ClientEvent;
use duel_dto::Cursor;
use duel_dto::DuelError;
use duel_dto::PowerUpType;
use duel_dto::ServerEvent;
use duel_dto::TestCaseResult;
use duel_match::ActivateError;
use duel_match::ActivationEffect;
use duel_match::MatchEngine;
use duel_match::MatchState;
use duel_match::elo;
use duel_queue::QueueEntry;
use duel_replay::EventKind;
use duel_replay::ReplayEvent;
use duel_replay::ReplayLog;
use duel_room::ghost_race_room;
use duel_room::match_room;
use duel_room::spectator_room;
use duel_session::ConnectionId;
use std::sync::Arc;
use std::time::Duration;

/// Top-level dispatch. `player` is the connection's authenticated identity
/// slot, set by a prior `authenticate` event and threaded through by the
/// transport layer on every subsequent call.
pub async fn handle(
    state: &Arc<AppState>,
    connection: ConnectionId,
    player: &mut Option<PlayerId>,
    event: ClientEvent,
) -> Result<(), DuelError> {
    if let ClientEvent::Authenticate { token } = event {
        return authenticate(state, connection, player, &token).await;
    }
    let me = player.ok_or(DuelError::AuthRequired)?;
    match event {
        ClientEvent::Authenticate { .. } => unreachable!("handled above"),
        ClientEvent::JoinQueue { difficulty, language } => join_queue(state, me, difficulty, language).await,
        ClientEvent::LeaveQueue {} => {
            state.matchmaker.leave(me).await;
            Ok(())
        }
        ClientEvent::JoinLobby { match_id } => join_lobby(state, connection, me, match_id).await,
        ClientEvent::ReadyUp { match_id } => ready_up(state, me, match_id).await,
        ClientEvent::CodeUpdate { match_id, code, cursor } => code_update(state, connection, me, match_id, code, cursor).await,
        ClientEvent::RunCode { match_id, code } => run_code(state, connection, me, match_id, code).await,
        ClientEvent::SubmitSolution { match_id, code } => submit_solution(state, connection, me, match_id, code).await,
        ClientEvent::RequestHint { match_id, current_code, language } => {
            request_hint(state, me, match_id, current_code, language).await
        }
        ClientEvent::ActivatePowerup { match_id, power_up_type } => {
            activate_powerup(state, connection, me, match_id, power_up_type).await
        }
        ClientEvent::JoinSpectate { match_id } => {
            state.rooms.join(connection, &spectator_room(match_id)).await;
            Ok(())
        }
        ClientEvent::SpectatorMessage { match_id, message } => spectator_message(state, me, match_id, message).await,
        ClientEvent::SpectatorReaction { match_id, emoji } => spectator_reaction(state, me, match_id, emoji).await,
        ClientEvent::StartGhostRace { challenge_id, language } => {
            crate::ghost::start_race(state, connection, me, challenge_id, language).await
        }
        ClientEvent::GhostCodeUpdate { race_id, code, cursor } => {
            crate::ghost::code_update(state, me, race_id, code, cursor).await
        }
        ClientEvent::SubmitGhostSolution { race_id, code } => crate::ghost::submit(state, connection, me, race_id, code).await,
        ClientEvent::AbandonGhostRace { race_id } => crate::ghost::abandon(state, me, race_id).await,
    }
}

async fn authenticate(
    state: &Arc<AppState>,
    connection: ConnectionId,
    player: &mut Option<PlayerId>,
    token: &str,
) -> Result<(), DuelError> {
    let claims = state.crypto.decode(token).map_err(|_| DuelError::Unauthorized)?;
    if claims.expired() {
        return Err(DuelError::Unauthorized);
    }
    let me = player_id(claims.user());
    if let Some(evicted) = state.sessions.bind(me, connection, now_ms()).await {
        state.rooms.unregister(evicted).await;
    }
    *player = Some(me);
    state.rooms.send_to(connection, &ServerEvent::Authenticated { player_id: me }).await;

    if let Some(match_id) = state.player_matches.read().await.get(&me).copied() {
        let matches = state.matches.read().await;
        if let Some(runtime) = matches.get(&match_id) {
            state.rooms.join(connection, &match_room(match_id)).await;
            let remaining_secs = match &runtime.engine {
                MatchEngine::Active(_) | MatchEngine::Countdown(_) => runtime.engine.state().remaining_secs(now_ms()),
                MatchEngine::Completed(_) => 0,
                MatchEngine::Lobby(_) => runtime.engine.state().time_limit_secs,
            };
            let status = match &runtime.engine {
                MatchEngine::Lobby(_) => "lobby",
                MatchEngine::Countdown(_) => "countdown",
                MatchEngine::Active(_) => "active",
                MatchEngine::Completed(_) => "completed",
            };
            state
                .rooms
                .send_to(
                    connection,
                    &ServerEvent::Reconnected { match_id, status: status.to_string(), remaining_secs },
                )
                .await;
        }
    }
    Ok(())
}

async fn join_queue(
    state: &Arc<AppState>,
    me: PlayerId,
    difficulty: Option<String>,
    language: Option<String>,
) -> Result<(), DuelError> {
    let rating = state.rating_of(me).await;
    let entry = QueueEntry { player: me, rating, enqueued_at_ms: now_ms(), difficulty, language };
    match state.matchmaker.enqueue(entry).await {
        Some(pairing) => {
            start_match(state, pairing.a, pairing.b).await;
            Ok(())
        }
        None => {
            if let Some(position) = state.matchmaker.position(me, now_ms()).await {
                if let Some(connection) = state.sessions.lookup(me).await {
                    state
                        .rooms
                        .send_to(
                            connection,
                            &ServerEvent::QueuePosition {
                                position: position.position,
                                estimated_wait_secs: position.estimated_wait_secs,
                            },
                        )
                        .await;
                }
            }
            Ok(())
        }
    }
}

/// Allocates a challenge, creates the durable match row, and notifies both
/// players (§4.4 step 3-5). Re-queues both entries if no challenge is
/// available rather than silently dropping the pairing.
async fn start_match(state: &Arc<AppState>, a: QueueEntry, b: QueueEntry) {
    let difficulty = a.difficulty.as_deref().and_then(Difficulty::parse);
    let challenge = match state.catalog.random_for_difficulty(difficulty).await {
        Ok(Some(challenge)) => challenge,
        Ok(None) | Err(_) => {
            log::error!("no challenge available for matchmaking pair, re-queuing both players");
            state.matchmaker.enqueue(a.clone()).await;
            state.matchmaker.enqueue(b.clone()).await;
            return;
        }
    };
    let match_id = MatchId::default();
    let language1 = a.language.clone().unwrap_or_else(|| "python".to_string());
    let language2 = b.language.clone().unwrap_or_else(|| "python".to_string());
    let match_state = MatchState::new(match_id, challenge.id, a.player, b.player, language1, language2, challenge.time_limit_secs);
    let row = duel_match::Match::from(&match_state);
    if let Err(err) = duel_match::MatchRepository::create_match(&state.db, &row).await {
        log::error!("failed to persist new match {}: {}", match_id, err);
    }

    let replay = ReplayLog::new(state.db.clone());
    replay.spawn_periodic_flush(duel_core::REPLAY_FLUSH_INTERVAL);
    let runtime = MatchRuntime::new(MatchEngine::new(match_state), challenge.clone(), replay);
    state.matches.write().await.insert(match_id, runtime);
    state.player_matches.write().await.insert(a.player, match_id);
    state.player_matches.write().await.insert(b.player, match_id);

    for (me, opponent) in [(&a, &b), (&b, &a)] {
        let Some(connection) = state.sessions.lookup(me.player).await else { continue };
        state.rooms.join(connection, &match_room(match_id)).await;
        let opponent_username = state.username_of(opponent.player).await;
        state
            .rooms
            .send_to(
                connection,
                &ServerEvent::MatchFound {
                    match_id,
                    challenge_id: challenge.id,
                    opponent_id: opponent.player,
                    opponent_username,
                    opponent_rating: opponent.rating,
                },
            )
            .await;
    }
}

async fn join_lobby(state: &Arc<AppState>, connection: ConnectionId, me: PlayerId, match_id: MatchId) -> Result<(), DuelError> {
    let matches = state.matches.read().await;
    let runtime = matches.get(&match_id).ok_or(DuelError::MatchNotFound)?;
    if runtime.engine.state().opponent_of(me).is_none() {
        return Err(DuelError::Unauthorized);
    }
    drop(matches);
    state.rooms.join(connection, &match_room(match_id)).await;
    state.rooms.broadcast_except(&match_room(match_id), connection, &ServerEvent::OpponentJoined).await;
    Ok(())
}

async fn ready_up(state: &Arc<AppState>, me: PlayerId, match_id: MatchId) -> Result<(), DuelError> {
    let mut matches = state.matches.write().await;
    let runtime = matches.get_mut(&match_id).ok_or(DuelError::MatchNotFound)?;
    let room = match_room(match_id);
    let countdown = runtime.engine.ready_up(me, COUNTDOWN);
    state.rooms.broadcast(&room, &ServerEvent::OpponentReady { is_ready: true }).await;
    if let Some(remaining) = countdown {
        state
            .rooms
            .broadcast(&room, &ServerEvent::MatchStarting { countdown_ms: remaining.as_millis() as u64 })
            .await;
        schedule_match_start(Arc::clone(state), match_id, remaining);
    }
    Ok(())
}

/// Advances Countdown -> Active once the deadline passes, independent of
/// any further client traffic (§4.5 "start timestamp, timer sync").
fn schedule_match_start(state: Arc<AppState>, match_id: MatchId, remaining: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(remaining).await;
        let mut matches = state.matches.write().await;
        let Some(runtime) = matches.get_mut(&match_id) else { return };
        if !runtime.engine.try_begin(now_ms()) {
            return;
        }
        let time_limit_secs = runtime.engine.state().time_limit_secs;
        let started_at_ms = runtime.engine.state().started_at_ms.unwrap_or_else(now_ms);
        drop(matches);
        if let Err(err) = duel_match::MatchRepository::start_match(&state.db, match_id, started_at_ms).await {
            log::warn!("failed to persist match start for {}: {}", match_id, err);
        }
        state
            .rooms
            .broadcast(
                &match_room(match_id),
                &ServerEvent::MatchStarted { start_time_ms: started_at_ms, time_limit_secs, remaining_secs: time_limit_secs },
            )
            .await;
        spawn_timer_sync(state, match_id);
    });
}

/// Broadcasts `timer_sync` every [`duel_core::TIMER_SYNC_INTERVAL`] while the
/// match is active (§4.5). A player under an active `time_freeze` sees their
/// own remaining time inflated by their power-up state's time-freeze bonus (§4.6);
/// everyone else, and the spectator room, see the base server clock. Once
/// the base clock reaches zero the match is force-completed rather than
/// left hanging in `active` forever (§4.5 "active -> completed ... when
/// `remaining <= 0`").
fn spawn_timer_sync(state: Arc<AppState>, match_id: MatchId) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(duel_core::TIMER_SYNC_INTERVAL);
        loop {
            ticker.tick().await;
            let (base_remaining, player1, player2, remaining1, remaining2, expired) = {
                let mut matches = state.matches.write().await;
                let Some(runtime) = matches.get_mut(&match_id) else { return };
                if !matches!(runtime.engine, MatchEngine::Active(_)) {
                    return;
                }
                let base_remaining = runtime.engine.state().remaining_secs(now_ms());
                let player1 = runtime.engine.state().player1;
                let player2 = runtime.engine.state().player2;

                let mut expired = Vec::new();
                for player in [player1, player2] {
                    if runtime.powerups.get_mut(&player).is_some_and(|p| p.take_expired_time_freeze()) {
                        expired.push(player);
                    }
                }
                let mut bonus1 = 0u32;
                let mut bonus2 = 0u32;
                if let Some(powerups) = runtime.powerups.get(&player1) {
                    bonus1 = powerups.time_freeze_bonus().as_secs() as u32;
                }
                if let Some(powerups) = runtime.powerups.get(&player2) {
                    bonus2 = powerups.time_freeze_bonus().as_secs() as u32;
                }
                (base_remaining, player1, player2, base_remaining.saturating_add(bonus1), base_remaining.saturating_add(bonus2), expired)
            };

            let room = match_room(match_id);
            for player in expired {
                state
                    .rooms
                    .broadcast(&room, &ServerEvent::PowerupEffectExpired { player_id: player, power_up_type: PowerUpType::TimeFreeze })
                    .await;
            }
            if let Some(connection) = state.sessions.lookup(player1).await {
                state.rooms.send_to(connection, &ServerEvent::TimerSync { remaining_secs: remaining1 }).await;
            }
            if let Some(connection) = state.sessions.lookup(player2).await {
                state.rooms.send_to(connection, &ServerEvent::TimerSync { remaining_secs: remaining2 }).await;
            }
            state
                .rooms
                .broadcast(&spectator_room(match_id), &ServerEvent::TimerSync { remaining_secs: base_remaining })
                .await;

            if base_remaining == 0 {
                auto_submit_on_timeout(&state, match_id).await;
                return;
            }
        }
    });
}

/// Forces a submission (from each player's current, last-saved code) for
/// whoever has not submitted by the time the match clock hits zero, then
/// drives judging exactly once (§4.5, §8 scenario 3's "auto-triggered"
/// submission). A no-op if both players already submitted and judging is
/// already underway.
async fn auto_submit_on_timeout(state: &Arc<AppState>, match_id: MatchId) {
    let both_submitted = {
        let mut matches = state.matches.write().await;
        let Some(runtime) = matches.get_mut(&match_id) else { return };
        if !matches!(runtime.engine, MatchEngine::Active(_)) {
            return;
        }
        let started_at_ms = runtime.engine.state().started_at_ms.unwrap_or(0);
        let player1 = runtime.engine.state().player1;
        let player2 = runtime.engine.state().player2;
        for player in [player1, player2] {
            let Some(slot) = runtime.engine.state().mine(player) else { continue };
            if slot.submitted {
                continue;
            }
            let code = slot.code.clone();
            let language = slot.language.clone();
            runtime.engine.mark_submitted(player, code.clone());
            runtime
                .replay
                .record(ReplayEvent::new(match_id, player, started_at_ms, now_ms(), EventKind::Submission { code, language }))
                .await;
        }
        runtime.engine.state().both_submitted()
    };
    if both_submitted {
        state.rooms.broadcast(&match_room(match_id), &ServerEvent::OpponentSubmitted).await;
        complete_match(state, match_id).await;
    }
}

async fn code_update(
    state: &Arc<AppState>,
    connection: ConnectionId,
    me: PlayerId,
    match_id: MatchId,
    code: String,
    cursor: Cursor,
) -> Result<(), DuelError> {
    if code.len() > MAX_CODE_LENGTH {
        return Err(DuelError::CodeTooLong);
    }
    let mut matches = state.matches.write().await;
    let runtime = matches.get_mut(&match_id).ok_or(DuelError::MatchNotFound)?;
    let now = std::time::Instant::now();
    if let Some(last) = runtime.last_code_update.get(&me) {
        if now.duration_since(*last) < duel_core::CODE_UPDATE_THROTTLE {
            return Ok(());
        }
    }
    runtime.last_code_update.insert(me, now);
    let MatchEngine::Active(engine) = &mut runtime.engine else {
        return Err(DuelError::MatchNotActive);
    };
    engine.update_code(me, code.clone(), cursor).ok_or(DuelError::Unauthorized)?;
    let started_at_ms = runtime.engine.state().started_at_ms.unwrap_or(0);
    runtime
        .replay
        .record(ReplayEvent::new(match_id, me, started_at_ms, now_ms(), EventKind::CodeUpdate { code: code.clone(), cursor }))
        .await;
    let room = match_room(match_id);
    drop(matches);
    state.rooms.broadcast_except(&room, connection, &ServerEvent::OpponentCodeUpdate { code, cursor }).await;
    Ok(())
}

fn stringify(value: &serde_json::Value) -> String {
    value.to_string()
}

async fn run_code(state: &Arc<AppState>, connection: ConnectionId, me: PlayerId, match_id: MatchId, code: String) -> Result<(), DuelError> {
    let room = match_room(match_id);
    state.rooms.broadcast_except(&room, connection, &ServerEvent::OpponentTestRun { is_running: true }).await;

    let (language, cases): (String, Vec<duel_challenge::TestCase>) = {
        let matches = state.matches.read().await;
        let runtime = matches.get(&match_id).ok_or(DuelError::MatchNotFound)?;
        if !matches!(runtime.engine, MatchEngine::Active(_)) {
            return Err(DuelError::MatchNotActive);
        }
        let slot = runtime.engine.state().mine(me).ok_or(DuelError::Unauthorized)?;
        (slot.language.clone(), runtime.challenge.visible_cases().cloned().collect())
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

    let mut matches = state.matches.write().await;
    let runtime = matches.get_mut(&match_id).ok_or(DuelError::MatchNotFound)?;
    let powerups = runtime.powerups.entry(me).or_default();
    let (shielded, shield_charges_remaining) = powerups.consume_shield_charge();
    if shielded {
        for result in &mut results {
            if !result.passed {
                result.shielded = true;
            }
        }
    }
    let started_at_ms = runtime.engine.state().started_at_ms.unwrap_or(0);
    runtime
        .replay
        .record(ReplayEvent::new(match_id, me, started_at_ms, now_ms(), EventKind::TestRun { results: results.clone() }))
        .await;
    drop(matches);

    if let Some(connection) = state.sessions.lookup(me).await {
        state
            .rooms
            .send_to(connection, &ServerEvent::TestResult { results, debug_shield_active: shielded, shield_charges_remaining })
            .await;
    }
    state.rooms.broadcast_except(&room, connection, &ServerEvent::OpponentTestRun { is_running: false }).await;
    Ok(())
}

async fn submit_solution(
    state: &Arc<AppState>,
    connection: ConnectionId,
    me: PlayerId,
    match_id: MatchId,
    code: String,
) -> Result<(), DuelError> {
    if code.len() > MAX_CODE_LENGTH {
        return Err(DuelError::CodeTooLong);
    }
    let both_submitted = {
        let mut matches = state.matches.write().await;
        let runtime = matches.get_mut(&match_id).ok_or(DuelError::MatchNotFound)?;
        let slot = runtime.engine.state().mine(me).ok_or(DuelError::Unauthorized)?;
        if slot.submitted {
            return Err(DuelError::AlreadySubmitted);
        }
        let started_at_ms = runtime.engine.state().started_at_ms.unwrap_or(0);
        let language = slot.language.clone();
        let both = runtime.engine.mark_submitted(me, code.clone()).ok_or(DuelError::MatchNotActive)?;
        runtime
            .replay
            .record(ReplayEvent::new(match_id, me, started_at_ms, now_ms(), EventKind::Submission { code, language }))
            .await;
        both
    };
    state.rooms.broadcast_except(&match_room(match_id), connection, &ServerEvent::OpponentSubmitted).await;
    if both_submitted {
        complete_match(state, match_id).await;
    }
    Ok(())
}

/// Runs the judging pipeline for both submissions, applies Elo on a
/// non-fallback outcome, persists the completed row, and broadcasts the
/// result (§4.9, §9 "no rating update on fallback").
async fn complete_match(state: &Arc<AppState>, match_id: MatchId) {
    let (challenge, hints1, hints2, player1, player2) = {
        let matches = state.matches.read().await;
        let Some(runtime) = matches.get(&match_id) else { return };
        let state_ref = runtime.engine.state();
        (
            runtime.challenge.clone(),
            runtime.hints.get(&state_ref.player1).map(|h| h.hints_used()).unwrap_or(0),
            runtime.hints.get(&state_ref.player2).map(|h| h.hints_used()).unwrap_or(0),
            state_ref.player1,
            state_ref.player2,
        )
    };

    let (code1, code2, language1, language2) = {
        let matches = state.matches.read().await;
        let Some(runtime) = matches.get(&match_id) else { return };
        let s = runtime.engine.state();
        (s.slot1.code.clone(), s.slot2.code.clone(), s.slot1.language.clone(), s.slot2.language.clone())
    };

    let cases: Vec<duel_judge::score::TestCase> = challenge
        .test_cases
        .iter()
        .map(|c| duel_judge::score::TestCase {
            input: stringify(&c.input),
            expected_output: stringify(&c.expected_output),
            hidden: c.hidden,
            weight: c.weight,
        })
        .collect();

    let outcome = duel_judge::judge(
        &state.sandbox,
        &state.grader,
        &challenge.statement_md,
        &cases,
        duel_judge::Submission { language: &language1, code: &code1, hints_used: hints1 },
        duel_judge::Submission { language: &language2, code: &code2, hints_used: hints2 },
    )
    .await;

    let winner = match outcome.player1_wins {
        Some(true) => Some(player1),
        Some(false) => Some(player2),
        None => None,
    };
    let completed_at_ms = now_ms();

    {
        let mut matches = state.matches.write().await;
        let Some(runtime) = matches.get_mut(&match_id) else { return };
        runtime.engine.complete(winner, outcome.player1.final_score, outcome.player2.final_score, completed_at_ms);
        let row = duel_match::Match::from(runtime.engine.state());
        if let Err(err) = duel_match::MatchRepository::complete_match(&state.db, &row).await {
            log::error!("failed to persist completed match {}: {}", match_id, err);
        }
    }

    if !outcome.fallback {
        let rating1 = state.rating_of(player1).await;
        let rating2 = state.rating_of(player2).await;
        let (delta1, delta2) = elo::update_pair(rating1, rating2, outcome.player1_wins);
        let won1 = outcome.player1_wins.unwrap_or(false);
        let won2 = outcome.player1_wins.map(|w| !w).unwrap_or(false);
        if let Err(err) = duel_auth::AuthRepository::apply_rating_delta(&state.db, member_id(player1), delta1, won1).await {
            log::error!("failed to apply rating delta for {}: {}", player1, err);
        }
        if let Err(err) = duel_auth::AuthRepository::apply_rating_delta(&state.db, member_id(player2), delta2, won2).await {
            log::error!("failed to apply rating delta for {}: {}", player2, err);
        }
    }

    let duration_secs = {
        let matches = state.matches.read().await;
        matches.get(&match_id).map(|r| r.engine.state().started_at_ms).flatten().map(|start| ((completed_at_ms - start).max(0) / 1000) as u32).unwrap_or(0)
    };
    state
        .rooms
        .broadcast(
            &match_room(match_id),
            &ServerEvent::MatchResult {
                match_id,
                winner_id: winner,
                player1_score: outcome.player1.final_score,
                player2_score: outcome.player2.final_score,
                duration_secs,
                feedback: outcome.feedback,
            },
        )
        .await;

    {
        let mut flush = state.matches.write().await;
        if let Some(runtime) = flush.get(&match_id) {
            runtime.replay.flush().await;
        }
    }
    state.player_matches.write().await.remove(&player1);
    state.player_matches.write().await.remove(&player2);
    schedule_match_cleanup(Arc::clone(state), match_id);
}

/// Ephemeral state (§4.3) is deleted shortly after completion, giving
/// reconnecting clients a window to read the final result first.
fn schedule_match_cleanup(state: Arc<AppState>, match_id: MatchId) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(300)).await;
        state.matches.write().await.remove(&match_id);
    });
}

async fn request_hint(
    state: &Arc<AppState>,
    me: PlayerId,
    match_id: MatchId,
    current_code: String,
    language: String,
) -> Result<(), DuelError> {
    let (context, hidden_substrings) = {
        let matches = state.matches.read().await;
        let runtime = matches.get(&match_id).ok_or(DuelError::MatchNotFound)?;
        let availability = runtime.hints.get(&me).map(|h| h.availability());
        let availability = availability.ok_or(DuelError::Unauthorized)?;
        if !availability.allowed {
            if availability.hints_remaining == 0 {
                return Err(DuelError::HintLimitReached);
            }
            return Err(DuelError::HintOnCooldown { remaining: availability.cooldown_remaining.unwrap_or_default() });
        }
        let hidden: Vec<String> = runtime
            .challenge
            .test_cases
            .iter()
            .filter(|c| c.hidden)
            .flat_map(|c| [stringify(&c.input), stringify(&c.expected_output)])
            .collect();
        (runtime.challenge.statement_md.clone(), hidden)
    };

    let level = {
        let matches = state.matches.read().await;
        matches.get(&match_id).and_then(|r| r.hints.get(&me)).map(|h| h.hints_used() + 1).unwrap_or(1)
    };

    match duel_judge::AiGrader::generate_hint(&state.grader, &current_code, &language, &context, level).await {
        Ok(hint) => {
            let redacted = duel_match::redact_hidden_data(&hint, &hidden_substrings);
            let mut matches = state.matches.write().await;
            let runtime = matches.get_mut(&match_id).ok_or(DuelError::MatchNotFound)?;
            let hint_state = runtime.hints.entry(me).or_default();
            hint_state.record_success();
            let availability = hint_state.availability();
            drop(matches);
            if let Some(connection) = state.sessions.lookup(me).await {
                state.rooms.send_to(connection, &ServerEvent::HintResponse { hint: redacted, level }).await;
                state
                    .rooms
                    .send_to(
                        connection,
                        &ServerEvent::HintStatusUpdate { used: level, remaining: availability.hints_remaining },
                    )
                    .await;
            }
            Ok(())
        }
        Err(err) => {
            log::warn!("hint generation failed: {}", err);
            Err(DuelError::ExecutionFailed(err.to_string()))
        }
    }
}

async fn activate_powerup(
    state: &Arc<AppState>,
    connection: ConnectionId,
    me: PlayerId,
    match_id: MatchId,
    power_up_type: PowerUpType,
) -> Result<(), DuelError> {
    let mut matches = state.matches.write().await;
    let runtime = matches.get_mut(&match_id).ok_or(DuelError::MatchNotFound)?;
    if !matches!(runtime.engine, MatchEngine::Active(_)) {
        return Err(DuelError::MatchNotActive);
    }
    let powerups = runtime.powerups.entry(me).or_default();
    let result = powerups.activate(power_up_type);
    let counts = (powerups.count(PowerUpType::TimeFreeze), powerups.count(PowerUpType::CodePeek), powerups.count(PowerUpType::DebugShield));
    let cooldown_remaining_ms = powerups.cooldown_remaining().map(|d| d.as_millis() as u64).unwrap_or(0);

    match result {
        Ok(effect) => {
            let opponent_code = match (&effect, runtime.engine.state().theirs(me)) {
                (ActivationEffect::CodePeek, Some(slot)) => Some(slot.code.clone()),
                _ => None,
            };
            let (freeze_expires_at_ms, shield_charges_remaining) = match effect {
                ActivationEffect::TimeFreeze { expires_at } => {
                    let remaining_ms = expires_at.saturating_duration_since(std::time::Instant::now()).as_millis() as i64;
                    (Some(now_ms() + remaining_ms), None)
                }
                ActivationEffect::DebugShield { charges } => (None, Some(charges)),
                ActivationEffect::CodePeek => (None, None),
            };
            drop(matches);
            state
                .rooms
                .send_to(
                    connection,
                    &ServerEvent::PowerupActivated { player_id: me, power_up_type, opponent_code, freeze_expires_at_ms, shield_charges_remaining },
                )
                .await;
            state
                .rooms
                .send_to(
                    connection,
                    &ServerEvent::PowerupStateUpdate {
                        time_freeze: counts.0,
                        code_peek: counts.1,
                        debug_shield: counts.2,
                        cooldown_remaining_ms,
                    },
                )
                .await;
            state
                .rooms
                .broadcast_except(&match_room(match_id), connection, &ServerEvent::OpponentUsedPowerup { power_up_type })
                .await;
            Ok(())
        }
        Err(err) => {
            drop(matches);
            let (code, message) = match err {
                ActivateError::OnCooldown(remaining) => ("ON_COOLDOWN", format!("on cooldown for {}ms", remaining.as_millis())),
                ActivateError::NoCharges => ("NO_POWERUP", "no charges remaining for this power-up".to_string()),
            };
            state.rooms.send_to(connection, &ServerEvent::PowerupError { code, message }).await;
            Ok(())
        }
    }
}

async fn spectator_message(state: &Arc<AppState>, me: PlayerId, match_id: MatchId, message: String) -> Result<(), DuelError> {
    let username = state.username_of(me).await;
    state
        .rooms
        .broadcast(&spectator_room(match_id), &ServerEvent::SpectatorBroadcast { username, message })
        .await;
    Ok(())
}

async fn spectator_reaction(state: &Arc<AppState>, me: PlayerId, match_id: MatchId, emoji: String) -> Result<(), DuelError> {
    let username = state.username_of(me).await;
    state
        .rooms
        .broadcast(&spectator_room(match_id), &ServerEvent::SpectatorReactionBroadcast { username, emoji })
        .await;
    Ok(())
}

#[allow(dead_code)]
fn room_label_for_race(race_id: duel_core::RaceId) -> String {
    ghost_race_room(race_id)
}
