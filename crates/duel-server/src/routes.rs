//! HTTP/WebSocket transport glue: the WebSocket upgrade that bridges an
//! `actix_ws` connection to [`crate::dispatch::handle`], and the one plain
//! HTTP route the client needs outside the duplex channel (§6.1, §6.2).
//!
//! Grounded on the teacher's `Casino::bridge`: a `tokio::select!` loop that
//! drains the connection's outbox (here, [`duel_room::RoomFabric`]'s
//! per-connection channel) on one arm and the incoming WebSocket stream on
//! the other, so per-connection delivery stays FIFO in both directions.

use crate::dispatch;
use crate::state::AppState;
use crate::time::now_ms;
use duel_core::ChallengeId;
use duel_core::PlayerId;
use duel_dto::ClientEvent;
use duel_dto::DuelError;
use duel_dto::ServerEvent;
use duel_session::ConnectionId;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::Responder;
use actix_web::web;
use futures::StreamExt;
use std::sync::Arc;

pub async fn get_challenge(state: web::Data<AppState>, path: web::Path<ChallengeId>) -> impl Responder {
    match state.catalog.get(path.into_inner()).await {
        Ok(Some(challenge)) => HttpResponse::Ok().json(challenge_dto(&challenge)),
        Ok(None) => HttpResponse::NotFound().body("challenge not found"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

/// Strips the reference solution and hidden test cases before a challenge
/// ever crosses the wire (§3 "Challenge ... hidden" tests are server-only).
fn challenge_dto(challenge: &duel_challenge::Challenge) -> serde_json::Value {
    serde_json::json!({
        "id": challenge.id,
        "title": challenge.title,
        "statementMd": challenge.statement_md,
        "difficulty": challenge.difficulty.as_str(),
        "starterCode": challenge.starter_code,
        "timeLimitSecs": challenge.time_limit_secs,
        "visibleTestCases": challenge.visible_cases().collect::<Vec<_>>(),
    })
}

/// Upgrades to a WebSocket and bridges it to the event dispatcher.
/// Authentication may arrive either as a `?token=` query parameter on the
/// handshake, or as a deferred `authenticate` event over the socket
/// (§6.1 "Fallback auth post-connect").
pub async fn connect(req: HttpRequest, body: web::Payload, state: web::Data<AppState>) -> impl Responder {
    let (response, mut session, mut stream) = match actix_ws::handle(&req, body) {
        Ok(parts) => parts,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };

    let connection: ConnectionId = ConnectionId::now_v7();
    let mut rx = state.rooms.register(connection).await;
    let mut player: Option<PlayerId> = None;

    if let Ok(claims) = duel_auth::extract_from_query(&req, &state.crypto) {
        if !claims.expired() {
            let me = crate::state::player_id(claims.user());
            if let Some(evicted) = state.sessions.bind(me, connection, now_ms()).await {
                state.rooms.unregister(evicted).await;
            }
            player = Some(me);
        }
    }

    let state: Arc<AppState> = state.into_inner();
    actix_web::rt::spawn(async move {
        'socket: loop {
            tokio::select! {
                biased;
                outgoing = rx.recv() => match outgoing {
                    Some(json) => if session.text(json).await.is_err() { break 'socket },
                    None => break 'socket,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(actix_ws::Message::Text(text))) => {
                        handle_frame(&state, connection, &mut player, &text).await;
                    }
                    Some(Ok(actix_ws::Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() { break 'socket }
                    }
                    Some(Ok(actix_ws::Message::Close(_))) | Some(Err(_)) | None => break 'socket,
                    _ => continue 'socket,
                },
            }
        }
        disconnect(&state, connection, player).await;
        let _ = session.close(None).await;
    });

    Ok::<_, actix_web::Error>(response)
}

async fn handle_frame(state: &Arc<AppState>, connection: ConnectionId, player: &mut Option<PlayerId>, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(_) => {
            state
                .rooms
                .send_to(connection, &ServerEvent::from(DuelError::InvalidData("malformed event".to_string())))
                .await;
            return;
        }
    };
    if let Err(err) = dispatch::handle(state, connection, player, event).await {
        state.rooms.send_to(connection, &ServerEvent::from(err)).await;
    }
}

/// Unwinds a dropped connection: the Room Fabric entry is dropped
/// immediately (best-effort delivery has nothing left to deliver to), but
/// the Session Directory's downstream cleanup (matchmaker removal, ghost
/// race abandonment) waits out the disconnect grace window (§4.1).
async fn disconnect(state: &Arc<AppState>, connection: ConnectionId, player: Option<PlayerId>) {
    state.rooms.unregister(connection).await;
    if player.is_none() {
        return;
    }
    let Some(disconnected) = state.sessions.unbind(connection).await else { return };
    let state = Arc::clone(state);
    state.sessions.defer_cleanup(disconnected, duel_core::DISCONNECT_GRACE, move |player| {
        tokio::spawn(async move {
            state.matchmaker.leave(player).await;
            state.player_matches.write().await.remove(&player);
            let race_id = {
                let races = state.races.read().await;
                races.iter().find(|(_, r)| r.race.player_id == player).map(|(id, _)| *id)
            };
            if let Some(race_id) = race_id {
                if let Some(runtime) = state.races.write().await.get_mut(&race_id) {
                    runtime.race.abandon();
                }
            }
        });
    });
}
