//! Unified duel backend: matchmaking, live match hosting, judging, and
//! ghost races behind one HTTP/WebSocket process.
//!
//! Mirrors the shape of the teacher's `rbp_server` (a thin `Server::run`
//! over `HttpServer::new`), but the state the request handlers close over
//! is the match-orchestration core rather than a single `Casino`: each
//! subsystem crate owns its slice of `AppState`, and `dispatch::handle` is
//! the one place that sees the whole event surface.

pub mod dispatch;
pub mod ghost;
pub mod grader;
pub mod routes;
pub mod sandbox;
pub mod state;
pub mod time;

use actix_cors::Cors;
use actix_web::App;
use actix_web::HttpServer;
use actix_web::middleware::Logger;
use actix_web::web;
use std::sync::Arc;

use grader::HttpAiGrader;
use sandbox::HttpSandbox;
use state::AppState;

pub struct Server;

impl Server {
    pub async fn run() -> Result<(), std::io::Error> {
        let db = duel_pg::db().await;
        migrate(&db).await;
        let state = web::Data::new(build_state(db).await);
        spawn_queue_position_sweep(state.clone().into_inner());

        log::info!("starting duel server");
        HttpServer::new(move || {
            App::new()
                .wrap(Logger::new("%r %s %Ts"))
                .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
                .app_data(state.clone())
                .app_data(web::Data::new(state.crypto.clone()))
                .service(web::resource("/auth/register").route(web::post().to(duel_auth::register)))
                .service(web::resource("/auth/login").route(web::post().to(duel_auth::login)))
                .service(web::resource("/auth/logout").route(web::post().to(duel_auth::logout)))
                .service(web::resource("/auth/me").route(web::get().to(duel_auth::me)))
                .service(web::resource("/challenges/{id}").route(web::get().to(routes::get_challenge)))
                .route("/ws", web::get().to(routes::connect))
        })
        .workers(4)
        .bind(std::env::var("BIND_ADDR").expect("BIND_ADDR must be set"))?
        .run()
        .await
    }
}

/// Runs every domain crate's `CREATE TABLE IF NOT EXISTS` / index DDL.
/// Idempotent, so it is safe to run on every boot rather than a separate
/// migration binary (mirrors the teacher's `connect.rs`, one
/// `batch_execute` per persisted type).
async fn migrate(db: &tokio_postgres::Client) {
    use duel_pg::Schema;
    for ddl in [
        duel_auth::Member::creates(),
        duel_auth::Member::indices(),
        duel_auth::Session::creates(),
        duel_auth::Session::indices(),
        duel_challenge::Challenges::creates(),
        duel_challenge::Challenges::indices(),
        duel_match::Match::creates(),
        duel_match::Match::indices(),
        duel_replay::MatchEvents::creates(),
        duel_replay::MatchEvents::indices(),
        duel_ghost::GhostRecordings::creates(),
        duel_ghost::GhostRecordings::indices(),
    ] {
        db.batch_execute(ddl).await.expect("schema migration");
    }
}

async fn build_state(db: Arc<tokio_postgres::Client>) -> AppState {
    AppState {
        crypto: duel_auth::Crypto::from_env(),
        sessions: duel_session::SessionDirectory::new(),
        rooms: Arc::new(duel_room::RoomFabric::new()),
        matchmaker: Arc::new(duel_queue::Matchmaker::new()),
        matches: Default::default(),
        player_matches: Default::default(),
        races: Default::default(),
        catalog: Arc::new(db.clone()),
        sandbox: HttpSandbox::from_env(),
        grader: HttpAiGrader::from_env(),
        db,
    }
}

/// Every few seconds, emits `queue_position` to each still-queued player
/// (§4.4 "periodic position feedback"). One sweep per process, independent
/// of any single match's lifetime.
fn spawn_queue_position_sweep(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(duel_core::QUEUE_POSITION_INTERVAL);
        loop {
            ticker.tick().await;
            let now = time::now_ms();
            for player in state.matchmaker.all_players().await {
                let Some(position) = state.matchmaker.position(player, now).await else { continue };
                let Some(connection) = state.sessions.lookup(player).await else { continue };
                state
                    .rooms
                    .send_to(
                        connection,
                        &duel_dto::ServerEvent::QueuePosition {
                            position: position.position,
                            estimated_wait_secs: position.estimated_wait_secs,
                        },
                    )
                    .await;
            }
        }
    });
}
