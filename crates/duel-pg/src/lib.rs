//! PostgreSQL connectivity and table metadata.
//!
//! Low-level database connectivity shared by every crate's repository
//! trait. Keeps no domain knowledge of its own — `Schema` only describes
//! table shape, and actual reads/writes live behind each domain crate's
//! own repository trait (`MatchRepository`, `ReplayRepository`, ...),
//! the same split `rbp-gameroom::HistoryRepository` keeps from `rbp-pg`.
mod schema;

pub use schema::Schema;

use std::sync::Arc;
use tokio_postgres::Client;

/// Establishes a database connection.
///
/// Connects to PostgreSQL using the `DB_URL` environment variable.
/// Returns an `Arc<Client>` suitable for sharing across async tasks.
///
/// # Panics
///
/// Panics if `DB_URL` is not set or if connection fails — this only runs
/// once at process startup, matching the teacher's `rbp_pg::db()`.
pub async fn db() -> Arc<Client> {
    log::info!("connecting to database");
    let tls = tokio_postgres::tls::NoTls;
    let ref url = std::env::var("DB_URL").expect("DB_URL must be set");
    let (client, connection) = tokio_postgres::connect(url, tls)
        .await
        .expect("database connection failed");
    tokio::spawn(connection);
    client
        .execute("SET client_min_messages TO WARNING", &[])
        .await
        .expect("set client_min_messages");
    Arc::new(client)
}

/// PostgreSQL error type alias.
pub type PgErr = tokio_postgres::Error;

/// Table for registered user accounts.
#[rustfmt::skip]
pub const USERS:     &str = "users";
/// Table for published challenges and their test cases.
#[rustfmt::skip]
pub const CHALLENGES: &str = "challenges";
/// Table for matches (lobby/active/completed rows).
#[rustfmt::skip]
pub const MATCHES:   &str = "matches";
/// Table for the per-match replay event timeline.
#[rustfmt::skip]
pub const MATCH_EVENTS: &str = "match_events";
/// Table for saved ghost-race recordings.
#[rustfmt::skip]
pub const GHOST_RECORDINGS: &str = "ghost_recordings";
/// Table for user authentication sessions.
#[rustfmt::skip]
pub const SESSIONS:  &str = "sessions";
