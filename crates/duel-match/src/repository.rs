use crate::state::Match;
use crate::state::MatchStatus;
use duel_core::ChallengeId;
use duel_core::MatchId;
use duel_core::PlayerId;
use duel_core::Unique;
use duel_pg::*;
use std::sync::Arc;
use tokio_postgres::Client;

/// Repository trait for match persistence (§6.2). Abstracts SQL away from
/// the finite state machine, which only ever sees the [`Match`] domain type.
#[allow(async_fn_in_trait)]
pub trait MatchRepository {
    async fn create_match(&self, m: &Match) -> Result<(), PgErr>;
    async fn start_match(&self, id: MatchId, started_at_ms: i64) -> Result<(), PgErr>;
    async fn complete_match(&self, m: &Match) -> Result<(), PgErr>;
    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, PgErr>;
    async fn get_matches_for(&self, player: PlayerId, limit: i64) -> Result<Vec<Match>, PgErr>;
}

impl MatchRepository for Arc<Client> {
    async fn create_match(&self, m: &Match) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                MATCHES,
                " (id, challenge_id, player1_id, player2_id, status, player1_language, player2_language) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ),
            &[
                &m.id.inner(),
                &m.challenge_id.inner(),
                &m.player1.inner(),
                &m.player2.inner(),
                &status_str(m.status),
                &m.player1_language,
                &m.player2_language,
            ],
        )
        .await
        .map(|_| ())
    }

    async fn start_match(&self, id: MatchId, started_at_ms: i64) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                MATCHES,
                " SET status = 'active', started_at_ms = $2 WHERE id = $1"
            ),
            &[&id.inner(), &started_at_ms],
        )
        .await
        .map(|_| ())
    }

    async fn complete_match(&self, m: &Match) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                MATCHES,
                " SET status = 'completed', completed_at_ms = $2, winner_id = $3, \
                 player1_score = $4, player2_score = $5, player1_code = $6, player2_code = $7, \
                 duration_secs = $8 WHERE id = $1"
            ),
            &[
                &m.id.inner(),
                &m.completed_at_ms,
                &m.winner.map(|w| w.inner()),
                &m.player1_score,
                &m.player2_score,
                &m.player1_code,
                &m.player2_code,
                &m.duration_secs.map(|d| d as i32),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, PgErr> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT id, challenge_id, player1_id, player2_id, status, started_at_ms, \
                 completed_at_ms, winner_id, player1_score, player2_score, player1_code, \
                 player2_code, player1_language, player2_language, duration_secs FROM ",
                MATCHES,
                " WHERE id = $1"
            ),
            &[&id.inner()],
        )
        .await
        .map(|opt| opt.map(|row| from_row(&row)))
    }

    async fn get_matches_for(&self, player: PlayerId, limit: i64) -> Result<Vec<Match>, PgErr> {
        self.query(
            const_format::concatcp!(
                "SELECT id, challenge_id, player1_id, player2_id, status, started_at_ms, \
                 completed_at_ms, winner_id, player1_score, player2_score, player1_code, \
                 player2_code, player1_language, player2_language, duration_secs FROM ",
                MATCHES,
                " WHERE player1_id = $1 OR player2_id = $1 ORDER BY id DESC LIMIT $2"
            ),
            &[&player.inner(), &limit],
        )
        .await
        .map(|rows| rows.iter().map(from_row).collect())
    }
}

fn status_str(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Lobby => "lobby",
        MatchStatus::Active => "active",
        MatchStatus::Completed => "completed",
    }
}

fn from_row(row: &tokio_postgres::Row) -> Match {
    let status = match row.get::<_, &str>(4) {
        "active" => MatchStatus::Active,
        "completed" => MatchStatus::Completed,
        _ => MatchStatus::Lobby,
    };
    Match {
        id: ChallengeId::from(row.get::<_, uuid::Uuid>(0)).cast(),
        challenge_id: ChallengeId::from(row.get::<_, uuid::Uuid>(1)),
        player1: PlayerId::from(row.get::<_, uuid::Uuid>(2)),
        player2: PlayerId::from(row.get::<_, uuid::Uuid>(3)),
        status,
        started_at_ms: row.get::<_, Option<i64>>(5),
        completed_at_ms: row.get::<_, Option<i64>>(6),
        winner: row.get::<_, Option<uuid::Uuid>>(7).map(PlayerId::from),
        player1_score: row.get::<_, Option<f32>>(8),
        player2_score: row.get::<_, Option<f32>>(9),
        player1_code: row.get::<_, Option<String>>(10),
        player2_code: row.get::<_, Option<String>>(11),
        player1_language: row.get::<_, String>(12),
        player2_language: row.get::<_, String>(13),
        duration_secs: row.get::<_, Option<i32>>(14).map(|d| d as u32),
    }
}
