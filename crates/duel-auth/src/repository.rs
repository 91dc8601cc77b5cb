use super::*;
use duel_core::ID;
use duel_core::Unique;
use duel_pg::*;
use std::sync::Arc;
use tokio_postgres::Client;

/// Repository trait for authentication database operations.
/// Abstracts SQL from the domain modules above.
#[allow(async_fn_in_trait)]
pub trait AuthRepository {
    async fn signin(&self, session: &Session) -> Result<(), PgErr>;
    async fn revoke(&self, session: ID<Session>) -> Result<(), PgErr>;
    async fn exists(&self, username: &str, email: &str) -> Result<bool, PgErr>;
    async fn create(&self, member: &Member, hashword: &str) -> Result<(), PgErr>;
    async fn lookup(&self, username: &str) -> Result<Option<(Member, String)>, PgErr>;
    /// Current Elo rating for a player, used by the matchmaker.
    async fn rating(&self, member: ID<Member>) -> Result<Option<i32>, PgErr>;
    /// Display name for a player, used to populate `match_found`'s
    /// `opponent_username` without round-tripping through the client.
    async fn username_of(&self, member: ID<Member>) -> Result<Option<String>, PgErr>;
    /// Applies a judging pipeline's Elo delta and increments the matching
    /// win/loss counter. Never called on the §4.5 fallback path, where no
    /// rating update should happen at all.
    async fn apply_rating_delta(&self, member: ID<Member>, delta: i32, won: bool) -> Result<(), PgErr>;
}

impl AuthRepository for Arc<Client> {
    async fn exists(&self, username: &str, email: &str) -> Result<bool, PgErr> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT 1 FROM ",
                USERS,
                " WHERE username = $1 OR email = $2"
            ),
            &[&username, &email],
        )
        .await
        .map(|opt| opt.is_some())
    }

    async fn create(&self, member: &Member, hashword: &str) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                USERS,
                " (id, username, email, hashword) VALUES ($1, $2, $3, $4)"
            ),
            &[
                &member.id().inner(),
                &member.username(),
                &member.email(),
                &hashword,
            ],
        )
        .await
        .map(|_| ())
    }

    async fn lookup(&self, username: &str) -> Result<Option<(Member, String)>, PgErr> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT id, username, email, hashword FROM ",
                USERS,
                " WHERE username = $1"
            ),
            &[&username],
        )
        .await
        .map(|opt| {
            opt.map(|row| {
                (
                    Member::new(
                        ID::from(row.get::<_, uuid::Uuid>(0)),
                        row.get::<_, String>(1),
                        row.get::<_, String>(2),
                    ),
                    row.get::<_, String>(3),
                )
            })
        })
    }

    async fn rating(&self, member: ID<Member>) -> Result<Option<i32>, PgErr> {
        self.query_opt(
            const_format::concatcp!("SELECT rating FROM ", USERS, " WHERE id = $1"),
            &[&member.inner()],
        )
        .await
        .map(|opt| opt.map(|row| row.get::<_, i32>(0)))
    }

    async fn username_of(&self, member: ID<Member>) -> Result<Option<String>, PgErr> {
        self.query_opt(
            const_format::concatcp!("SELECT username FROM ", USERS, " WHERE id = $1"),
            &[&member.inner()],
        )
        .await
        .map(|opt| opt.map(|row| row.get::<_, String>(0)))
    }

    async fn apply_rating_delta(&self, member: ID<Member>, delta: i32, won: bool) -> Result<(), PgErr> {
        let (win_incr, loss_incr) = if won { (1, 0) } else { (0, 1) };
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                USERS,
                " SET rating = rating + $2, wins = wins + $3, losses = losses + $4 WHERE id = $1"
            ),
            &[&member.inner(), &delta, &win_incr, &loss_incr],
        )
        .await
        .map(|_| ())
    }

    async fn signin(&self, session: &Session) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                SESSIONS,
                " (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4)"
            ),
            &[
                &session.id().inner(),
                &session.user().inner(),
                &session.hash(),
                &session.expires_at(),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn revoke(&self, session: ID<Session>) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!("UPDATE ", SESSIONS, " SET revoked = TRUE WHERE id = $1"),
            &[&session.inner()],
        )
        .await
        .map(|_| ())
    }
}
