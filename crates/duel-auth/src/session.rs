use duel_core::ID;
use duel_core::Unique;

use super::Member;

/// An active login session. The raw bearer token never reaches the
/// database — only its [`super::Crypto::hash`] fingerprint does, so a
/// leaked database row cannot be replayed as a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    id: ID<Self>,
    user: ID<Member>,
    token_hash: String,
    expires_at: i64,
}

impl Session {
    pub fn new(id: ID<Self>, user: ID<Member>, token_hash: String) -> Self {
        let expires_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_secs() as i64
            + super::Crypto::duration().as_secs() as i64;
        Self {
            id,
            user,
            token_hash,
            expires_at,
        }
    }

    pub fn user(&self) -> ID<Member> {
        self.user
    }

    pub fn hash(&self) -> &str {
        &self.token_hash
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl Unique for Session {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use duel_pg::*;

    impl Schema for Session {
        fn name() -> &'static str {
            SESSIONS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                SESSIONS,
                " (
                    id          UUID PRIMARY KEY,
                    user_id     UUID NOT NULL,
                    token_hash  TEXT NOT NULL,
                    expires_at  BIGINT NOT NULL,
                    revoked     BOOLEAN NOT NULL DEFAULT FALSE
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_sessions_user ON ",
                SESSIONS,
                " (user_id);"
            )
        }
        fn truncates() -> &'static str {
            const_format::concatcp!("TRUNCATE TABLE ", SESSIONS, " CASCADE;")
        }
    }
}
