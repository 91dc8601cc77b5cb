use crate::GhostRecording;
use duel_core::ChallengeId;
use duel_pg::*;
use std::sync::Arc;
use tokio_postgres::Client;

/// Durable persistence for ghost recordings (§6.2 `ghost_recordings`).
#[allow(async_fn_in_trait)]
pub trait GhostRepository {
    async fn save_recording(&self, recording: &GhostRecording) -> Result<(), PgErr>;
    /// A random human recording for `challenge_id`, if any exist.
    async fn random_recording(&self, challenge_id: ChallengeId) -> Result<Option<GhostRecording>, PgErr>;
}

impl GhostRepository for Arc<Client> {
    async fn save_recording(&self, recording: &GhostRecording) -> Result<(), PgErr> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                GHOST_RECORDINGS,
                " (id, challenge_id, owner_id, username, score, duration_ms, is_ai, events) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ),
            &[
                &recording.id.inner(),
                &recording.challenge_id.inner(),
                &recording.owner_id.map(|id| id.inner()),
                &recording.username,
                &recording.score,
                &recording.duration_ms,
                &recording.is_ai,
                &serde_json::to_value(&recording.events).expect("ghost events serialize"),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn random_recording(&self, challenge_id: ChallengeId) -> Result<Option<GhostRecording>, PgErr> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT id, challenge_id, owner_id, username, score, duration_ms, is_ai, events FROM ",
                GHOST_RECORDINGS,
                " WHERE challenge_id = $1 AND is_ai = false ORDER BY random() LIMIT 1"
            ),
            &[&challenge_id.inner()],
        )
        .await
        .map(|opt| opt.map(from_row))
    }
}

fn from_row(row: &tokio_postgres::Row) -> GhostRecording {
    let events: serde_json::Value = row.get(7);
    GhostRecording {
        id: duel_core::GhostId::from(row.get::<_, uuid::Uuid>(0)),
        challenge_id: ChallengeId::from(row.get::<_, uuid::Uuid>(1)),
        owner_id: row.get::<_, Option<uuid::Uuid>>(2).map(duel_core::PlayerId::from),
        username: row.get(3),
        score: row.get(4),
        duration_ms: row.get(5),
        is_ai: row.get(6),
        events: serde_json::from_value(events).expect("stored ghost events deserialize"),
    }
}

#[cfg(feature = "database")]
pub mod schema {
    use duel_pg::Schema;

    pub struct GhostRecordings;

    impl Schema for GhostRecordings {
        fn name() -> &'static str {
            duel_pg::GHOST_RECORDINGS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                duel_pg::GHOST_RECORDINGS,
                " (
                    id            UUID PRIMARY KEY,
                    challenge_id  UUID NOT NULL,
                    owner_id      UUID,
                    username      VARCHAR(32) NOT NULL,
                    score         REAL NOT NULL,
                    duration_ms   BIGINT NOT NULL,
                    is_ai         BOOLEAN NOT NULL,
                    events        JSONB NOT NULL
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_ghost_recordings_challenge ON ",
                duel_pg::GHOST_RECORDINGS,
                " (challenge_id);"
            )
        }
        fn truncates() -> &'static str {
            const_format::concatcp!("TRUNCATE TABLE ", duel_pg::GHOST_RECORDINGS, " CASCADE;")
        }
    }
}
