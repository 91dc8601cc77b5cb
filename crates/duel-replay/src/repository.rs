use crate::EventKind;
use crate::ReplayEvent;
use crate::ReplayFlush;
use duel_core::MatchId;
use duel_pg::*;
use std::sync::Arc;
use tokio_postgres::Client;

/// Durable persistence for the replay timeline (§6.2 `match_events`).
#[allow(async_fn_in_trait)]
pub trait ReplayRepository {
    async fn append_events(&self, events: &[ReplayEvent]) -> Result<(), PgErr>;
    /// Returns a match's full timeline sorted ascending by `timestamp_ms`
    /// (§4.7 "ordering... by timestamp ascending at read time").
    async fn get_events(&self, match_id: MatchId) -> Result<Vec<ReplayEvent>, PgErr>;
}

impl ReplayFlush for Arc<Client> {
    async fn append(&self, events: &[ReplayEvent]) -> anyhow::Result<()> {
        ReplayRepository::append_events(self, events)
            .await
            .map_err(anyhow::Error::from)
    }
}

impl ReplayRepository for Arc<Client> {
    async fn append_events(&self, events: &[ReplayEvent]) -> Result<(), PgErr> {
        let statement = self
            .prepare(const_format::concatcp!(
                "INSERT INTO ",
                MATCH_EVENTS,
                " (match_id, player_id, timestamp_ms, kind, data) VALUES ($1, $2, $3, $4, $5)"
            ))
            .await?;
        for event in events {
            let (kind, data) = split(&event.kind);
            self.execute(
                &statement,
                &[
                    &event.match_id.inner(),
                    &event.player_id.inner(),
                    &event.timestamp_ms,
                    &kind,
                    &data,
                ],
            )
            .await?;
        }
        Ok(())
    }

    async fn get_events(&self, match_id: MatchId) -> Result<Vec<ReplayEvent>, PgErr> {
        let rows = self
            .query(
                const_format::concatcp!(
                    "SELECT match_id, player_id, timestamp_ms, kind, data FROM ",
                    MATCH_EVENTS,
                    " WHERE match_id = $1 ORDER BY timestamp_ms ASC"
                ),
                &[&match_id.inner()],
            )
            .await?;
        Ok(rows.iter().map(from_row).collect())
    }
}

fn split(kind: &EventKind) -> (&'static str, serde_json::Value) {
    let tag = match kind {
        EventKind::CodeUpdate { .. } => "code_update",
        EventKind::TestRun { .. } => "test_run",
        EventKind::Submission { .. } => "submission",
        EventKind::CursorMove { .. } => "cursor_move",
    };
    (tag, serde_json::to_value(kind).expect("event kind serializes"))
}

fn from_row(row: &tokio_postgres::Row) -> ReplayEvent {
    let data: serde_json::Value = row.get(4);
    let kind: EventKind = serde_json::from_value(data).expect("stored event kind deserializes");
    ReplayEvent {
        match_id: MatchId::from(row.get::<_, uuid::Uuid>(0)),
        player_id: duel_core::PlayerId::from(row.get::<_, uuid::Uuid>(1)),
        timestamp_ms: row.get(2),
        kind,
    }
}

#[cfg(feature = "database")]
pub mod schema {
    use duel_pg::Schema;

    pub struct MatchEvents;

    impl Schema for MatchEvents {
        fn name() -> &'static str {
            duel_pg::MATCH_EVENTS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                duel_pg::MATCH_EVENTS,
                " (
                    id           BIGSERIAL PRIMARY KEY,
                    match_id     UUID NOT NULL,
                    player_id    UUID NOT NULL,
                    timestamp_ms BIGINT NOT NULL,
                    kind         VARCHAR(16) NOT NULL,
                    data         JSONB NOT NULL
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_match_events_match ON ",
                duel_pg::MATCH_EVENTS,
                " (match_id, timestamp_ms);"
            )
        }
        fn truncates() -> &'static str {
            const_format::concatcp!("TRUNCATE TABLE ", duel_pg::MATCH_EVENTS, " CASCADE;")
        }
    }
}
