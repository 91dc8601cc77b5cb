//! Replay Log (§4.7, C7): an ordered, buffered, durable event timeline per
//! match.
//!
//! Each match's events accumulate in an in-process ring buffer and flush to
//! the durable store as a single multi-row append, triggered by buffer
//! size, a periodic timer, or process shutdown. A failed flush re-queues
//! its events at the head so a transient database hiccup never silently
//! drops history.

#[cfg(feature = "database")]
pub mod repository;

use duel_core::MatchId;
use duel_core::PlayerId;
use duel_core::REPLAY_BATCH_SIZE;
use duel_dto::Cursor;
use duel_dto::TestCaseResult;
use serde::Deserialize;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[cfg(feature = "database")]
pub use repository::ReplayRepository;
#[cfg(feature = "database")]
pub use repository::schema::MatchEvents;

/// One atomic action in a match's timeline (§3 `ReplayEvent`). The
/// discriminator and payload are co-located per variant rather than a
/// duck-typed `data: any`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    CodeUpdate { code: String, cursor: Cursor },
    TestRun { results: Vec<TestCaseResult> },
    Submission { code: String, language: String },
    CursorMove { cursor: Cursor },
}

/// An event plus the envelope the durable store and readers need (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    /// Milliseconds since `MatchState.startedAt`, monotone-nondecreasing at
    /// emit time per match (§5 ordering guarantees).
    pub timestamp_ms: i64,
    pub kind: EventKind,
}

impl ReplayEvent {
    /// Computes `timestamp_ms` as `now_ms - started_at_ms` at emit time, per
    /// §4.7.
    pub fn new(match_id: MatchId, player_id: PlayerId, started_at_ms: i64, now_ms: i64, kind: EventKind) -> Self {
        Self {
            match_id,
            player_id,
            timestamp_ms: (now_ms - started_at_ms).max(0),
            kind,
        }
    }
}

/// Per-process in-memory buffer of pending events for every match,
/// flushed through a repository. Generic over the repository so tests can
/// substitute an in-memory fake without pulling in postgres.
pub struct ReplayLog<R> {
    pending: Mutex<VecDeque<ReplayEvent>>,
    repository: R,
}

impl<R> ReplayLog<R>
where
    R: ReplayFlush + Send + Sync + 'static,
{
    pub fn new(repository: R) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(VecDeque::new()),
            repository,
        })
    }

    /// Appends `event` to the buffer. Triggers an eager flush once the
    /// buffer reaches [`REPLAY_BATCH_SIZE`].
    pub async fn record(self: &Arc<Self>, event: ReplayEvent) {
        let should_flush = {
            let mut pending = self.pending.lock().await;
            pending.push_back(event);
            pending.len() >= REPLAY_BATCH_SIZE
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Drains the buffer and appends it as a single multi-row write. On
    /// failure, the drained events are re-queued at the head for the next
    /// flush to retry, preserving their relative order.
    pub async fn flush(self: &Arc<Self>) {
        let batch: Vec<ReplayEvent> = {
            let mut pending = self.pending.lock().await;
            pending.drain(..).collect()
        };
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.repository.append(&batch).await {
            log::warn!("replay flush failed, re-queuing {} events: {}", batch.len(), err);
            let mut pending = self.pending.lock().await;
            for event in batch.into_iter().rev() {
                pending.push_front(event);
            }
        }
    }

    /// Spawns the periodic flush timer (§4.7, ≈5s). Runs until the process
    /// exits; callers should call [`Self::flush`] once more directly on
    /// graceful shutdown to drain anything the timer hasn't caught yet.
    pub fn spawn_periodic_flush(self: &Arc<Self>, interval: Duration) {
        let log = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                log.flush().await;
            }
        });
    }
}

/// Narrow trait `ReplayLog` depends on, so it is testable without a real
/// database; the `database` feature's `ReplayRepository` (over
/// `Arc<tokio_postgres::Client>`) implements it directly.
#[allow(async_fn_in_trait)]
pub trait ReplayFlush {
    async fn append(&self, events: &[ReplayEvent]) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    #[derive(Default)]
    struct FailNTimes {
        remaining_failures: AtomicUsize,
        flushed: Mutex<Vec<ReplayEvent>>,
    }

    impl ReplayFlush for FailNTimes {
        async fn append(&self, events: &[ReplayEvent]) -> anyhow::Result<()> {
            if self.remaining_failures.load(Ordering::SeqCst) > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("transient failure");
            }
            self.flushed.lock().await.extend(events.iter().cloned());
            Ok(())
        }
    }

    fn code_update(match_id: MatchId, player: PlayerId, ts: i64) -> ReplayEvent {
        ReplayEvent {
            match_id,
            player_id: player,
            timestamp_ms: ts,
            kind: EventKind::CursorMove {
                cursor: Cursor { line: 0, col: 0 },
            },
        }
    }

    #[tokio::test]
    async fn batch_size_triggers_eager_flush() {
        let repo = FailNTimes::default();
        let log = ReplayLog::new(repo);
        let match_id = MatchId::default();
        let player = PlayerId::default();
        for i in 0..duel_core::REPLAY_BATCH_SIZE {
            log.record(code_update(match_id, player, i as i64)).await;
        }
        assert_eq!(log.repository.flushed.lock().await.len(), duel_core::REPLAY_BATCH_SIZE);
    }

    #[tokio::test]
    async fn failed_flush_requeues_events_in_order() {
        let repo = FailNTimes {
            remaining_failures: AtomicUsize::new(1),
            flushed: Mutex::new(Vec::new()),
        };
        let log = ReplayLog::new(repo);
        let match_id = MatchId::default();
        let player = PlayerId::default();
        log.record(code_update(match_id, player, 0)).await;
        log.record(code_update(match_id, player, 1)).await;
        log.flush().await; // fails, requeues
        assert!(log.repository.flushed.lock().await.is_empty());
        log.flush().await; // succeeds
        let flushed = log.repository.flushed.lock().await;
        assert_eq!(flushed[0].timestamp_ms, 0);
        assert_eq!(flushed[1].timestamp_ms, 1);
    }
}
