//! Matchmaker (§4.4, C4): a rating-banded FIFO queue bucketed by
//! `(difficulty?, language?)`, pairing the two oldest compatible entries on
//! every enqueue.
//!
//! Challenge selection, match/row creation, and the `match_found`
//! notification are the caller's job (§9 "cyclic references... replaced
//! with explicit interface boundaries") — this crate only owns the queue
//! and the pairing policy, so it has no dependency on persistence or the
//! room fabric.

use duel_core::MATCHMAKING_TOLERANCE_GROWTH_PER_SEC;
use duel_core::MATCHMAKING_TOLERANCE_START;
use duel_core::PlayerId;
use duel_core::Rating;
use std::collections::HashMap;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Bucket key: queues are segmented by an optional difficulty and an
/// optional language filter, matched exactly (`None` only pairs with
/// `None`).
type BucketKey = (Option<String>, Option<String>);

/// A single queued player (§3).
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub player: PlayerId,
    pub rating: Rating,
    pub enqueued_at_ms: i64,
    pub difficulty: Option<String>,
    pub language: Option<String>,
}

impl QueueEntry {
    fn bucket(&self) -> BucketKey {
        (self.difficulty.clone(), self.language.clone())
    }
}

/// Two entries the matchmaker has paired. Both have already been removed
/// from their bucket atomically with respect to every other `enqueue`.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub a: QueueEntry,
    pub b: QueueEntry,
}

/// Current queue position feedback for a still-waiting player (§4.4
/// "periodic position feedback").
#[derive(Debug, Clone, Copy)]
pub struct QueuePosition {
    pub position: u32,
    pub estimated_wait_secs: u32,
}

#[derive(Default)]
pub struct Matchmaker {
    buckets: RwLock<HashMap<BucketKey, VecDeque<QueueEntry>>>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` FIFO into its bucket, then attempts to pair it with
    /// the oldest compatible waiting entry. Returns the pairing if one was
    /// found; both entries are removed from the bucket in the same
    /// locked section, so no third `enqueue` can observe either half-paired.
    pub async fn enqueue(&self, entry: QueueEntry) -> Option<Pairing> {
        let key = entry.bucket();
        let mut buckets = self.buckets.write().await;
        let queue = buckets.entry(key).or_default();
        queue.push_back(entry);
        let paired = Self::try_pair(queue);
        paired
    }

    /// Removes `player` from whichever bucket holds them (disconnect grace
    /// expiry, explicit `leave_queue`, or a losing race against a pairing
    /// that already claimed them). Returns whether a removal happened.
    pub async fn leave(&self, player: PlayerId) -> bool {
        let mut buckets = self.buckets.write().await;
        let mut removed = false;
        for queue in buckets.values_mut() {
            let before = queue.len();
            queue.retain(|e| e.player != player);
            removed |= queue.len() != before;
        }
        buckets.retain(|_, q| !q.is_empty());
        removed
    }

    /// 1-indexed position and a rough wait estimate for a still-queued
    /// player, for the periodic `queue_position` broadcast.
    pub async fn position(&self, player: PlayerId, now_ms: i64) -> Option<QueuePosition> {
        let buckets = self.buckets.read().await;
        for queue in buckets.values() {
            if let Some(idx) = queue.iter().position(|e| e.player == player) {
                let entry = &queue[idx];
                let waited_secs = ((now_ms - entry.enqueued_at_ms).max(0) / 1000) as u32;
                // Crude estimate: assume pairs clear roughly every 10s per
                // position ahead, floored so a near-front entry reads "soon".
                let estimated_wait_secs = (idx as u32).saturating_mul(10).max(1).saturating_sub(waited_secs.min(9));
                return Some(QueuePosition {
                    position: idx as u32 + 1,
                    estimated_wait_secs,
                });
            }
        }
        None
    }

    /// Every currently queued player, for the periodic `queue_position`
    /// sweep (§4.4 "periodic position feedback"). Order is unspecified.
    pub async fn all_players(&self) -> Vec<PlayerId> {
        self.buckets
            .read()
            .await
            .values()
            .flat_map(|queue| queue.iter().map(|e| e.player))
            .collect()
    }

    /// Tolerance window at `waited_secs` of queue time (§4.4: "start e.g.
    /// ±100, widening with waiting time").
    fn tolerance(waited_secs: u32) -> Rating {
        MATCHMAKING_TOLERANCE_START + MATCHMAKING_TOLERANCE_GROWTH_PER_SEC * waited_secs as Rating
    }

    /// Scans `queue` (oldest first) for the first pair within tolerance of
    /// each other, using the more patient of the two entries' wait time to
    /// compute the window. Removes both on a match.
    fn try_pair(queue: &mut VecDeque<QueueEntry>) -> Option<Pairing> {
        let now_ms = queue.back()?.enqueued_at_ms;
        let n = queue.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&queue[i], &queue[j]);
                let waited_a = ((now_ms - a.enqueued_at_ms).max(0) / 1000) as u32;
                let waited_b = ((now_ms - b.enqueued_at_ms).max(0) / 1000) as u32;
                let window = Self::tolerance(waited_a.max(waited_b));
                if (a.rating - b.rating).abs() <= window {
                    // remove j before i since j > i, to keep indices valid
                    let b = queue.remove(j).expect("j in bounds");
                    let a = queue.remove(i).expect("i in bounds");
                    return Some(Pairing { a, b });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(player: PlayerId, rating: Rating, enqueued_at_ms: i64) -> QueueEntry {
        QueueEntry {
            player,
            rating,
            enqueued_at_ms,
            difficulty: Some("easy".into()),
            language: Some("rust".into()),
        }
    }

    #[tokio::test]
    async fn two_close_ratings_pair_immediately() {
        let mm = Matchmaker::new();
        let p1 = PlayerId::default();
        let p2 = PlayerId::default();
        assert!(mm.enqueue(entry(p1, 1000, 0)).await.is_none());
        let pairing = mm.enqueue(entry(p2, 1010, 0)).await.unwrap();
        assert!(
            (pairing.a.player == p1 && pairing.b.player == p2)
                || (pairing.a.player == p2 && pairing.b.player == p1)
        );
    }

    #[tokio::test]
    async fn distant_ratings_wait_until_tolerance_widens() {
        let mm = Matchmaker::new();
        let p1 = PlayerId::default();
        let p2 = PlayerId::default();
        mm.enqueue(entry(p1, 1000, 0)).await;
        // 500 rating gap: at t=0 tolerance is only 100, no pair yet.
        assert!(mm.enqueue(entry(p2, 1500, 0)).await.is_none());
        assert_eq!(mm.position(p1, 0).await.unwrap().position, 1);
    }

    #[tokio::test]
    async fn pairing_removes_both_entries_atomically() {
        let mm = Matchmaker::new();
        let p1 = PlayerId::default();
        let p2 = PlayerId::default();
        let p3 = PlayerId::default();
        mm.enqueue(entry(p1, 1000, 0)).await;
        mm.enqueue(entry(p3, 1000, 0)).await;
        let pairing = mm.enqueue(entry(p2, 1000, 0)).await.unwrap();
        let paired = [pairing.a.player, pairing.b.player];
        // whichever two got paired, the third is still queued alone
        let remaining = [p1, p2, p3].into_iter().find(|p| !paired.contains(p)).unwrap();
        assert_eq!(mm.position(remaining, 0).await.unwrap().position, 1);
        assert!(mm.position(paired[0], 0).await.is_none());
    }

    #[tokio::test]
    async fn leave_removes_a_queued_player() {
        let mm = Matchmaker::new();
        let p1 = PlayerId::default();
        mm.enqueue(entry(p1, 1000, 0)).await;
        assert!(mm.leave(p1).await);
        assert!(mm.position(p1, 0).await.is_none());
        assert!(!mm.leave(p1).await);
    }

    #[tokio::test]
    async fn different_buckets_never_pair() {
        let mm = Matchmaker::new();
        let p1 = PlayerId::default();
        let p2 = PlayerId::default();
        mm.enqueue(entry(p1, 1000, 0)).await;
        let mut other = entry(p2, 1000, 0);
        other.difficulty = Some("hard".into());
        assert!(mm.enqueue(other).await.is_none());
    }
}
