//! Session Directory (§4.1, C1): the bijection between a player's identity
//! and their live bidirectional connection.
//!
//! Mirrors the `Casino`/`RoomHandle` split the teacher uses for its
//! WebSocket hosting layer, but keyed by player identity instead of room
//! id, and adds the disconnect grace window the spec requires (§4.1, §5
//! "Cancellation & timeouts").

use duel_core::PlayerId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Opaque per-connection identifier, assigned by the transport layer at
/// connect time.
pub type ConnectionId = uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Binding {
    connection: ConnectionId,
    connected_at_ms: i64,
}

/// Maps `playerId <-> connectionId` for every currently live connection.
/// At most one binding exists per player at any instant: [`Self::bind`]
/// atomically evicts whatever connection previously held that player's
/// identity.
#[derive(Default)]
pub struct SessionDirectory {
    by_player: RwLock<HashMap<PlayerId, Binding>>,
    by_connection: RwLock<HashMap<ConnectionId, PlayerId>>,
}

/// A disconnect's bookkeeping, handed back to the caller so it can race a
/// rebind against the grace-window cleanup in [`Self::defer_cleanup`].
pub struct Disconnected {
    pub player: PlayerId,
}

impl SessionDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Binds `player` to `connection`, evicting any prior connection for
    /// that player. Returns the evicted connection id, if any, so the
    /// caller can force-close it (the prior connection's authenticated
    /// state is no longer valid once this returns).
    pub async fn bind(&self, player: PlayerId, connection: ConnectionId, now_ms: i64) -> Option<ConnectionId> {
        let mut by_player = self.by_player.write().await;
        let mut by_connection = self.by_connection.write().await;
        let evicted = by_player.insert(player, Binding { connection, connected_at_ms: now_ms });
        if let Some(old) = evicted {
            by_connection.remove(&old.connection);
        }
        by_connection.insert(connection, player);
        evicted.map(|old| old.connection)
    }

    /// Removes `connection`'s binding, but only if it is still the current
    /// binding for its player (a connection that was already superseded by
    /// [`Self::bind`] has nothing left to unbind). Returns the bookkeeping
    /// needed to run [`Self::defer_cleanup`].
    pub async fn unbind(&self, connection: ConnectionId) -> Option<Disconnected> {
        let mut by_connection = self.by_connection.write().await;
        let player = by_connection.remove(&connection)?;
        let mut by_player = self.by_player.write().await;
        match by_player.get(&player) {
            Some(b) if b.connection == connection => {
                by_player.remove(&player);
            }
            _ => return None,
        }
        Some(Disconnected { player })
    }

    pub async fn lookup(&self, player: PlayerId) -> Option<ConnectionId> {
        self.by_player.read().await.get(&player).map(|b| b.connection)
    }

    pub async fn connected_at_ms(&self, player: PlayerId) -> Option<i64> {
        self.by_player.read().await.get(&player).map(|b| b.connected_at_ms)
    }

    /// True if `player` has no binding at all. `unbind` removes the
    /// `by_player` entry entirely before handing back a [`Disconnected`],
    /// so any binding observed afterward is necessarily a later rebind —
    /// there is no stale entry to mistake for "still disconnected".
    async fn still_absent(&self, player: PlayerId) -> bool {
        self.by_player.read().await.get(&player).is_none()
    }

    /// Schedules `cleanup` to run after the disconnect grace window,
    /// unless `player` rebinds before then. This is the race described in
    /// §5: exactly one of "rebind" or "cleanup" wins, decided by whether a
    /// binding for `player` exists when the grace window elapses.
    pub fn defer_cleanup<F>(self: &Arc<Self>, disconnected: Disconnected, grace: Duration, cleanup: F)
    where
        F: FnOnce(PlayerId) + Send + 'static,
    {
        let directory = Arc::clone(self);
        let Disconnected { player } = disconnected;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if directory.still_absent(player).await {
                log::debug!("grace window expired for player {}, running cleanup", player);
                cleanup(player);
            } else {
                log::debug!("player {} reconnected within grace window, skipping cleanup", player);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_evicts_prior_connection_for_the_same_player() {
        let dir = SessionDirectory::new();
        let player = PlayerId::default();
        let c1 = ConnectionId::now_v7();
        let c2 = ConnectionId::now_v7();
        assert!(dir.bind(player, c1, 0).await.is_none());
        let evicted = dir.bind(player, c2, 1).await;
        assert_eq!(evicted, Some(c1));
        assert_eq!(dir.lookup(player).await, Some(c2));
    }

    #[tokio::test]
    async fn unbind_after_supersession_is_a_no_op() {
        let dir = SessionDirectory::new();
        let player = PlayerId::default();
        let c1 = ConnectionId::now_v7();
        let c2 = ConnectionId::now_v7();
        dir.bind(player, c1, 0).await;
        dir.bind(player, c2, 1).await;
        // c1's disconnect fires after c2 already replaced it.
        assert!(dir.unbind(c1).await.is_none());
        assert_eq!(dir.lookup(player).await, Some(c2));
    }

    #[tokio::test]
    async fn rebind_within_grace_window_skips_cleanup() {
        let dir = SessionDirectory::new();
        let player = PlayerId::default();
        let c1 = ConnectionId::now_v7();
        dir.bind(player, c1, 0).await;
        let disconnected = dir.unbind(c1).await.unwrap();
        let c2 = ConnectionId::now_v7();
        dir.bind(player, c2, 1).await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        dir.defer_cleanup(disconnected, Duration::from_millis(5), move |p| {
            let _ = tx.send(p);
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.await.is_err(), "cleanup must not run after a rebind");
    }

    #[tokio::test]
    async fn expired_grace_window_runs_cleanup_once() {
        let dir = SessionDirectory::new();
        let player = PlayerId::default();
        let c1 = ConnectionId::now_v7();
        dir.bind(player, c1, 0).await;
        let disconnected = dir.unbind(c1).await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        dir.defer_cleanup(disconnected, Duration::from_millis(5), move |p| {
            let _ = tx.send(p);
        });
        let cleaned = rx.await.unwrap();
        assert_eq!(cleaned, player);
    }
}
