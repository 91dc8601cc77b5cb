//! Room Fabric (§4.2, C2): named multicast groups over the connections the
//! Session Directory tracks, with per-connection FIFO delivery.
//!
//! Grounded on the teacher's `Casino`/`RoomHandle` WebSocket bridge: each
//! connection gets an unbounded mpsc channel whose receiver is drained by
//! the transport layer's `actix_ws::Session`, so ordering between two
//! events sent to the same connection is preserved by the channel itself.

use duel_dto::ServerEvent;
use duel_session::ConnectionId;
use std::collections::HashMap;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

/// Canonical room label for a match's two players.
pub fn match_room(match_id: impl std::fmt::Display) -> String {
    format!("match:{match_id}")
}

/// Canonical room label for a match's spectators.
pub fn spectator_room(match_id: impl std::fmt::Display) -> String {
    format!("match:{match_id}:spectators")
}

/// Canonical room label for a ghost race.
pub fn ghost_race_room(race_id: impl std::fmt::Display) -> String {
    format!("ghost_race:{race_id}")
}

/// Per-process multicast fabric. One instance is shared across every
/// connection handler via `web::Data`.
#[derive(Default)]
pub struct RoomFabric {
    /// room label -> member connections
    rooms: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    /// connection -> outgoing channel, registered at connect time
    outbox: RwLock<HashMap<ConnectionId, UnboundedSender<String>>>,
}

impl RoomFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's outgoing channel. Returns the receiver the
    /// transport layer drains into the WebSocket.
    pub async fn register(&self, connection: ConnectionId) -> UnboundedReceiver<String> {
        let (tx, rx) = unbounded_channel();
        self.outbox.write().await.insert(connection, tx);
        rx
    }

    /// Drops a connection's outbox and removes it from every room it had
    /// joined. Call on disconnect (independent of the session grace
    /// window, which governs downstream matchmaking/race cleanup, not
    /// room membership).
    pub async fn unregister(&self, connection: ConnectionId) {
        self.outbox.write().await.remove(&connection);
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
    }

    pub async fn join(&self, connection: ConnectionId, room: &str) {
        self.rooms
            .write()
            .await
            .entry(room.to_string())
            .or_default()
            .insert(connection);
    }

    pub async fn leave(&self, connection: ConnectionId, room: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&connection);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Sends `event` directly to one connection, bypassing room membership.
    /// Used for payloads only the activating player may see (e.g. a
    /// `code_peek`'s `opponentCode`).
    pub async fn send_to(&self, connection: ConnectionId, event: &ServerEvent) {
        self.deliver(connection, event).await;
    }

    /// Broadcasts `event` to every member of `room`. Delivery is
    /// best-effort per connection: a full outbox or a connection that just
    /// dropped does not prevent delivery to the rest of the room.
    pub async fn broadcast(&self, room: &str, event: &ServerEvent) {
        let members: Vec<ConnectionId> = self
            .rooms
            .read()
            .await
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        for connection in members {
            self.deliver(connection, event).await;
        }
    }

    /// Broadcasts to every member of `room` except `excluded` (e.g. the
    /// opponent-facing echo of a player's own action).
    pub async fn broadcast_except(&self, room: &str, excluded: ConnectionId, event: &ServerEvent) {
        let members: Vec<ConnectionId> = self
            .rooms
            .read()
            .await
            .get(room)
            .map(|m| m.iter().copied().filter(|c| *c != excluded).collect())
            .unwrap_or_default();
        for connection in members {
            self.deliver(connection, event).await;
        }
    }

    async fn deliver(&self, connection: ConnectionId, event: &ServerEvent) {
        let Ok(json) = serde_json::to_string(event) else {
            log::error!("failed to serialize server event");
            return;
        };
        if let Some(tx) = self.outbox.read().await.get(&connection) {
            if tx.send(json).is_err() {
                log::debug!("dropping delivery to closed connection {}", connection);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_core::PlayerId;
    use duel_dto::ServerEvent;

    #[tokio::test]
    async fn broadcast_reaches_every_member_in_order() {
        let fabric = RoomFabric::new();
        let c1 = ConnectionId::now_v7();
        let c2 = ConnectionId::now_v7();
        let mut rx1 = fabric.register(c1).await;
        let mut rx2 = fabric.register(c2).await;
        fabric.join(c1, "match:1").await;
        fabric.join(c2, "match:1").await;

        fabric
            .broadcast("match:1", &ServerEvent::OpponentJoined)
            .await;
        fabric
            .broadcast("match:1", &ServerEvent::OpponentSubmitted)
            .await;

        let first = rx1.recv().await.unwrap();
        let second = rx1.recv().await.unwrap();
        assert!(first.contains("opponent_joined"));
        assert!(second.contains("opponent_submitted"));
        assert!(rx2.recv().await.unwrap().contains("opponent_joined"));
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_excluded_connection() {
        let fabric = RoomFabric::new();
        let c1 = ConnectionId::now_v7();
        let c2 = ConnectionId::now_v7();
        let mut rx1 = fabric.register(c1).await;
        let mut rx2 = fabric.register(c2).await;
        fabric.join(c1, "match:1").await;
        fabric.join(c2, "match:1").await;

        fabric
            .broadcast_except(
                "match:1",
                c1,
                &ServerEvent::OpponentUsedPowerup {
                    power_up_type: duel_dto::PowerUpType::CodePeek,
                },
            )
            .await;

        rx2.recv().await.unwrap();
        drop(fabric);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_removes_from_all_rooms() {
        let fabric = RoomFabric::new();
        let c1 = ConnectionId::now_v7();
        fabric.register(c1).await;
        fabric.join(c1, "match:1").await;
        fabric.join(c1, "match:1:spectators").await;
        fabric.unregister(c1).await;
        fabric
            .broadcast("match:1", &ServerEvent::MatchFound {
                match_id: Default::default(),
                challenge_id: Default::default(),
                opponent_id: PlayerId::default(),
                opponent_username: "x".into(),
                opponent_rating: 1000,
            })
            .await;
        // no panic, no members left; nothing to assert beyond not hanging
    }
}
