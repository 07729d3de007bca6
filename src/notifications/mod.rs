//! In-process realtime fan-out.
//!
//! Each room (`user-<id>` or `admin`) owns a `broadcast` channel. Rooms are
//! created lazily on first publish or subscribe and pruned once nobody
//! listens. WebSocket sessions subscribe to their rooms and forward every
//! message as JSON.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

pub const ADMIN_ROOM: &str = "admin";

/// Room name for a single user's private feed.
pub fn user_room(user_id: i32) -> String {
    format!("user-{}", user_id)
}

/// Message pushed to realtime subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    /// Event name, e.g. `notification`
    pub event: String,
    pub data: serde_json::Value,
}

impl RealtimeMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Clone)]
pub struct RealtimeHub {
    rooms: Arc<DashMap<String, broadcast::Sender<RealtimeMessage>>>,
    capacity: usize,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publishes to a room and returns how many subscribers received it.
    ///
    /// Publishing to an empty room is not an error.
    pub fn publish(&self, room: &str, message: RealtimeMessage) -> usize {
        let Some(tx) = self.rooms.get(room).map(|entry| entry.clone()) else {
            debug!(room, "no subscribers for realtime message");
            return 0;
        };
        tx.send(message).unwrap_or(0)
    }

    /// Joins a room, creating it if needed. The receiver is created under
    /// the entry guard.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<RealtimeMessage> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms
            .get(room)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drops rooms that no longer have receivers.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        self.rooms.retain(|_, tx| {
            let keep = tx.receiver_count() > 0;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_reaches_room_subscribers_only() {
        let hub = RealtimeHub::new(8);
        let mut alice = hub.subscribe(&user_room(1));
        let mut admin = hub.subscribe(ADMIN_ROOM);

        let delivered = hub.publish(&user_room(1), RealtimeMessage::new("ping", json!({"n": 1})));
        assert_eq!(delivered, 1);

        let received = alice.recv().await.unwrap();
        assert_eq!(received.event, "ping");
        assert!(admin.try_recv().is_err());
    }

    #[test]
    fn publish_without_listeners_returns_zero() {
        let hub = RealtimeHub::default();
        assert_eq!(hub.publish("user-99", RealtimeMessage::new("x", json!(null))), 0);

        let rx = hub.subscribe("user-99");
        drop(rx);
        assert_eq!(hub.publish("user-99", RealtimeMessage::new("x", json!(null))), 0);
    }

    #[test]
    fn prune_removes_abandoned_rooms() {
        let hub = RealtimeHub::default();
        let keep = hub.subscribe(ADMIN_ROOM);
        drop(hub.subscribe(&user_room(7)));
        assert_eq!(hub.room_count(), 2);

        assert_eq!(hub.prune(), 1);
        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.subscriber_count(ADMIN_ROOM), 1);
        drop(keep);
    }

    #[test]
    fn rejoining_after_prune_receives_messages() {
        let hub = RealtimeHub::default();
        drop(hub.subscribe(&user_room(7)));
        let mut rx = hub.subscribe(&user_room(7));
        assert_eq!(hub.prune(), 0, "room with a live receiver survives");

        let delivered = hub.publish(&user_room(7), RealtimeMessage::new("notification", json!({"id": 1})));
        assert_eq!(delivered, 1);
        assert_eq!(rx.try_recv().unwrap().event, "notification");
        assert_eq!(hub.prune(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_prune_keep_rooms_reachable() {
        let hub = RealtimeHub::new(8);
        let mut handles = Vec::new();
        for n in 0..64 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                let room = user_room(n % 4);
                let rx = hub.subscribe(&room);
                hub.prune();
                (room, rx)
            }));
        }

        let mut receivers = Vec::new();
        for handle in handles {
            receivers.push(handle.await.unwrap());
        }
        for n in 0..4 {
            let expected = receivers.iter().filter(|(room, _)| *room == user_room(n)).count();
            let delivered = hub.publish(&user_room(n), RealtimeMessage::new("ping", json!(null)));
            assert_eq!(delivered, expected);
        }
        for (_, rx) in receivers.iter_mut() {
            assert_eq!(rx.try_recv().unwrap().event, "ping");
        }
    }
}
