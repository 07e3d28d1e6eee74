//! Room membership registry.
//!
//! Rooms exist only as entries in this map; there is no separate lifecycle.
//! A room nobody has joined behaves exactly like an empty one, and the last
//! eviction from a room drops its entry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::connection::Connection;

pub(crate) struct RoomRegistry {
    rooms: RwLock<HashMap<String, HashMap<String, Arc<dyn Connection>>>>,
}

impl RoomRegistry {
    pub(crate) fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room. A connection belongs to at most one room:
    /// registering again is a no-op for the same room and a move for a
    /// different one.
    pub(crate) async fn register(&self, conn: Arc<dyn Connection>, room: &str) {
        let mut rooms = self.rooms.write().await;
        for members in rooms.values_mut() {
            members.remove(conn.id());
        }
        rooms.retain(|_, members| !members.is_empty());
        rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn.id().to_string(), conn);
    }

    /// Snapshot of a room's members. Unknown rooms are empty.
    pub(crate) async fn members(&self, room: &str) -> Vec<Arc<dyn Connection>> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a connection from a room after a failed delivery.
    pub(crate) async fn evict(&self, room: &str, id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            if members.remove(id).is_some() {
                debug!(room = %room, connection = %id, "connection evicted");
            }
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }
}
