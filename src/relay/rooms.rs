//! Named rooms, each its own hub.
//!
//! A room exists while it has members. Joining creates it; the last leave
//! removes it. Both happen under the map's shard lock, so a join can never
//! land in a room that is concurrently being removed.

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;

use crate::config::SlowConsumerPolicy;
use crate::net::ConnectionId;
use crate::relay::client::ClientHandle;
use crate::relay::hub::{BroadcastReport, Hub};

/// Snapshot of a room for the admin API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: String,
    pub members: usize,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Hub>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handle` to `room_id`, creating the room if needed.
    /// Returns the member count after joining.
    pub fn join(&self, room_id: &str, handle: ClientHandle) -> usize {
        let room = self.rooms.entry(room_id.to_string()).or_default();
        let members = room.join(handle);
        if members == 1 {
            tracing::info!(room_id = %room_id, "Room opened");
        }
        members
    }

    /// Remove `id` from `room_id`. Returns the members left; an emptied room is closed.
    pub fn leave(&self, room_id: &str, id: ConnectionId) -> usize {
        let remaining = match self.rooms.get(room_id) {
            Some(room) => {
                room.leave(id);
                room.len()
            }
            None => return 0,
        };

        if remaining == 0 && self.rooms.remove_if(room_id, |_, room| room.is_empty()).is_some() {
            tracing::info!(room_id = %room_id, "Room is empty and has been closed");
        }
        remaining
    }

    /// Send `msg` to every member of `room_id`, sender included.
    pub fn broadcast(&self, room_id: &str, msg: &Message, policy: SlowConsumerPolicy) -> BroadcastReport {
        self.rooms
            .get(room_id)
            .map(|room| room.broadcast(None, msg, true, policy))
            .unwrap_or_default()
    }

    pub fn members(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|room| room.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Every open room, ordered by id.
    pub fn rooms(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<_> = self
            .rooms
            .iter()
            .map(|entry| RoomInfo {
                room_id: entry.key().clone(),
                members: entry.value().len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    /// Total members across every room.
    pub fn client_count(&self) -> usize {
        self.rooms.iter().map(|entry| entry.value().len()).sum()
    }
}
