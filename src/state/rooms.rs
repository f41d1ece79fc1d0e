//! Per-event broadcast groups.

use std::fmt::Debug;

use axum::extract::ws::{Message, Utf8Bytes};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier assigned to each accepted WebSocket connection.
pub type ConnectionId = Uuid;

/// Live connections grouped by the event they joined.
///
/// Members keep their join order, so every member sees the messages of one
/// publish call in the same sequence.
#[derive(Default)]
pub struct Rooms {
    rooms: DashMap<Uuid, IndexMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
}

impl Rooms {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the room of `event_id`, replacing a previous sender
    /// registered under the same connection id.
    pub fn join(
        &self,
        event_id: Uuid,
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<Message>,
    ) {
        self.rooms
            .entry(event_id)
            .or_default()
            .insert(connection_id, tx);
    }

    /// Remove a connection from one room, dropping the room once empty.
    pub fn leave(&self, event_id: Uuid, connection_id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(&event_id) {
            members.shift_remove(&connection_id);
        }
        self.rooms.remove_if(&event_id, |_, members| members.is_empty());
    }

    /// Number of connections currently in the room of `event_id`.
    pub fn member_count(&self, event_id: Uuid) -> usize {
        self.rooms
            .get(&event_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Serialize `value` once and deliver it to every member of the room.
    ///
    /// Members whose writer is gone are pruned. Returns how many members the
    /// message was queued for.
    pub fn publish<T>(&self, event_id: Uuid, value: &T) -> usize
    where
        T: ?Sized + Serialize + Debug,
    {
        let payload: Utf8Bytes = match serde_json::to_string(value) {
            Ok(payload) => payload.into(),
            Err(err) => {
                warn!(error = %err, "failed to serialize room message `{value:?}`");
                return 0;
            }
        };

        let delivered = match self.rooms.get_mut(&event_id) {
            Some(mut members) => {
                let before = members.len();
                members.retain(|_, tx| tx.send(Message::Text(payload.clone())).is_ok());
                let pruned = before - members.len();
                if pruned > 0 {
                    debug!(event_id = %event_id, pruned, "pruned closed room members");
                }
                members.len()
            }
            None => 0,
        };

        if delivered == 0 {
            self.rooms.remove_if(&event_id, |_, members| members.is_empty());
        }
        delivered
    }
}
