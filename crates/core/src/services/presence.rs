//! Presence tracking for carpool chat rooms.
//!
//! Presence is best-effort: it only decides whether a personal live push is
//! redundant because the user is already looking at the chat. Persisted
//! notifications never depend on it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Whether anyone is in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Empty,
    Active,
}

/// Room state before and after a join or leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomTransition {
    pub from: RoomState,
    pub to: RoomState,
}

impl RoomTransition {
    /// Whether the room changed between empty and active.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Tracks which users are viewing which carpool chat.
#[async_trait]
pub trait PresenceTracker: Send + Sync {
    /// Record that a user entered a carpool room.
    async fn join(&self, carpool_id: &str, user_id: &str) -> RoomTransition;

    /// Record that a user left a carpool room.
    async fn leave(&self, carpool_id: &str, user_id: &str) -> RoomTransition;

    /// Whether the user currently views the carpool room.
    async fn is_present(&self, carpool_id: &str, user_id: &str) -> bool;
}

/// Process-local presence. Lost on restart.
///
/// Counts connections per user so a second browser tab leaving does not
/// hide a user who still has the chat open elsewhere.
#[derive(Clone, Default)]
pub struct InMemoryPresenceTracker {
    rooms: Arc<RwLock<HashMap<String, HashMap<String, usize>>>>,
}

impl InMemoryPresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

const fn state_of(occupied: bool) -> RoomState {
    if occupied {
        RoomState::Active
    } else {
        RoomState::Empty
    }
}

#[async_trait]
impl PresenceTracker for InMemoryPresenceTracker {
    async fn join(&self, carpool_id: &str, user_id: &str) -> RoomTransition {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(carpool_id.to_string()).or_default();
        let from = state_of(!room.is_empty());
        *room.entry(user_id.to_string()).or_insert(0) += 1;

        RoomTransition {
            from,
            to: RoomState::Active,
        }
    }

    async fn leave(&self, carpool_id: &str, user_id: &str) -> RoomTransition {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(carpool_id) else {
            return RoomTransition {
                from: RoomState::Empty,
                to: RoomState::Empty,
            };
        };

        if let Some(count) = room.get_mut(user_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                room.remove(user_id);
            }
        }

        if room.is_empty() {
            rooms.remove(carpool_id);
            return RoomTransition {
                from: RoomState::Active,
                to: RoomState::Empty,
            };
        }

        RoomTransition {
            from: RoomState::Active,
            to: RoomState::Active,
        }
    }

    async fn is_present(&self, carpool_id: &str, user_id: &str) -> bool {
        self.rooms
            .read()
            .await
            .get(carpool_id)
            .is_some_and(|room| room.contains_key(user_id))
    }
}

/// Shared handle to a presence tracker.
pub type PresenceService = Arc<dyn PresenceTracker>;
