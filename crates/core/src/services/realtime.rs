//! Realtime transport abstraction.
//!
//! Core services emit room events through this trait. The WebSocket hub in
//! the API crate implements it; tests and headless tools use the no-op.

use async_trait::async_trait;
use carpool_common::AppResult;
use serde_json::Value;
use std::sync::Arc;

/// Server to client event names.
pub mod events {
    pub const JOIN_SUCCESS: &str = "join_success";
    pub const LEAVE_SUCCESS: &str = "leave_success";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const NOTIFICATION: &str = "notification";
    pub const NOTIFICATIONS_UPDATED: &str = "notifications_updated";
    pub const PASSENGERS_UPDATED: &str = "passengers_updated";
    pub const ERROR: &str = "error";
}

/// Room every viewer of a carpool's chat joins.
#[must_use]
pub fn carpool_room(carpool_id: &str) -> String {
    format!("carpool_{carpool_id}")
}

/// Personal room of a user.
#[must_use]
pub fn user_room(user_id: &str) -> String {
    format!("user_{user_id}")
}

/// Trait for emitting events to realtime rooms.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Emit an event to every connection in a room.
    ///
    /// Delivery is fire-and-forget. An error means the event could not be
    /// queued at all, never that a client missed it.
    async fn emit(&self, room: &str, event: &str, payload: Value) -> AppResult<()>;
}

/// A no-op transport for tests or when realtime delivery is disabled.
#[derive(Clone, Default)]
pub struct NoOpRealtime;

#[async_trait]
impl RealtimeTransport for NoOpRealtime {
    async fn emit(&self, _room: &str, _event: &str, _payload: Value) -> AppResult<()> {
        Ok(())
    }
}

/// Shared handle to a realtime transport.
pub type RealtimeService = Arc<dyn RealtimeTransport>;
