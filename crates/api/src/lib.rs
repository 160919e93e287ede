//! HTTP API layer for carpool-rs.
//!
//! This crate provides the REST API and the realtime WebSocket:
//!
//! - **Endpoints**: carpools, passengers, chat, notifications, admin
//! - **Extractors**: Authentication
//! - **Middleware**: Token resolution
//! - **Streaming**: Room-based WebSocket hub
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

pub use endpoints::router;
pub use streaming::{RoomEvent, StreamingState, streaming_handler};
