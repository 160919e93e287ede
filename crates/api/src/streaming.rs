//! WebSocket streaming API.
//!
//! One broadcast hub carries every room event. Each connection keeps the set
//! of rooms it joined and forwards only matching events.

#![allow(missing_docs)]

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use carpool_common::AppResult;
use carpool_core::{RealtimeTransport, carpool_room, realtime::events, user_room};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::extractors::AuthUser;
use crate::middleware::AppState;

const HUB_CAPACITY: usize = 1000;

/// An event addressed to a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub room: String,
    pub event: String,
    pub payload: Value,
}

/// Client-to-server message.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to the caller's personal room.
    JoinUser { user_id: String },
    /// Open a carpool chat.
    JoinCarpool { carpool_id: String },
    /// Close a carpool chat.
    LeaveCarpool { carpool_id: String },
    /// Post to a carpool chat.
    SendMessage { carpool_id: String, content: String },
}

/// Server-to-client message.
#[derive(Debug, Serialize)]
pub struct ServerMessage<'a> {
    pub event: &'a str,
    pub data: &'a Value,
}

/// Shared state for streaming.
#[derive(Clone)]
pub struct StreamingState {
    tx: Arc<broadcast::Sender<RoomEvent>>,
}

impl StreamingState {
    /// Create a new streaming state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to every room event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Nobody listening is not an error.
    pub fn publish(&self, room: &str, event: &str, payload: Value) {
        let receivers = self
            .tx
            .send(RoomEvent {
                room: room.to_string(),
                event: event.to_string(),
                payload,
            })
            .unwrap_or(0);
        debug!(room = %room, event = %event, receivers, "Room event published");
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimeTransport for StreamingState {
    async fn emit(&self, room: &str, event: &str, payload: Value) -> AppResult<()> {
        self.publish(room, event, payload);
        Ok(())
    }
}

/// WebSocket handler for streaming. Requires `?i=<token>`.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(user_id = %user.id, "New streaming connection");

    ws.on_upgrade(move |socket| handle_socket(socket, user.id, state))
}

/// Rooms and chats one connection has joined.
#[derive(Debug, Default)]
struct Subscriptions {
    rooms: HashSet<String>,
    carpools: HashSet<String>,
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, user_id: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut hub_rx = state.streaming.subscribe();
    let mut subs = Subscriptions::default();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let Some(msg) = msg else { break };
                let replies = match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            handle_client_message(client_msg, &mut subs, &user_id, &state).await
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to parse client message");
                            vec![error_reply("BAD_REQUEST", "Malformed message")]
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!(user_id = %user_id, "Client closed connection");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                };

                if send_all(&mut sender, &replies).await.is_err() {
                    break;
                }
            }

            hub = hub_rx.recv() => {
                match hub {
                    Ok(event) if subs.rooms.contains(&event.room) => {
                        if send_all(&mut sender, &[(event.event, event.payload)]).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "Streaming client lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    for carpool_id in &subs.carpools {
        state.chat_service.leave(carpool_id, &user_id).await;
    }

    info!(user_id = %user_id, rooms = subs.rooms.len(), "Streaming connection closed");
}

async fn send_all<S>(sender: &mut S, replies: &[(String, Value)]) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    for (event, data) in replies {
        let json = serde_json::to_string(&ServerMessage { event, data }).unwrap_or_default();
        sender.send(Message::Text(json.into())).await?;
    }
    Ok(())
}

fn error_reply(code: &str, message: &str) -> (String, Value) {
    (
        events::ERROR.to_string(),
        json!({ "code": code, "message": message }),
    )
}

/// Handle a client message. Returns the replies for this connection only.
async fn handle_client_message(
    msg: ClientMessage,
    subs: &mut Subscriptions,
    user_id: &str,
    state: &AppState,
) -> Vec<(String, Value)> {
    match msg {
        ClientMessage::JoinUser { user_id: target } => {
            if target != user_id {
                return vec![error_reply("FORBIDDEN", "Cannot join another user's room")];
            }
            let room = user_room(user_id);
            subs.rooms.insert(room.clone());
            vec![(
                events::JOIN_SUCCESS.to_string(),
                json!({ "room": room }),
            )]
        }
        ClientMessage::JoinCarpool { carpool_id } => {
            let room = carpool_room(&carpool_id);
            if subs.rooms.insert(room.clone()) {
                subs.carpools.insert(carpool_id.clone());
                state.chat_service.join(&carpool_id, user_id).await;
            }
            vec![(
                events::JOIN_SUCCESS.to_string(),
                json!({ "room": room, "carpool_id": carpool_id }),
            )]
        }
        ClientMessage::LeaveCarpool { carpool_id } => {
            let room = carpool_room(&carpool_id);
            if subs.rooms.remove(&room) {
                subs.carpools.remove(&carpool_id);
                state.chat_service.leave(&carpool_id, user_id).await;
            }
            vec![(
                events::LEAVE_SUCCESS.to_string(),
                json!({ "room": room, "carpool_id": carpool_id }),
            )]
        }
        ClientMessage::SendMessage {
            carpool_id,
            content,
        } => {
            // The broadcast reaches this connection through the hub
            match state
                .chat_service
                .send_message(&carpool_id, user_id, &content)
                .await
            {
                Ok(_) => vec![],
                Err(e) => vec![error_reply(e.error_code(), &e.to_string())],
            }
        }
    }
}
