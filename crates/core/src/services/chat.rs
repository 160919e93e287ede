//! Carpool chat service.

use crate::services::notification::{FanOutEvent, NotificationService};
use crate::services::presence::{PresenceService, RoomTransition};
use crate::services::realtime::{RealtimeService, carpool_room, events};
use carpool_common::{AppError, AppResult, IdGenerator};
use carpool_db::{
    entities::carpool_message,
    repositories::{CarpoolMessageRepository, CarpoolRepository},
};
use chrono::Utc;
use sea_orm::Set;
use serde_json::json;

/// Chat service.
#[derive(Clone)]
pub struct ChatService {
    carpool_repo: CarpoolRepository,
    message_repo: CarpoolMessageRepository,
    presence: PresenceService,
    realtime: Option<RealtimeService>,
    notifications: Option<NotificationService>,
    id_gen: IdGenerator,
}

impl ChatService {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(
        carpool_repo: CarpoolRepository,
        message_repo: CarpoolMessageRepository,
        presence: PresenceService,
    ) -> Self {
        Self {
            carpool_repo,
            message_repo,
            presence,
            realtime: None,
            notifications: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the realtime transport.
    pub fn set_realtime(&mut self, realtime: RealtimeService) {
        self.realtime = Some(realtime);
    }

    /// Set the notification service used for fan-out.
    pub fn set_notifications(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    /// A user opened the carpool chat.
    pub async fn join(&self, carpool_id: &str, user_id: &str) -> RoomTransition {
        let transition = self.presence.join(carpool_id, user_id).await;
        if transition.changed() {
            tracing::debug!(carpool_id = %carpool_id, "Chat room became active");
        }
        transition
    }

    /// A user closed the carpool chat.
    pub async fn leave(&self, carpool_id: &str, user_id: &str) -> RoomTransition {
        let transition = self.presence.leave(carpool_id, user_id).await;
        if transition.changed() {
            tracing::debug!(carpool_id = %carpool_id, "Chat room became empty");
        }
        transition
    }

    /// Append a message, broadcast it to the room and fan it out.
    pub async fn send_message(
        &self,
        carpool_id: &str,
        sender_id: &str,
        content: &str,
    ) -> AppResult<carpool_message::Model> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::EmptyContent);
        }

        self.carpool_repo.get_by_id(carpool_id).await?;

        let model = carpool_message::ActiveModel {
            id: Set(self.id_gen.generate()),
            carpool_id: Set(carpool_id.to_string()),
            sender_id: Set(Some(sender_id.to_string())),
            content: Set(content.to_string()),
            created_at: Set(Utc::now().into()),
            status: Set(carpool_message::STATUS_SENT.to_string()),
        };
        let message = self.message_repo.create(model).await?;

        tracing::debug!(
            carpool_id = %carpool_id,
            sender_id = %sender_id,
            message_id = %message.id,
            "Chat message stored"
        );

        if let Some(ref realtime) = self.realtime {
            let payload = json!({
                "carpool_id": carpool_id,
                "message": {
                    "id": message.id,
                    "sender_id": message.sender_id,
                    "content": message.content,
                    "timestamp": message.created_at,
                },
            });
            if let Err(e) = realtime
                .emit(&carpool_room(carpool_id), events::NEW_MESSAGE, payload)
                .await
            {
                tracing::warn!(error = %e, "Failed to publish new_message");
            }
        }

        if let Some(ref notifications) = self.notifications {
            let notifications = notifications.clone();
            let carpool_id = carpool_id.to_string();
            let sender_id = sender_id.to_string();
            let event = FanOutEvent::ChatMessage(message.clone());
            tokio::spawn(async move {
                match notifications.fan_out(&carpool_id, &sender_id, &event).await {
                    Ok(report) => tracing::debug!(
                        carpool_id = %carpool_id,
                        notified = report.notified.len(),
                        emailed = report.emailed,
                        failed = report.failed,
                        "Chat fan-out finished"
                    ),
                    Err(e) => {
                        tracing::warn!(error = %e, carpool_id = %carpool_id, "Chat fan-out failed");
                    }
                }
            });
        }

        Ok(message)
    }

    /// Messages of a carpool in append order.
    pub async fn history(&self, carpool_id: &str) -> AppResult<Vec<carpool_message::Model>> {
        self.carpool_repo.get_by_id(carpool_id).await?;
        self.message_repo.find_by_carpool(carpool_id).await
    }
}
