//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification type. Not stored; derived from `message_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// New chat message in a carpool.
    Chat,
    /// Passenger added to or removed from a carpool.
    Passenger,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Passenger => "passenger",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Recipient
    #[sea_orm(indexed)]
    pub user_id: String,

    #[sea_orm(indexed)]
    pub carpool_id: String,

    /// Chat message that caused this notification
    #[sea_orm(nullable)]
    pub message_id: Option<String>,

    /// Human-readable text
    #[sea_orm(column_type = "Text")]
    pub message: String,

    #[sea_orm(default_value = false)]
    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        if self.message_id.is_some() {
            NotificationKind::Chat
        } else {
            NotificationKind::Passenger
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::carpool::Entity",
        from = "Column::CarpoolId",
        to = "super::carpool::Column::Id",
        on_delete = "Cascade"
    )]
    Carpool,

    #[sea_orm(
        belongs_to = "super::carpool_message::Entity",
        from = "Column::MessageId",
        to = "super::carpool_message::Column::Id",
        on_delete = "Cascade"
    )]
    Message,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::carpool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carpool.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
