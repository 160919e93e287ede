//! Carpool chat message entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status stored on every appended message.
pub const STATUS_SENT: &str = "sent";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carpool_message")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub carpool_id: String,

    /// Sender user ID. Set to NULL when the sender is removed
    #[sea_orm(nullable)]
    pub sender_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub created_at: DateTimeWithTimeZone,

    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::carpool::Entity",
        from = "Column::CarpoolId",
        to = "super::carpool::Column::Id",
        on_delete = "Cascade"
    )]
    Carpool,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Sender,
}

impl Related<super::carpool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carpool.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sender.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
