//! Activity entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    #[sea_orm(indexed)]
    pub start_date: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub end_date: Option<DateTimeWithTimeZone>,

    /// Scout grade this activity is for
    #[sea_orm(nullable)]
    pub role_id: Option<String>,

    pub address: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Soft-delete flag
    #[sea_orm(default_value = true)]
    pub is_visible: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::role::Entity",
        from = "Column::RoleId",
        to = "super::role::Column::Id",
        on_delete = "SetNull"
    )]
    Role,

    #[sea_orm(has_many = "super::carpool::Entity")]
    Carpools,
}

impl Related<super::carpool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carpools.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
