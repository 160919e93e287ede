//! Car entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "car")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owner. Set to NULL when the owner is removed
    #[sea_orm(nullable, indexed)]
    pub owner_id: Option<String>,

    #[sea_orm(unique)]
    pub reg_number: String,

    #[sea_orm(nullable)]
    pub fuel_type: Option<String>,

    #[sea_orm(nullable)]
    pub model_name: Option<String>,

    /// Litres or kWh per 100 km
    #[sea_orm(nullable)]
    pub consumption: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Owner,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
