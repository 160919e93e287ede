//! Child entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "child")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub first_name: String,

    pub last_name: String,

    #[sea_orm(nullable)]
    pub date_of_birth: Option<Date>,

    #[sea_orm(nullable)]
    pub phone: Option<String>,

    /// Scout grade
    #[sea_orm(nullable, indexed)]
    pub role_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
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

    #[sea_orm(has_many = "super::parent_child_link::Entity")]
    ParentLinks,
}

impl Related<super::parent_child_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParentLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
