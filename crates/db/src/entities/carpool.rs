//! Carpool entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which leg of the trip the carpool covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum CarpoolType {
    #[sea_orm(string_value = "drop-off")]
    #[serde(rename = "drop-off")]
    DropOff,
    #[sea_orm(string_value = "pick-up")]
    #[serde(rename = "pick-up")]
    PickUp,
    #[sea_orm(string_value = "both")]
    #[serde(rename = "both")]
    Both,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carpool")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub activity_id: String,

    /// Set to NULL when the driver is removed
    #[sea_orm(nullable, indexed)]
    pub driver_id: Option<String>,

    #[sea_orm(nullable)]
    pub car_id: Option<String>,

    /// Seats offered when the carpool was created
    pub capacity: i32,

    /// Seats left. Never negative (check constraint)
    pub available_seats: i32,

    pub carpool_type: CarpoolType,

    pub departure_address: String,

    pub departure_postcode: String,

    pub departure_city: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether another passenger fits.
    #[must_use]
    pub const fn has_free_seat(&self) -> bool {
        self.available_seats > 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id",
        on_delete = "Cascade"
    )]
    Activity,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Driver,

    #[sea_orm(
        belongs_to = "super::car::Entity",
        from = "Column::CarId",
        to = "super::car::Column::Id",
        on_delete = "SetNull"
    )]
    Car,

    #[sea_orm(has_many = "super::passenger::Entity")]
    Passengers,

    #[sea_orm(has_many = "super::carpool_message::Entity")]
    Messages,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Car.def()
    }
}

impl Related<super::passenger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Passengers.def()
    }
}

impl Related<super::carpool_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
