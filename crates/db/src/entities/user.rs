//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-user notification opt-ins, stored as JSON on the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Email the driver when passengers join or leave their carpool.
    #[serde(default)]
    pub passenger_notifications: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    #[sea_orm(nullable)]
    pub phone: Option<String>,

    #[sea_orm(nullable)]
    pub address: Option<String>,

    #[sea_orm(nullable)]
    pub postcode: Option<String>,

    #[sea_orm(nullable)]
    pub city: Option<String>,

    /// Opaque access token, issued by the account service
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Accounts must be accepted by an admin before protected use
    #[sea_orm(default_value = false)]
    pub is_accepted: bool,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub notification_preferences: Option<Json>,

    #[sea_orm(nullable)]
    pub last_logged_in: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Full display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Parsed notification preferences. Missing or malformed JSON means all off.
    #[must_use]
    pub fn preferences(&self) -> NotificationPreferences {
        self.notification_preferences
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::car::Entity")]
    Cars,

    #[sea_orm(has_many = "super::user_role::Entity")]
    Roles,

    #[sea_orm(has_many = "super::parent_child_link::Entity")]
    ChildLinks,
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cars.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
