//! Role entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The fixed set of roles. Scout grades are ordered youngest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    #[sea_orm(string_value = "guardian")]
    Guardian,
    #[sea_orm(string_value = "leader")]
    Leader,
    #[sea_orm(string_value = "kutar")]
    Kutar,
    #[sea_orm(string_value = "tumlare")]
    Tumlare,
    #[sea_orm(string_value = "upptackare")]
    Upptackare,
    #[sea_orm(string_value = "aventyrare")]
    Aventyrare,
    #[sea_orm(string_value = "utmanare")]
    Utmanare,
    #[sea_orm(string_value = "rover")]
    Rover,
    #[sea_orm(string_value = "adult_scout")]
    AdultScout,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl RoleKind {
    /// Every role, in seeding order.
    pub const ALL: [Self; 10] = [
        Self::Guardian,
        Self::Leader,
        Self::Kutar,
        Self::Tumlare,
        Self::Upptackare,
        Self::Aventyrare,
        Self::Utmanare,
        Self::Rover,
        Self::AdultScout,
        Self::Admin,
    ];

    /// Whether this role is a scout grade an activity can target.
    #[must_use]
    pub const fn is_scout_grade(self) -> bool {
        matches!(
            self,
            Self::Kutar
                | Self::Tumlare
                | Self::Upptackare
                | Self::Aventyrare
                | Self::Utmanare
                | Self::Rover
        )
    }

    /// Map a scout level label from the calendar feed to a role.
    ///
    /// Accepts the Swedish spellings with or without diacritics.
    #[must_use]
    pub fn from_scout_level(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "kutar" => Some(Self::Kutar),
            "tumlare" => Some(Self::Tumlare),
            "upptäckare" | "upptackare" => Some(Self::Upptackare),
            "äventyrare" | "aventyrare" => Some(Self::Aventyrare),
            "utmanare" => Some(Self::Utmanare),
            "rover" => Some(Self::Rover),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub name: RoleKind,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_role::Entity")]
    UserRoles,
}

impl ActiveModelBehavior for ActiveModel {}
