//! Passenger entity.
//!
//! A seat is held either by a child (on behalf of their guardians) or by a
//! user riding directly. The database enforces that exactly one of
//! `child_id` and `user_id` is set.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whoever occupies a seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Occupant {
    Child(String),
    DirectUser(String),
}

impl Occupant {
    /// Split into the two nullable columns.
    #[must_use]
    pub fn columns(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::Child(id) => (Some(id.clone()), None),
            Self::DirectUser(id) => (None, Some(id.clone())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "passenger")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub carpool_id: String,

    #[sea_orm(nullable, indexed)]
    pub child_id: Option<String>,

    #[sea_orm(nullable, indexed)]
    pub user_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// The occupant of this seat.
    ///
    /// Returns `None` only for rows that violate the XOR constraint.
    #[must_use]
    pub fn occupant(&self) -> Option<Occupant> {
        match (&self.child_id, &self.user_id) {
            (Some(child), None) => Some(Occupant::Child(child.clone())),
            (None, Some(user)) => Some(Occupant::DirectUser(user.clone())),
            _ => None,
        }
    }
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
        belongs_to = "super::child::Entity",
        from = "Column::ChildId",
        to = "super::child::Column::Id",
        on_delete = "Cascade"
    )]
    Child,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::carpool::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carpool.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(child_id: Option<&str>, user_id: Option<&str>) -> Model {
        Model {
            id: "p1".to_string(),
            carpool_id: "c1".to_string(),
            child_id: child_id.map(str::to_string),
            user_id: user_id.map(str::to_string),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_occupant_from_row() {
        assert_eq!(
            row(Some("k1"), None).occupant(),
            Some(Occupant::Child("k1".to_string()))
        );
        assert_eq!(
            row(None, Some("u1")).occupant(),
            Some(Occupant::DirectUser("u1".to_string()))
        );
        assert_eq!(row(None, None).occupant(), None);
        assert_eq!(row(Some("k1"), Some("u1")).occupant(), None);
    }

    #[test]
    fn test_occupant_columns() {
        let (child, user) = Occupant::DirectUser("u1".to_string()).columns();
        assert!(child.is_none());
        assert_eq!(user.as_deref(), Some("u1"));
    }
}
