//! Child and guardian-link repository.

use std::sync::Arc;

use crate::entities::{Child, ParentChildLink, User, child, parent_child_link, user};
use carpool_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Child repository for database operations.
#[derive(Clone)]
pub struct ChildRepository {
    db: Arc<DatabaseConnection>,
}

impl ChildRepository {
    /// Create a new child repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a child by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<child::Model>> {
        Child::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find children by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<child::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Child::find()
            .filter(child::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Guardians of a child, ordered by user ID.
    pub async fn find_guardians(&self, child_id: &str) -> AppResult<Vec<user::Model>> {
        let guardian_ids: Vec<String> = ParentChildLink::find()
            .filter(parent_child_link::Column::ChildId.eq(child_id))
            .order_by_asc(parent_child_link::Column::UserId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|l| l.user_id)
            .collect();

        if guardian_ids.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Id.is_in(guardian_ids))
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether the user is a guardian of the child.
    pub async fn is_guardian(&self, user_id: &str, child_id: &str) -> AppResult<bool> {
        let link = ParentChildLink::find()
            .filter(parent_child_link::Column::UserId.eq(user_id))
            .filter(parent_child_link::Column::ChildId.eq(child_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(link.is_some())
    }

    /// Children of a guardian, optionally limited to one scout grade.
    pub async fn find_children_of(
        &self,
        user_id: &str,
        role_id: Option<&str>,
    ) -> AppResult<Vec<child::Model>> {
        let child_ids: Vec<String> = ParentChildLink::find()
            .select_only()
            .column(parent_child_link::Column::ChildId)
            .filter(parent_child_link::Column::UserId.eq(user_id))
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if child_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut query = Child::find().filter(child::Column::Id.is_in(child_ids));
        if let Some(role_id) = role_id {
            query = query.filter(child::Column::RoleId.eq(role_id));
        }

        query
            .order_by_asc(child::Column::FirstName)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
