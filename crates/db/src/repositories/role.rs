//! Role repository.

use std::sync::Arc;

use crate::entities::{Role, UserRole, role, role::RoleKind, user_role};
use carpool_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// Role repository for database operations.
#[derive(Clone)]
pub struct RoleRepository {
    db: Arc<DatabaseConnection>,
}

impl RoleRepository {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All stored roles.
    pub async fn find_all(&self) -> AppResult<Vec<role::Model>> {
        Role::find()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a role row.
    pub async fn create(&self, id: &str, name: RoleKind) -> AppResult<role::Model> {
        role::ActiveModel {
            id: Set(id.to_string()),
            name: Set(name),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Role IDs held by a user.
    pub async fn role_ids_of_user(&self, user_id: &str) -> AppResult<Vec<String>> {
        let links = UserRole::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(links.into_iter().map(|l| l.role_id).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_role_ids_of_user() {
        let links = vec![
            user_role::Model {
                user_id: "u1".to_string(),
                role_id: "r-guardian".to_string(),
            },
            user_role::Model {
                user_id: "u1".to_string(),
                role_id: "r-admin".to_string(),
            },
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([links])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let ids = repo.role_ids_of_user("u1").await.unwrap();

        assert_eq!(ids, vec!["r-guardian".to_string(), "r-admin".to_string()]);
    }

    #[tokio::test]
    async fn test_create_role() {
        let row = role::Model {
            id: "r1".to_string(),
            name: RoleKind::Leader,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let created = repo.create("r1", RoleKind::Leader).await.unwrap();

        assert_eq!(created.name, RoleKind::Leader);
    }
}
