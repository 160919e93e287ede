//! User repository.

use std::{collections::HashSet, sync::Arc};

use crate::entities::{
    Car, Carpool, Child, Notification, ParentChildLink, Passenger, User, UserRole, car, carpool,
    child, notification, parent_child_link, passenger, user, user_role,
};
use crate::repositories::carpool::{delete_aggregates, release_seats};
use carpool_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionTrait,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id}")))
    }

    /// Find users by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<user::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        User::find()
            .filter(user::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by access token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a user and everything they own, in one transaction.
    ///
    /// Order: carpools they drive (with passengers, notifications and
    /// messages), their own seats and the seats of children that are about
    /// to become orphans (seats are given back), their notifications, cars,
    /// parent links, orphaned children, role links, then the user row.
    pub async fn delete_with_dependents(&self, user_id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        delete_user_on(&txn, user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn delete_user_on<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<(), DbErr> {
    let driven: Vec<String> = Carpool::find()
        .filter(carpool::Column::DriverId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    delete_aggregates(db, &driven).await?;

    let links = ParentChildLink::find()
        .filter(parent_child_link::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    let child_ids: Vec<String> = links.into_iter().map(|l| l.child_id).collect();

    // Children whose only guardian is this user
    let mut orphans = Vec::new();
    if !child_ids.is_empty() {
        let other_guardians: HashSet<String> = ParentChildLink::find()
            .filter(parent_child_link::Column::ChildId.is_in(child_ids.clone()))
            .filter(parent_child_link::Column::UserId.ne(user_id))
            .all(db)
            .await?
            .into_iter()
            .map(|l| l.child_id)
            .collect();
        orphans = child_ids
            .into_iter()
            .filter(|id| !other_guardians.contains(id))
            .collect();
    }

    let mut seats = Passenger::find()
        .filter(passenger::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    if !orphans.is_empty() {
        seats.extend(
            Passenger::find()
                .filter(passenger::Column::ChildId.is_in(orphans.clone()))
                .all(db)
                .await?,
        );
    }
    release_seats(db, &seats).await?;

    Notification::delete_many()
        .filter(notification::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    Car::delete_many()
        .filter(car::Column::OwnerId.eq(user_id))
        .exec(db)
        .await?;

    ParentChildLink::delete_many()
        .filter(parent_child_link::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if !orphans.is_empty() {
        Child::delete_many()
            .filter(child::Column::Id.is_in(orphans))
            .exec(db)
            .await?;
    }

    UserRole::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    User::delete_by_id(user_id).exec(db).await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_user(id: &str, token: Option<&str>) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone: Some("070-1234567".to_string()),
            address: None,
            postcode: None,
            city: None,
            token: token.map(str::to_string),
            is_accepted: true,
            notification_preferences: None,
            last_logged_in: None,
            created_at: Utc::now().into(),
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn test_find_by_token() {
        let user = create_test_user("u1", Some("secret"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let found = repo.find_by_token("secret").await.unwrap();

        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = UserRepository::new(db);
        let result = repo.find_by_ids(&[]).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_delete_user_without_dependents() {
        // No carpools, no children, no seats
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<carpool::Model>::new()])
                .append_query_results([Vec::<parent_child_link::Model>::new()])
                .append_query_results([Vec::<passenger::Model>::new()])
                .append_exec_results([exec(0), exec(0), exec(0), exec(0), exec(1)])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        repo.delete_with_dependents("u1").await.unwrap();
    }
}
