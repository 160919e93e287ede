//! Car repository.

use std::sync::Arc;

use crate::entities::{Car, car};
use carpool_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Car repository for database operations.
#[derive(Clone)]
pub struct CarRepository {
    db: Arc<DatabaseConnection>,
}

impl CarRepository {
    /// Create a new car repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a car by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<car::Model>> {
        Car::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find cars by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<car::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Car::find()
            .filter(car::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
