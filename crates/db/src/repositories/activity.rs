//! Activity repository. Activities are written by the calendar importer;
//! this crate only reads them.

use std::sync::Arc;

use crate::entities::{Activity, activity};
use carpool_common::{AppError, AppResult};
use chrono::{DateTime, FixedOffset};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

/// Activity repository for database operations.
#[derive(Clone)]
pub struct ActivityRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityRepository {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an activity by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<activity::Model>> {
        Activity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an activity by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<activity::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {id}")))
    }

    /// Look an activity up by its informal natural key.
    pub async fn find_by_name_and_start(
        &self,
        name: &str,
        start_date: DateTime<FixedOffset>,
    ) -> AppResult<Option<activity::Model>> {
        Activity::find()
            .filter(activity::Column::Name.eq(name))
            .filter(activity::Column::StartDate.eq(start_date))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Visible activities, soonest first.
    pub async fn find_visible(&self) -> AppResult<Vec<activity::Model>> {
        Activity::find()
            .filter(activity::Column::IsVisible.eq(true))
            .order_by_asc(activity::Column::StartDate)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
