//! Carpool chat message repository.

use std::sync::Arc;

use crate::entities::{CarpoolMessage, carpool_message};
use carpool_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Chat message repository for database operations.
#[derive(Clone)]
pub struct CarpoolMessageRepository {
    db: Arc<DatabaseConnection>,
}

impl CarpoolMessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a message.
    pub async fn create(
        &self,
        model: carpool_message::ActiveModel,
    ) -> AppResult<carpool_message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages of a carpool in append order.
    pub async fn find_by_carpool(
        &self,
        carpool_id: &str,
    ) -> AppResult<Vec<carpool_message::Model>> {
        CarpoolMessage::find()
            .filter(carpool_message::Column::CarpoolId.eq(carpool_id))
            .order_by_asc(carpool_message::Column::CreatedAt)
            .order_by_asc(carpool_message::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
