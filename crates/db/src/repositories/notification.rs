//! Notification repository.

use std::sync::Arc;

use crate::entities::{Notification, notification, notification::NotificationKind};
use carpool_common::{AppError, AppResult};
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

/// Rows of one type for (user, carpool). The type is not stored; chat rows
/// are the ones that carry a message ID.
fn scope(user_id: &str, carpool_id: &str, kind: NotificationKind) -> Condition {
    let by_kind = match kind {
        NotificationKind::Chat => notification::Column::MessageId.is_not_null(),
        NotificationKind::Passenger => notification::Column::MessageId.is_null(),
    };

    Condition::all()
        .add(notification::Column::UserId.eq(user_id))
        .add(notification::Column::CarpoolId.eq(carpool_id))
        .add(by_kind)
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new notification.
    pub async fn create(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Notifications for a user, newest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count unread chat notifications for (user, carpool), optionally only
    /// those created after `since`.
    pub async fn count_unread_chat(
        &self,
        user_id: &str,
        carpool_id: &str,
        since: Option<DateTime<FixedOffset>>,
    ) -> AppResult<u64> {
        let mut query = Notification::find()
            .filter(scope(user_id, carpool_id, NotificationKind::Chat))
            .filter(notification::Column::IsRead.eq(false));

        if let Some(since) = since {
            query = query.filter(notification::Column::CreatedAt.gt(since));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark every unread notification of one type for (user, carpool) read.
    pub async fn mark_read(
        &self,
        user_id: &str,
        carpool_id: &str,
        kind: NotificationKind,
    ) -> AppResult<u64> {
        let result = Notification::update_many()
            .col_expr(notification::Column::IsRead, true.into())
            .filter(scope(user_id, carpool_id, kind))
            .filter(notification::Column::IsRead.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete every read notification of one type for (user, carpool).
    pub async fn delete_read(
        &self,
        user_id: &str,
        carpool_id: &str,
        kind: NotificationKind,
    ) -> AppResult<u64> {
        let result = Notification::delete_many()
            .filter(scope(user_id, carpool_id, kind))
            .filter(notification::Column::IsRead.eq(true))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
