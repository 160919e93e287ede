//! Carpool repository.
//!
//! Owns the seat counter. Every passenger insert or delete goes through this
//! module together with the matching `available_seats` update, in one
//! transaction.

use std::sync::Arc;

use crate::entities::{
    Carpool, CarpoolMessage, Notification, Passenger, carpool, carpool_message, notification,
    passenger,
    passenger::Occupant,
};
use chrono::Utc;
use carpool_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait, sea_query::Expr,
};

/// Carpool repository for database operations.
#[derive(Clone)]
pub struct CarpoolRepository {
    db: Arc<DatabaseConnection>,
}

impl CarpoolRepository {
    /// Create a new carpool repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a carpool by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<carpool::Model>> {
        Carpool::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a carpool by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<carpool::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CarpoolNotFound(id.to_string()))
    }

    /// Create a new carpool.
    pub async fn create(&self, model: carpool::ActiveModel) -> AppResult<carpool::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Carpools for an activity, oldest first.
    pub async fn find_by_activity(&self, activity_id: &str) -> AppResult<Vec<carpool::Model>> {
        Carpool::find()
            .filter(carpool::Column::ActivityId.eq(activity_id))
            .order_by_asc(carpool::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Passengers of a carpool in insertion order.
    pub async fn find_passengers(&self, carpool_id: &str) -> AppResult<Vec<passenger::Model>> {
        Passenger::find()
            .filter(passenger::Column::CarpoolId.eq(carpool_id))
            .order_by_asc(passenger::Column::CreatedAt)
            .order_by_asc(passenger::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Passengers of several carpools, grouped by the caller.
    pub async fn find_passengers_of(
        &self,
        carpool_ids: &[String],
    ) -> AppResult<Vec<passenger::Model>> {
        if carpool_ids.is_empty() {
            return Ok(vec![]);
        }

        Passenger::find()
            .filter(passenger::Column::CarpoolId.is_in(carpool_ids.to_vec()))
            .order_by_asc(passenger::Column::CreatedAt)
            .order_by_asc(passenger::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the passenger row for an occupant.
    pub async fn find_passenger(
        &self,
        carpool_id: &str,
        occupant: &Occupant,
    ) -> AppResult<Option<passenger::Model>> {
        find_passenger_on(self.db.as_ref(), carpool_id, occupant)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Seat an occupant.
    ///
    /// Checks run in order: carpool exists, occupant not already seated,
    /// a seat is free. The decrement is conditional on `available_seats > 0`
    /// so two concurrent adds can never drive the counter negative.
    pub async fn add_passenger(
        &self,
        passenger_id: &str,
        carpool_id: &str,
        occupant: &Occupant,
    ) -> AppResult<(carpool::Model, passenger::Model)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let carpool = Carpool::find_by_id(carpool_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::CarpoolNotFound(carpool_id.to_string()))?;

        if find_passenger_on(&txn, carpool_id, occupant)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .is_some()
        {
            return Err(AppError::DuplicateOccupant);
        }

        if !carpool.has_free_seat() {
            return Err(AppError::SeatsExhausted(carpool_id.to_string()));
        }

        let taken = Carpool::update_many()
            .col_expr(
                carpool::Column::AvailableSeats,
                Expr::col(carpool::Column::AvailableSeats).sub(1),
            )
            .filter(carpool::Column::Id.eq(carpool_id))
            .filter(carpool::Column::AvailableSeats.gt(0))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if taken.rows_affected == 0 {
            return Err(AppError::SeatsExhausted(carpool_id.to_string()));
        }

        let (child_id, user_id) = occupant.columns();
        let row = passenger::ActiveModel {
            id: Set(passenger_id.to_string()),
            carpool_id: Set(carpool_id.to_string()),
            child_id: Set(child_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(map_insert_err)?;

        let updated = Carpool::find_by_id(carpool_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::CarpoolNotFound(carpool_id.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((updated, row))
    }

    /// Release an occupant's seat.
    pub async fn remove_passenger(
        &self,
        carpool_id: &str,
        occupant: &Occupant,
    ) -> AppResult<carpool::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let row = find_passenger_on(&txn, carpool_id, occupant)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or(AppError::OccupantNotFound)?;

        release_seats(&txn, std::slice::from_ref(&row))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = Carpool::find_by_id(carpool_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::CarpoolNotFound(carpool_id.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }

    /// Delete a carpool with its passengers, notifications and messages.
    pub async fn delete_aggregate(&self, carpool_id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        delete_aggregates(&txn, &[carpool_id.to_string()])
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

pub(crate) async fn find_passenger_on<C: ConnectionTrait>(
    db: &C,
    carpool_id: &str,
    occupant: &Occupant,
) -> Result<Option<passenger::Model>, DbErr> {
    let query = Passenger::find().filter(passenger::Column::CarpoolId.eq(carpool_id));
    let query = match occupant {
        Occupant::Child(id) => query.filter(passenger::Column::ChildId.eq(id.as_str())),
        Occupant::DirectUser(id) => query.filter(passenger::Column::UserId.eq(id.as_str())),
    };
    query.one(db).await
}

/// Delete passenger rows and give each seat back, capped at capacity.
pub(crate) async fn release_seats<C: ConnectionTrait>(
    db: &C,
    rows: &[passenger::Model],
) -> Result<(), DbErr> {
    for row in rows {
        Passenger::delete_by_id(row.id.as_str()).exec(db).await?;

        Carpool::update_many()
            .col_expr(
                carpool::Column::AvailableSeats,
                Expr::cust("LEAST(available_seats + 1, capacity)"),
            )
            .filter(carpool::Column::Id.eq(row.carpool_id.as_str()))
            .exec(db)
            .await?;
    }
    Ok(())
}

/// Remove carpools and everything that hangs off them, children first.
pub(crate) async fn delete_aggregates<C: ConnectionTrait>(
    db: &C,
    carpool_ids: &[String],
) -> Result<(), DbErr> {
    if carpool_ids.is_empty() {
        return Ok(());
    }

    Passenger::delete_many()
        .filter(passenger::Column::CarpoolId.is_in(carpool_ids.to_vec()))
        .exec(db)
        .await?;

    Notification::delete_many()
        .filter(notification::Column::CarpoolId.is_in(carpool_ids.to_vec()))
        .exec(db)
        .await?;

    CarpoolMessage::delete_many()
        .filter(carpool_message::Column::CarpoolId.is_in(carpool_ids.to_vec()))
        .exec(db)
        .await?;

    Carpool::delete_many()
        .filter(carpool::Column::Id.is_in(carpool_ids.to_vec()))
        .exec(db)
        .await?;

    Ok(())
}

// A concurrent add of the same occupant loses on the unique index.
fn map_insert_err(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateOccupant,
        _ => AppError::Database(e.to_string()),
    }
}
