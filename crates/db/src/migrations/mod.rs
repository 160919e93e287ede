//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250601_000001_create_user_and_role_tables;
mod m20250601_000002_create_child_tables;
mod m20250601_000003_create_car_and_activity_tables;
mod m20250601_000004_create_carpool_and_passenger_tables;
mod m20250601_000005_create_message_and_notification_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_user_and_role_tables::Migration),
            Box::new(m20250601_000002_create_child_tables::Migration),
            Box::new(m20250601_000003_create_car_and_activity_tables::Migration),
            Box::new(m20250601_000004_create_carpool_and_passenger_tables::Migration),
            Box::new(m20250601_000005_create_message_and_notification_tables::Migration),
        ]
    }
}
