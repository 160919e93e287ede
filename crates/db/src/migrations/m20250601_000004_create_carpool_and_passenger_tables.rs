//! Create `carpool` and `passenger` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Carpool::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Carpool::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Carpool::ActivityId).string_len(32).not_null())
                    .col(ColumnDef::new(Carpool::DriverId).string_len(32))
                    .col(ColumnDef::new(Carpool::CarId).string_len(32))
                    .col(ColumnDef::new(Carpool::Capacity).integer().not_null())
                    .col(
                        ColumnDef::new(Carpool::AvailableSeats)
                            .integer()
                            .not_null()
                            .check(Expr::col(Carpool::AvailableSeats).gte(0)),
                    )
                    .col(ColumnDef::new(Carpool::CarpoolType).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Carpool::DepartureAddress)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Carpool::DeparturePostcode)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Carpool::DepartureCity)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Carpool::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carpool_activity")
                            .from(Carpool::Table, Carpool::ActivityId)
                            .to(Activity::Table, Activity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carpool_driver")
                            .from(Carpool::Table, Carpool::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carpool_car")
                            .from(Carpool::Table, Carpool::CarId)
                            .to(Car::Table, Car::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_carpool_activity_id")
                    .table(Carpool::Table)
                    .col(Carpool::ActivityId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_carpool_driver_id")
                    .table(Carpool::Table)
                    .col(Carpool::DriverId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Passenger::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Passenger::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Passenger::CarpoolId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Passenger::ChildId).string_len(32))
                    .col(ColumnDef::new(Passenger::UserId).string_len(32))
                    .col(
                        ColumnDef::new(Passenger::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_passenger_carpool")
                            .from(Passenger::Table, Passenger::CarpoolId)
                            .to(Carpool::Table, Carpool::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_passenger_child")
                            .from(Passenger::Table, Passenger::ChildId)
                            .to(Child::Table, Child::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_passenger_user")
                            .from(Passenger::Table, Passenger::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Exactly one of child_id / user_id
        manager
            .get_connection()
            .execute_unprepared(
                r"
                ALTER TABLE passenger
                ADD CONSTRAINT chk_passenger_occupant
                CHECK ((child_id IS NULL) <> (user_id IS NULL));
                ",
            )
            .await?;

        // Unique occupant per carpool. NULLs are distinct, so each index
        // only constrains its own occupant kind.
        manager
            .create_index(
                Index::create()
                    .name("idx_passenger_carpool_child")
                    .table(Passenger::Table)
                    .col(Passenger::CarpoolId)
                    .col(Passenger::ChildId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_passenger_carpool_user")
                    .table(Passenger::Table)
                    .col(Passenger::CarpoolId)
                    .col(Passenger::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Passenger::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Carpool::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Carpool {
    Table,
    Id,
    ActivityId,
    DriverId,
    CarId,
    Capacity,
    AvailableSeats,
    CarpoolType,
    DepartureAddress,
    DeparturePostcode,
    DepartureCity,
    CreatedAt,
}

#[derive(Iden)]
enum Passenger {
    Table,
    Id,
    CarpoolId,
    ChildId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Activity {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Car {
    Table,
    Id,
}

#[derive(Iden)]
enum Child {
    Table,
    Id,
}
