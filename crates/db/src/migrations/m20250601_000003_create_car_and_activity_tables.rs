//! Create `car` and `activity` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Car::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Car::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Car::OwnerId).string_len(32))
                    .col(
                        ColumnDef::new(Car::RegNumber)
                            .string_len(16)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Car::FuelType).string_len(32))
                    .col(ColumnDef::new(Car::ModelName).string_len(128))
                    .col(ColumnDef::new(Car::Consumption).double())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_car_owner")
                            .from(Car::Table, Car::OwnerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_car_owner_id")
                    .table(Car::Table)
                    .col(Car::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activity::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activity::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Activity::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activity::EndDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Activity::RoleId).string_len(32))
                    .col(ColumnDef::new(Activity::Address).string_len(256).not_null())
                    .col(ColumnDef::new(Activity::Description).text())
                    .col(
                        ColumnDef::new(Activity::IsVisible)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_role")
                            .from(Activity::Table, Activity::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Importer looks activities up by (name, start_date)
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_name_start_date")
                    .table(Activity::Table)
                    .col(Activity::Name)
                    .col(Activity::StartDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activity::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Car::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Car {
    Table,
    Id,
    OwnerId,
    RegNumber,
    FuelType,
    ModelName,
    Consumption,
}

#[derive(Iden)]
enum Activity {
    Table,
    Id,
    Name,
    StartDate,
    EndDate,
    RoleId,
    Address,
    Description,
    IsVisible,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Role {
    Table,
    Id,
}
