//! Create `carpool_message` and `notification` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CarpoolMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CarpoolMessage::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CarpoolMessage::CarpoolId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CarpoolMessage::SenderId).string_len(32))
                    .col(ColumnDef::new(CarpoolMessage::Content).text().not_null())
                    .col(
                        ColumnDef::new(CarpoolMessage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CarpoolMessage::Status)
                            .string_len(16)
                            .not_null()
                            .default("sent"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carpool_message_carpool")
                            .from(CarpoolMessage::Table, CarpoolMessage::CarpoolId)
                            .to(Carpool::Table, Carpool::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carpool_message_sender")
                            .from(CarpoolMessage::Table, CarpoolMessage::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // History is read in append order per carpool
        manager
            .create_index(
                Index::create()
                    .name("idx_carpool_message_carpool_created_at")
                    .table(CarpoolMessage::Table)
                    .col(CarpoolMessage::CarpoolId)
                    .col(CarpoolMessage::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notification::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notification::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Notification::CarpoolId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notification::MessageId).string_len(32))
                    .col(ColumnDef::new(Notification::Message).text().not_null())
                    .col(
                        ColumnDef::new(Notification::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notification::Table, Notification::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_carpool")
                            .from(Notification::Table, Notification::CarpoolId)
                            .to(Carpool::Table, Carpool::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_message")
                            .from(Notification::Table, Notification::MessageId)
                            .to(CarpoolMessage::Table, CarpoolMessage::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unread counts per (user, carpool)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_carpool_read")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .col(Notification::CarpoolId)
                    .col(Notification::IsRead)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CarpoolMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CarpoolMessage {
    Table,
    Id,
    CarpoolId,
    SenderId,
    Content,
    CreatedAt,
    Status,
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    UserId,
    CarpoolId,
    MessageId,
    Message,
    IsRead,
    CreatedAt,
}

#[derive(Iden)]
enum Carpool {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
