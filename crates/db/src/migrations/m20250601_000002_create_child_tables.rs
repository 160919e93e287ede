//! Create `child` and `parent_child_link` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Child::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Child::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Child::FirstName).string_len(128).not_null())
                    .col(ColumnDef::new(Child::LastName).string_len(128).not_null())
                    .col(ColumnDef::new(Child::DateOfBirth).date())
                    .col(ColumnDef::new(Child::Phone).string_len(32))
                    .col(ColumnDef::new(Child::RoleId).string_len(32))
                    .col(
                        ColumnDef::new(Child::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_child_role")
                            .from(Child::Table, Child::RoleId)
                            .to(Role::Table, Role::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_child_role_id")
                    .table(Child::Table)
                    .col(Child::RoleId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ParentChildLink::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParentChildLink::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParentChildLink::ChildId)
                            .string_len(32)
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_parent_child_link")
                            .col(ParentChildLink::UserId)
                            .col(ParentChildLink::ChildId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_parent_child_link_user")
                            .from(ParentChildLink::Table, ParentChildLink::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_parent_child_link_child")
                            .from(ParentChildLink::Table, ParentChildLink::ChildId)
                            .to(Child::Table, Child::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Guardian lookup by child
        manager
            .create_index(
                Index::create()
                    .name("idx_parent_child_link_child_id")
                    .table(ParentChildLink::Table)
                    .col(ParentChildLink::ChildId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ParentChildLink::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Child::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Child {
    Table,
    Id,
    FirstName,
    LastName,
    DateOfBirth,
    Phone,
    RoleId,
    CreatedAt,
}

#[derive(Iden)]
enum ParentChildLink {
    Table,
    UserId,
    ChildId,
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
