//! Migration to create the repos table.
//!
//! A repo row is the unit of synchronization: it names the upstream
//! `owner/name` pair and records when it was last synced and how many issues
//! that run persisted.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Repos::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Repos::Owner).text().not_null())
                    .col(ColumnDef::new(Repos::Name).text().not_null())
                    .col(ColumnDef::new(Repos::FullName).text().not_null())
                    .col(ColumnDef::new(Repos::AddedBy).text().not_null())
                    .col(
                        ColumnDef::new(Repos::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Repos::LastProcessedCount).integer().null())
                    .col(
                        ColumnDef::new(Repos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Repos::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One registration of a given repository per user
        manager
            .create_index(
                Index::create()
                    .name("idx_repos_added_by_full_name")
                    .table(Repos::Table)
                    .col(Repos::AddedBy)
                    .col(Repos::FullName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repos_created_at")
                    .table(Repos::Table)
                    .col(Repos::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_repos_created_at").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_repos_added_by_full_name")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Repos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
    Owner,
    Name,
    FullName,
    AddedBy,
    LastSyncedAt,
    LastProcessedCount,
    CreatedAt,
    UpdatedAt,
}
