//! Migration to create the issues table.
//!
//! Issue rows are keyed by the owning repository id and the upstream issue id
//! (`{repo_id}_{source_issue_id}`), so a repeated insert for the same upstream
//! issue in the same repository collides on the primary key.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Issues::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Issues::RepoId).text().not_null())
                    .col(ColumnDef::new(Issues::SourceIssueId).big_integer().not_null())
                    .col(ColumnDef::new(Issues::Number).big_integer().not_null())
                    .col(ColumnDef::new(Issues::Title).text().not_null())
                    .col(ColumnDef::new(Issues::Body).text().not_null())
                    .col(ColumnDef::new(Issues::State).text().not_null())
                    .col(ColumnDef::new(Issues::Labels).json_binary().not_null())
                    .col(ColumnDef::new(Issues::HtmlUrl).text().not_null())
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_repo_id")
                            .from(Issues::Table, Issues::RepoId)
                            .to(Repos::Table, Repos::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issues_repo_source_issue")
                    .table(Issues::Table)
                    .col(Issues::RepoId)
                    .col(Issues::SourceIssueId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Listing order for repository browsing
        manager
            .create_index(
                Index::create()
                    .name("idx_issues_repo_created_at")
                    .table(Issues::Table)
                    .col(Issues::RepoId)
                    .col(Issues::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_issues_repo_created_at").to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_issues_repo_source_issue")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    RepoId,
    SourceIssueId,
    Number,
    Title,
    Body,
    State,
    Labels,
    HtmlUrl,
    CreatedAt,
    UpdatedAt,
    SyncedAt,
}

#[derive(DeriveIden)]
enum Repos {
    Table,
    Id,
}
