//! Migration to create the claims table.
//!
//! A claim records that a user intends to work on an issue.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Claims::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Claims::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(Claims::UserId).text().not_null())
                    .col(ColumnDef::new(Claims::IssueId).text().not_null())
                    .col(
                        ColumnDef::new(Claims::Status)
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Claims::ClaimedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_claims_issue_id")
                            .from(Claims::Table, Claims::IssueId)
                            .to(Issues::Table, Issues::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_claims_issue_claimed_at")
                    .table(Claims::Table)
                    .col(Claims::IssueId)
                    .col(Claims::ClaimedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_claims_issue_claimed_at")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Claims::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Claims {
    Table,
    Id,
    UserId,
    IssueId,
    Status,
    ClaimedAt,
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
}
