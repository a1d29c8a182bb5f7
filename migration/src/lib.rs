//! Database migrations for the issue sync service.
//!
//! Tables mirror the document collections the service persists: tracked
//! repositories, their synced issues, and the per-user records hanging off them.

pub use sea_orm_migration::prelude::*;

mod m2025_11_10_090000_create_repos;
mod m2025_11_10_090100_create_issues;
mod m2025_11_10_090200_create_bookmarks;
mod m2025_11_10_090300_create_claims;
mod m2025_11_10_090400_create_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_10_090000_create_repos::Migration),
            Box::new(m2025_11_10_090100_create_issues::Migration),
            Box::new(m2025_11_10_090200_create_bookmarks::Migration),
            Box::new(m2025_11_10_090300_create_claims::Migration),
            Box::new(m2025_11_10_090400_create_messages::Migration),
        ]
    }
}
