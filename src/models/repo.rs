//! Repo entity model
//!
//! SeaORM entity for the repos table: an upstream GitHub repository a user
//! registered for issue synchronization.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Tracked repository
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "repos")]
pub struct Model {
    /// Document identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Upstream owner (user or organization login)
    pub owner: String,

    /// Upstream repository name
    pub name: String,

    /// Always `owner/name`
    pub full_name: String,

    /// User that registered the repository
    pub added_by: String,

    /// Completion time of the last sync that finished within its time budget
    pub last_synced_at: Option<DateTimeWithTimeZone>,

    /// Issues persisted by that sync
    pub last_processed_count: Option<i32>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
