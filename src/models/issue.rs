//! Issue entity model
//!
//! SeaORM entity for the issues table. The primary key is
//! `{repo_id}_{source_issue_id}`, so every write for the same upstream issue
//! within one tracked repository addresses the same row, while two
//! registrations of the same upstream repository keep separate copies.

use super::repo::Entity as Repo;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

/// Synced upstream issue
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    /// Document identifier derived from `source_issue_id`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning repository
    pub repo_id: String,

    /// Immutable upstream issue id
    pub source_issue_id: i64,

    /// Display number within the repository
    pub number: i64,

    pub title: String,

    /// Issue body; empty when upstream has none
    pub body: String,

    /// `open` or `closed`
    pub state: String,

    /// Label names as a JSON array of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub labels: JsonValue,

    pub html_url: String,

    /// Creation time reported upstream
    pub created_at: DateTimeWithTimeZone,

    /// Last update time reported upstream
    pub updated_at: Option<DateTimeWithTimeZone>,

    /// Last time a sync wrote this row
    pub synced_at: DateTimeWithTimeZone,
}

impl Model {
    /// Label names stored on the issue, skipping anything that is not a string
    pub fn label_names(&self) -> Vec<String> {
        self.labels
            .as_array()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|label| label.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_any_label(&self, wanted: &[String]) -> bool {
        self.label_names().iter().any(|label| wanted.contains(label))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Repo",
        from = "Column::RepoId",
        to = "super::repo::Column::Id"
    )]
    Repo,
}

impl Related<Repo> for Entity {
    fn to() -> RelationDef {
        Relation::Repo.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
