//! # Repo Repository
//!
//! Registration, lookup and cascading removal of tracked repositories.

use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::{ApiError, forbidden, is_unique_violation, not_found};
use crate::models::issue;
use crate::models::repo::{ActiveModel, Column, Entity, Model};
use crate::repo_ref::RepoRef;

const CASCADE_PAGE_SIZE: u64 = 100;

pub struct RepoRepository {
    db: DatabaseConnection,
}

impl RepoRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Register `repo_ref` on behalf of `added_by`.
    pub async fn create(&self, repo_ref: &RepoRef, added_by: &str) -> Result<Model, ApiError> {
        let now = Utc::now().fixed_offset();
        let full_name = repo_ref.full_name();

        let repo = ActiveModel {
            id: Set(Uuid::new_v4().simple().to_string()),
            owner: Set(repo_ref.owner.clone()),
            name: Set(repo_ref.name.clone()),
            full_name: Set(full_name.clone()),
            added_by: Set(added_by.to_string()),
            last_synced_at: Set(None),
            last_processed_count: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = repo.insert(&self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::new(StatusCode::CONFLICT, "Repository already added")
                    .with_error(full_name.clone())
            } else {
                tracing::error!("Failed to create repository: {}", e);
                ApiError::from(e)
            }
        })?;

        tracing::info!(repo_id = %created.id, full_name = %created.full_name, added_by, "Repository registered");
        Ok(created)
    }

    pub async fn find_by_id(&self, repo_id: &str) -> Result<Option<Model>, ApiError> {
        Ok(Entity::find_by_id(repo_id.to_string()).one(&self.db).await?)
    }

    /// Fetch a repository or fail with 404.
    pub async fn get(&self, repo_id: &str) -> Result<Model, ApiError> {
        self.find_by_id(repo_id)
            .await?
            .ok_or_else(|| not_found("Repository not found"))
    }

    /// Newest first; limited to one user's repositories when `added_by` is set.
    pub async fn list(&self, added_by: Option<&str>) -> Result<Vec<Model>, ApiError> {
        let mut query = Entity::find().order_by_desc(Column::CreatedAt);
        if let Some(user) = added_by {
            query = query.filter(Column::AddedBy.eq(user));
        }
        Ok(query.all(&self.db).await?)
    }

    /// Delete a repository owned by `user_id` together with its issues.
    ///
    /// Issues go first, in id-ordered pages; a failed issue delete is logged
    /// and skipped. Returns the number of issues removed.
    pub async fn delete_cascade(&self, repo_id: &str, user_id: &str) -> Result<u64, ApiError> {
        let repo = self.get(repo_id).await?;
        if repo.added_by != user_id {
            return Err(forbidden(Some(
                "Unauthorized: This repository does not belong to you",
            )));
        }

        let mut deleted = 0u64;
        let mut cursor: Option<String> = None;
        loop {
            let mut query = issue::Entity::find()
                .select_only()
                .column(issue::Column::Id)
                .filter(issue::Column::RepoId.eq(repo_id))
                .order_by_asc(issue::Column::Id)
                .limit(CASCADE_PAGE_SIZE);
            if let Some(after) = &cursor {
                query = query.filter(issue::Column::Id.gt(after.clone()));
            }
            let ids: Vec<String> = query.into_tuple::<String>().all(&self.db).await?;

            for id in &ids {
                match issue::Entity::delete_by_id(id.clone()).exec(&self.db).await {
                    Ok(result) => deleted += result.rows_affected,
                    Err(e) => tracing::warn!(repo_id, issue_id = %id, "Failed to delete issue: {}", e),
                }
            }

            if (ids.len() as u64) < CASCADE_PAGE_SIZE {
                break;
            }
            cursor = ids.last().cloned();
        }

        Entity::delete_by_id(repo_id.to_string()).exec(&self.db).await?;
        tracing::info!(repo_id, deleted_issues = deleted, "Repository deleted");
        Ok(deleted)
    }
}
