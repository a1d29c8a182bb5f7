//! # Message Repository
//!
//! Per-repository discussion thread.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::{ApiError, not_found, validation_error};
use crate::models::Repo;
use crate::models::message::{ActiveModel, Column, Entity, Model};

pub const MAX_MESSAGE_CHARS: usize = 2000;

pub struct MessageRepository {
    db: DatabaseConnection,
}

impl MessageRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn post(
        &self,
        repo_id: &str,
        user_id: &str,
        user_name: Option<String>,
        text: &str,
    ) -> Result<Model, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(validation_error("Invalid message", "text must not be empty"));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(validation_error(
                "Invalid message",
                &format!("text must be at most {} characters", MAX_MESSAGE_CHARS),
            ));
        }

        if Repo::find_by_id(repo_id.to_string())
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(not_found("Repository not found"));
        }

        let user_name = user_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let message = ActiveModel {
            id: Set(Uuid::new_v4().simple().to_string()),
            repo_id: Set(repo_id.to_string()),
            user_id: Set(user_id.to_string()),
            user_name: Set(user_name),
            text: Set(text.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        }
        .insert(&self.db)
        .await?;

        Ok(message)
    }

    /// Thread for a repository, oldest first.
    pub async fn list_for_repo(&self, repo_id: &str) -> Result<Vec<Model>, ApiError> {
        Ok(Entity::find()
            .filter(Column::RepoId.eq(repo_id))
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
