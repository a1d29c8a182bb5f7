//! # Bookmark Repository
//!
//! Per-user saved issues, listed together with the issue and repository they
//! point at.

use axum::http::StatusCode;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, forbidden, is_unique_violation, not_found};
use crate::models::bookmark::{ActiveModel, Column, Entity, Model};
use crate::models::{Issue, Repo, issue, repo};

const DESCRIPTION_CHARS: usize = 200;

/// Bookmark joined with its issue and repository
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkDetails {
    pub id: String,
    pub issue_id: String,
    pub user_id: String,
    pub created_at: String,
    pub title: String,
    pub description: String,
    /// `owner/name`, or "Unknown repository" when the details are gone
    pub repository: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
}

impl BookmarkDetails {
    fn joined(bookmark: &Model, issue: issue::Model, repo: repo::Model) -> Self {
        let labels = issue.label_names();
        Self {
            id: bookmark.id.clone(),
            issue_id: bookmark.issue_id.clone(),
            user_id: bookmark.user_id.clone(),
            created_at: bookmark.created_at.to_rfc3339(),
            title: issue.title,
            description: description_excerpt(&issue.body),
            repository: repo.full_name,
            labels,
            number: Some(issue.number),
            body: Some(issue.body),
            state: Some(issue.state),
            html_url: Some(issue.html_url),
            issue_created_at: Some(issue.created_at.to_rfc3339()),
            issue_updated_at: issue.updated_at.map(|ts| ts.to_rfc3339()),
            repository_owner: Some(repo.owner),
            repository_name: Some(repo.name),
        }
    }

    fn unavailable(bookmark: &Model) -> Self {
        Self {
            id: bookmark.id.clone(),
            issue_id: bookmark.issue_id.clone(),
            user_id: bookmark.user_id.clone(),
            created_at: bookmark.created_at.to_rfc3339(),
            title: "Issue details unavailable".to_string(),
            description: "Could not load issue details".to_string(),
            repository: "Unknown repository".to_string(),
            labels: Vec::new(),
            number: None,
            body: None,
            state: None,
            html_url: None,
            issue_created_at: None,
            issue_updated_at: None,
            repository_owner: None,
            repository_name: None,
        }
    }
}

/// First 200 characters of an issue body for list views.
pub fn description_excerpt(body: &str) -> String {
    if body.is_empty() {
        return "No description provided.".to_string();
    }
    let mut chars = body.chars();
    let excerpt: String = chars.by_ref().take(DESCRIPTION_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", excerpt)
    } else {
        excerpt
    }
}

pub struct BookmarkRepository {
    db: DatabaseConnection,
}

impl BookmarkRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: &str, issue_id: &str) -> Result<Model, ApiError> {
        if Issue::find_by_id(issue_id.to_string())
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(not_found("Issue not found"));
        }

        let bookmark = ActiveModel {
            id: Set(Uuid::new_v4().simple().to_string()),
            user_id: Set(user_id.to_string()),
            issue_id: Set(issue_id.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
        };

        bookmark.insert(&self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::new(StatusCode::CONFLICT, "Issue already bookmarked")
            } else {
                ApiError::from(e)
            }
        })
    }

    pub async fn find_for_issue(&self, user_id: &str, issue_id: &str) -> Result<Option<Model>, ApiError> {
        Ok(Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IssueId.eq(issue_id))
            .one(&self.db)
            .await?)
    }

    /// Remove a bookmark by id; only its owner may.
    pub async fn remove(&self, bookmark_id: &str, user_id: &str) -> Result<(), ApiError> {
        let bookmark = Entity::find_by_id(bookmark_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found("Bookmark not found"))?;

        if bookmark.user_id != user_id {
            return Err(forbidden(Some(
                "Unauthorized: This bookmark does not belong to you",
            )));
        }

        Entity::delete_by_id(bookmark.id).exec(&self.db).await?;
        Ok(())
    }

    pub async fn remove_by_issue(&self, user_id: &str, issue_id: &str) -> Result<(), ApiError> {
        let bookmark = self
            .find_for_issue(user_id, issue_id)
            .await?
            .ok_or_else(|| not_found("Bookmark not found"))?;
        Entity::delete_by_id(bookmark.id).exec(&self.db).await?;
        Ok(())
    }

    /// A user's bookmarks, newest first, with issue and repository details.
    pub async fn list_with_details(&self, user_id: &str) -> Result<Vec<BookmarkDetails>, ApiError> {
        let bookmarks = Entity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut details = Vec::with_capacity(bookmarks.len());
        for bookmark in &bookmarks {
            let issue = Issue::find_by_id(bookmark.issue_id.clone()).one(&self.db).await?;
            let repo = match &issue {
                Some(issue) => Repo::find_by_id(issue.repo_id.clone()).one(&self.db).await?,
                None => None,
            };

            match (issue, repo) {
                (Some(issue), Some(repo)) => details.push(BookmarkDetails::joined(bookmark, issue, repo)),
                _ => {
                    tracing::warn!(bookmark_id = %bookmark.id, "Bookmark details unavailable");
                    details.push(BookmarkDetails::unavailable(bookmark));
                }
            }
        }
        Ok(details)
    }
}
