//! # Issue Browsing Handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::parse_list;
use crate::error::ApiError;
use crate::models::issue;
use crate::repositories::{IssueRepository, LabelCount, RepoRepository};
use crate::server::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListIssuesQuery {
    /// Comma-separated labels; issues carrying any of them are returned
    pub labels: Option<String>,
}

/// Synced issue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueInfo {
    pub id: String,
    pub repo_id: String,
    pub source_issue_id: i64,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub state: String,
    pub labels: Vec<String>,
    pub html_url: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<issue::Model> for IssueInfo {
    fn from(model: issue::Model) -> Self {
        let labels = model.label_names();
        Self {
            id: model.id,
            repo_id: model.repo_id,
            source_issue_id: model.source_issue_id,
            number: model.number,
            title: model.title,
            body: model.body,
            state: model.state,
            labels,
            html_url: model.html_url,
            created_at: model.created_at.with_timezone(&Utc).to_rfc3339(),
            updated_at: model.updated_at.map(|ts| ts.with_timezone(&Utc).to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssuesResponse {
    pub issues: Vec<IssueInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LabelsResponse {
    pub labels: Vec<LabelCount>,
}

/// List a repository's issues, newest first
#[utoipa::path(
    get,
    path = "/repos/{repo_id}/issues",
    params(("repo_id" = String, Path, description = "Repository id"), ListIssuesQuery),
    responses(
        (status = 200, description = "Issues", body = IssuesResponse),
        (status = 404, description = "Repository not found", body = ApiError)
    ),
    tag = "issues"
)]
pub async fn list_issues(
    State(state): State<AppState>,
    Path(repo_id): Path<String>,
    Query(query): Query<ListIssuesQuery>,
) -> Result<Json<IssuesResponse>, ApiError> {
    RepoRepository::new(state.db.clone()).get(&repo_id).await?;

    let labels = query.labels.as_deref().map(parse_list).unwrap_or_default();
    let issues = IssueRepository::new(state.db.clone())
        .list_for_repo(&repo_id, &labels)
        .await?
        .into_iter()
        .map(IssueInfo::from)
        .collect();
    Ok(Json(IssuesResponse { issues }))
}

/// Label usage across a repository's issues
#[utoipa::path(
    get,
    path = "/repos/{repo_id}/labels",
    params(("repo_id" = String, Path, description = "Repository id")),
    responses(
        (status = 200, description = "Label counts, most used first", body = LabelsResponse),
        (status = 404, description = "Repository not found", body = ApiError)
    ),
    tag = "issues"
)]
pub async fn list_labels(
    State(state): State<AppState>,
    Path(repo_id): Path<String>,
) -> Result<Json<LabelsResponse>, ApiError> {
    RepoRepository::new(state.db.clone()).get(&repo_id).await?;

    let labels = IssueRepository::new(state.db.clone())
        .label_counts(&repo_id)
        .await?;
    Ok(Json(LabelsResponse { labels }))
}
