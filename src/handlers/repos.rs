//! # Repository Registry Handlers

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{CurrentUser, UserHeader};
use crate::error::{ApiError, bad_request};
use crate::models::repo;
use crate::repo_ref::RepoRef;
use crate::repositories::RepoRepository;
use crate::server::AppState;
use crate::sync::{SyncReport, SyncRequest};

/// Request body for registering a repository
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddRepositoryRequest {
    /// `owner/repo` or a github.com URL
    #[schema(example = "tokio-rs/axum")]
    pub repository: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AddRepositoryQuery {
    /// Run an initial sync right after registering
    pub sync: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListRepositoriesQuery {
    /// Only repositories registered by this user
    pub added_by: Option<String>,
}

/// Tracked repository
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub added_by: String,
    pub last_synced_at: Option<String>,
    pub last_processed_count: Option<i32>,
    pub created_at: String,
}

impl From<repo::Model> for RepoInfo {
    fn from(model: repo::Model) -> Self {
        Self {
            id: model.id,
            owner: model.owner,
            name: model.name,
            full_name: model.full_name,
            added_by: model.added_by,
            last_synced_at: model
                .last_synced_at
                .map(|ts| ts.with_timezone(&Utc).to_rfc3339()),
            last_processed_count: model.last_processed_count,
            created_at: model.created_at.with_timezone(&Utc).to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddRepositoryResponse {
    pub repository: RepoInfo,
    /// Report of the initial sync when one was requested and succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_sync: Option<SyncReport>,
    /// Why the initial sync failed; the repository stays registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_sync_error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RepositoriesResponse {
    pub repositories: Vec<RepoInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRepositoryResponse {
    pub success: bool,
    pub deleted_issues: u64,
}

/// Register a repository for issue synchronization
#[utoipa::path(
    post,
    path = "/repos",
    params(UserHeader, AddRepositoryQuery),
    request_body = AddRepositoryRequest,
    responses(
        (status = 201, description = "Repository registered", body = AddRepositoryResponse),
        (status = 400, description = "Unparseable repository reference", body = ApiError),
        (status = 401, description = "Missing user id", body = ApiError),
        (status = 409, description = "Already registered by this user", body = ApiError)
    ),
    tag = "repositories"
)]
pub async fn add_repository(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<AddRepositoryQuery>,
    payload: Result<Json<AddRepositoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddRepositoryResponse>), ApiError> {
    let Json(payload) = payload?;
    let repo_ref = RepoRef::parse(&payload.repository).map_err(|e| bad_request(&e.to_string()))?;

    let repos = RepoRepository::new(state.db.clone());
    let created = repos.create(&repo_ref, user.id()).await?;

    let mut initial_sync = None;
    let mut initial_sync_error = None;
    if query.sync.unwrap_or(false) {
        match state.sync.run(SyncRequest::new(created.id.clone())).await {
            Ok(run) => initial_sync = Some(run.report),
            Err(err) => {
                tracing::warn!(repo_id = %created.id, error = %err, "Initial sync failed");
                initial_sync_error = Some(err.to_string());
            }
        }
    }

    // Reload so the response reflects metadata written by the initial sync.
    let repository = match initial_sync {
        Some(_) => repos.get(&created.id).await?,
        None => created,
    };

    Ok((
        StatusCode::CREATED,
        Json(AddRepositoryResponse {
            repository: repository.into(),
            initial_sync,
            initial_sync_error,
        }),
    ))
}

/// List tracked repositories, newest first
#[utoipa::path(
    get,
    path = "/repos",
    params(ListRepositoriesQuery),
    responses(
        (status = 200, description = "Tracked repositories", body = RepositoriesResponse)
    ),
    tag = "repositories"
)]
pub async fn list_repositories(
    State(state): State<AppState>,
    Query(query): Query<ListRepositoriesQuery>,
) -> Result<Json<RepositoriesResponse>, ApiError> {
    let repos = RepoRepository::new(state.db.clone());
    let repositories = repos
        .list(query.added_by.as_deref())
        .await?
        .into_iter()
        .map(RepoInfo::from)
        .collect();
    Ok(Json(RepositoriesResponse { repositories }))
}

/// Fetch one tracked repository
#[utoipa::path(
    get,
    path = "/repos/{repo_id}",
    params(("repo_id" = String, Path, description = "Repository id")),
    responses(
        (status = 200, description = "Repository", body = RepoInfo),
        (status = 404, description = "Repository not found", body = ApiError)
    ),
    tag = "repositories"
)]
pub async fn get_repository(
    State(state): State<AppState>,
    Path(repo_id): Path<String>,
) -> Result<Json<RepoInfo>, ApiError> {
    let repos = RepoRepository::new(state.db.clone());
    Ok(Json(repos.get(&repo_id).await?.into()))
}

/// Delete a repository and all of its issues
#[utoipa::path(
    delete,
    path = "/repos/{repo_id}",
    params(UserHeader, ("repo_id" = String, Path, description = "Repository id")),
    responses(
        (status = 200, description = "Repository deleted", body = DeleteRepositoryResponse),
        (status = 403, description = "Repository belongs to another user", body = ApiError),
        (status = 404, description = "Repository not found", body = ApiError)
    ),
    tag = "repositories"
)]
pub async fn delete_repository(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(repo_id): Path<String>,
) -> Result<Json<DeleteRepositoryResponse>, ApiError> {
    let repos = RepoRepository::new(state.db.clone());
    let deleted_issues = repos.delete_cascade(&repo_id, user.id()).await?;
    Ok(Json(DeleteRepositoryResponse {
        success: true,
        deleted_issues,
    }))
}
