//! # Bookmark Handlers

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{CurrentUser, UserHeader};
use crate::error::ApiError;
use crate::models::bookmark;
use crate::repositories::{BookmarkDetails, BookmarkRepository};
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookmarkRequest {
    pub issue_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkStatusQuery {
    pub issue_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkInfo {
    pub id: String,
    pub user_id: String,
    pub issue_id: String,
    pub created_at: String,
}

impl From<bookmark::Model> for BookmarkInfo {
    fn from(model: bookmark::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            issue_id: model.issue_id,
            created_at: model.created_at.with_timezone(&Utc).to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkStatus {
    pub bookmarked: bool,
    pub bookmark_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookmarksResponse {
    pub bookmarks: Vec<BookmarkDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemovedResponse {
    pub success: bool,
}

/// Bookmark an issue
#[utoipa::path(
    post,
    path = "/bookmarks",
    params(UserHeader),
    request_body = CreateBookmarkRequest,
    responses(
        (status = 201, description = "Bookmark created", body = BookmarkInfo),
        (status = 404, description = "Issue not found", body = ApiError),
        (status = 409, description = "Already bookmarked", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn create_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<CreateBookmarkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookmarkInfo>), ApiError> {
    let Json(payload) = payload?;
    let bookmark = BookmarkRepository::new(state.db.clone())
        .create(user.id(), &payload.issue_id)
        .await?;
    Ok((StatusCode::CREATED, Json(bookmark.into())))
}

/// The caller's bookmarks with issue details, newest first
#[utoipa::path(
    get,
    path = "/bookmarks",
    params(UserHeader),
    responses(
        (status = 200, description = "Bookmarks", body = BookmarksResponse)
    ),
    tag = "bookmarks"
)]
pub async fn list_bookmarks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<BookmarksResponse>, ApiError> {
    let bookmarks = BookmarkRepository::new(state.db.clone())
        .list_with_details(user.id())
        .await?;
    Ok(Json(BookmarksResponse { bookmarks }))
}

/// Whether the caller bookmarked an issue
#[utoipa::path(
    get,
    path = "/bookmarks/status",
    params(UserHeader, BookmarkStatusQuery),
    responses(
        (status = 200, description = "Bookmark status", body = BookmarkStatus)
    ),
    tag = "bookmarks"
)]
pub async fn bookmark_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<BookmarkStatusQuery>,
) -> Result<Json<BookmarkStatus>, ApiError> {
    let bookmark = BookmarkRepository::new(state.db.clone())
        .find_for_issue(user.id(), &query.issue_id)
        .await?;
    Ok(Json(BookmarkStatus {
        bookmarked: bookmark.is_some(),
        bookmark_id: bookmark.map(|b| b.id),
    }))
}

/// Remove a bookmark by id
#[utoipa::path(
    delete,
    path = "/bookmarks/{bookmark_id}",
    params(UserHeader, ("bookmark_id" = String, Path, description = "Bookmark id")),
    responses(
        (status = 200, description = "Bookmark removed", body = RemovedResponse),
        (status = 403, description = "Bookmark belongs to another user", body = ApiError),
        (status = 404, description = "Bookmark not found", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn remove_bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bookmark_id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    BookmarkRepository::new(state.db.clone())
        .remove(&bookmark_id, user.id())
        .await?;
    Ok(Json(RemovedResponse { success: true }))
}

/// Remove the caller's bookmark on an issue
#[utoipa::path(
    delete,
    path = "/bookmarks/by-issue/{issue_id}",
    params(UserHeader, ("issue_id" = String, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Bookmark removed", body = RemovedResponse),
        (status = 404, description = "Bookmark not found", body = ApiError)
    ),
    tag = "bookmarks"
)]
pub async fn remove_bookmark_by_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(issue_id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    BookmarkRepository::new(state.db.clone())
        .remove_by_issue(user.id(), &issue_id)
        .await?;
    Ok(Json(RemovedResponse { success: true }))
}
