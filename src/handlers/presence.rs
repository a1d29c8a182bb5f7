//! # Presence Handlers

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{CurrentUser, UserHeader};
use crate::error::ApiError;
use crate::presence::ActiveUser;
use crate::repositories::RepoRepository;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct HeartbeatRequest {
    /// Display name to show to other viewers
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub users: Vec<ActiveUser>,
    /// Seconds a heartbeat stays valid
    pub window_secs: u64,
}

/// Record that the caller is viewing a repository
#[utoipa::path(
    post,
    path = "/repos/{repo_id}/presence",
    params(UserHeader, ("repo_id" = String, Path, description = "Repository id")),
    request_body = HeartbeatRequest,
    responses(
        (status = 200, description = "Users currently active", body = PresenceResponse),
        (status = 404, description = "Repository not found", body = ApiError)
    ),
    tag = "presence"
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(repo_id): Path<String>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<Json<PresenceResponse>, ApiError> {
    let Json(payload) = payload?;
    RepoRepository::new(state.db.clone()).get(&repo_id).await?;

    let name = payload
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    state.presence.record(&repo_id, user.id(), name);

    Ok(Json(PresenceResponse {
        users: state.presence.active(&repo_id),
        window_secs: state.presence.window().as_secs(),
    }))
}

/// Users active on a repository within the presence window
#[utoipa::path(
    get,
    path = "/repos/{repo_id}/presence",
    params(("repo_id" = String, Path, description = "Repository id")),
    responses(
        (status = 200, description = "Users currently active", body = PresenceResponse)
    ),
    tag = "presence"
)]
pub async fn list_presence(
    State(state): State<AppState>,
    Path(repo_id): Path<String>,
) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        users: state.presence.active(&repo_id),
        window_secs: state.presence.window().as_secs(),
    })
}

/// Stop showing the caller on a repository
#[utoipa::path(
    delete,
    path = "/repos/{repo_id}/presence",
    params(UserHeader, ("repo_id" = String, Path, description = "Repository id")),
    responses(
        (status = 200, description = "Users still active", body = PresenceResponse)
    ),
    tag = "presence"
)]
pub async fn leave(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(repo_id): Path<String>,
) -> Json<PresenceResponse> {
    state.presence.leave(&repo_id, user.id());
    Json(PresenceResponse {
        users: state.presence.active(&repo_id),
        window_secs: state.presence.window().as_secs(),
    })
}
