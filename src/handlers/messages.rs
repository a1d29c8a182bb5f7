//! # Repository Discussion Handlers

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{CurrentUser, UserHeader};
use crate::error::ApiError;
use crate::models::message;
use crate::repositories::MessageRepository;
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    /// Message text, at most 2000 characters after trimming
    pub text: String,
    /// Display name shown next to the message
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: String,
    pub repo_id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub text: String,
    pub created_at: String,
}

impl From<message::Model> for MessageInfo {
    fn from(model: message::Model) -> Self {
        Self {
            id: model.id,
            repo_id: model.repo_id,
            user_id: model.user_id,
            user_name: model.user_name,
            text: model.text,
            created_at: model.created_at.with_timezone(&Utc).to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<MessageInfo>,
}

/// Post to a repository's discussion
#[utoipa::path(
    post,
    path = "/repos/{repo_id}/messages",
    params(UserHeader, ("repo_id" = String, Path, description = "Repository id")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message posted", body = MessageInfo),
        (status = 400, description = "Empty or oversized message", body = ApiError),
        (status = 404, description = "Repository not found", body = ApiError)
    ),
    tag = "messages"
)]
pub async fn post_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(repo_id): Path<String>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageInfo>), ApiError> {
    let Json(payload) = payload?;
    let message = MessageRepository::new(state.db.clone())
        .post(&repo_id, user.id(), payload.user_name, &payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

/// A repository's discussion, oldest first
#[utoipa::path(
    get,
    path = "/repos/{repo_id}/messages",
    params(("repo_id" = String, Path, description = "Repository id")),
    responses(
        (status = 200, description = "Messages", body = MessagesResponse)
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(repo_id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = MessageRepository::new(state.db.clone())
        .list_for_repo(&repo_id)
        .await?
        .into_iter()
        .map(MessageInfo::from)
        .collect();
    Ok(Json(MessagesResponse { messages }))
}
