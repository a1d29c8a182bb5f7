//! # Claim Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, UserHeader};
use crate::error::ApiError;
use crate::models::claim;
use crate::repositories::ClaimRepository;
use crate::server::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimInfo {
    pub id: String,
    pub user_id: String,
    pub issue_id: String,
    pub status: String,
    pub claimed_at: String,
}

impl From<claim::Model> for ClaimInfo {
    fn from(model: claim::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            issue_id: model.issue_id,
            status: model.status,
            claimed_at: model.claimed_at.with_timezone(&Utc).to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimsResponse {
    pub claims: Vec<ClaimInfo>,
}

/// Claim an issue for the caller
#[utoipa::path(
    post,
    path = "/issues/{issue_id}/claims",
    params(UserHeader, ("issue_id" = String, Path, description = "Issue id")),
    responses(
        (status = 201, description = "Issue claimed", body = ClaimInfo),
        (status = 404, description = "Issue not found", body = ApiError)
    ),
    tag = "claims"
)]
pub async fn claim_issue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(issue_id): Path<String>,
) -> Result<(StatusCode, Json<ClaimInfo>), ApiError> {
    let claim = ClaimRepository::new(state.db.clone())
        .claim(user.id(), &issue_id)
        .await?;
    Ok((StatusCode::CREATED, Json(claim.into())))
}

/// Claims on an issue, oldest first
#[utoipa::path(
    get,
    path = "/issues/{issue_id}/claims",
    params(("issue_id" = String, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Claims", body = ClaimsResponse)
    ),
    tag = "claims"
)]
pub async fn list_claims(
    State(state): State<AppState>,
    Path(issue_id): Path<String>,
) -> Result<Json<ClaimsResponse>, ApiError> {
    let claims = ClaimRepository::new(state.db.clone())
        .claims_for_issue(&issue_id)
        .await?
        .into_iter()
        .map(ClaimInfo::from)
        .collect();
    Ok(Json(ClaimsResponse { claims }))
}
