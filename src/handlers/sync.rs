//! # Sync Invocation Handler
//!
//! Accepts `{"repoId": "...", "issueLimit": 10}` and runs one sync. The body
//! is parsed by hand so an empty body counts as `{}` and malformed JSON is
//! reported with the parser's message.

use axum::{body::Bytes, extract::State, response::Json};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ApiError, SyncError};
use crate::server::AppState;
use crate::sync::{SyncReport, SyncRequest};

/// Request body for a sync invocation
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncInvocation {
    /// Id of the tracked repository
    pub repo_id: String,
    /// Maximum issues to process (positive integer or numeric string; default 10)
    #[schema(value_type = Option<u32>, example = 10)]
    pub issue_limit: Option<Value>,
}

/// Validate a raw invocation body.
pub fn parse_invocation(body: &[u8]) -> Result<SyncRequest, SyncError> {
    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|e| {
            SyncError::input_with_detail("Invalid JSON in request body", e.to_string())
        })?
    };

    let repo_id = payload
        .get("repoId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SyncError::input("Repository ID is required"))?;

    let issue_limit = match payload.get("issueLimit") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_issue_limit(value)?),
    };

    Ok(SyncRequest {
        repo_id: repo_id.to_string(),
        issue_limit,
    })
}

fn parse_issue_limit(value: &Value) -> Result<u32, SyncError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .filter(|limit| *limit > 0)
        .and_then(|limit| u32::try_from(limit).ok())
        .ok_or_else(|| {
            SyncError::input_with_detail(
                "Invalid issueLimit",
                "issueLimit must be a positive integer",
            )
        })
}

/// Run one issue sync for a repository
#[utoipa::path(
    post,
    path = "/sync",
    request_body = SyncInvocation,
    responses(
        (status = 200, description = "Sync completed", body = SyncReport, example = json!({
            "success": true,
            "repository": "octo/widgets",
            "issuesCount": 10,
            "errorsCount": 0,
            "totalFetched": 10,
            "executionTime": "1432ms",
            "nextPage": null,
            "message": "Synced 10 issues for octo/widgets"
        })),
        (status = 400, description = "Invalid body or missing repository id", body = ApiError),
        (status = 404, description = "Repository not found", body = ApiError),
        (status = 500, description = "Fatal sync failure", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn invoke_sync(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SyncReport>, ApiError> {
    let request = parse_invocation(&body)?;
    let run = state.sync.run(request).await?;
    Ok(Json(run.report))
}
