//! # Error Handling
//!
//! Unified error handling for the issue sync service. Every failed request is
//! answered with `{"success": false, "message": ..., "error": ...}` and a
//! correlation id, matching the shape of successful sync reports.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::source::SourceError;
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Always `false`; lets callers branch on the same field as success bodies
    pub success: bool,
    /// Human-readable error message
    pub message: Box<str>,
    /// Underlying cause, when one is worth surfacing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Box<str>>,
    /// Elapsed time before the failure, formatted as `<ms>ms`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<String>,
    /// Correlation trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            success: false,
            message: message.into().into_boxed_str(),
            error: None,
            execution_time: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Attach the underlying cause
    pub fn with_error<S: Into<String>>(mut self, error: S) -> Self {
        self.error = Some(error.into().into_boxed_str());
        self
    }

    /// Attach the elapsed time in milliseconds
    pub fn with_execution_time(mut self, elapsed_ms: u128) -> Self {
        self.execution_time = Some(format!("{}ms", elapsed_ms));
        self
    }

    /// Extract current trace ID from the request context (falls back to generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(self)).into_response()
    }
}

/// Failure kinds of a sync invocation.
///
/// `Input`, `NotFound` and `Fatal` abort the invocation. `SourceFetch` and
/// `Upsert` are recovered inside the pipeline and only ever logged and counted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{message}")]
    Input {
        message: String,
        detail: Option<String>,
    },

    #[error("{message}")]
    NotFound {
        message: String,
        detail: Option<String>,
    },

    #[error("issue source request failed: {0}")]
    SourceFetch(#[from] SourceError),

    #[error("failed to persist issue #{number}: {message}")]
    Upsert { number: u64, message: String },

    #[error("{message}")]
    Fatal {
        message: String,
        elapsed_ms: Option<u128>,
    },
}

impl SyncError {
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
            detail: None,
        }
    }

    pub fn input_with_detail<S: Into<String>, D: Into<String>>(message: S, detail: D) -> Self {
        Self::Input {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
            detail: None,
        }
    }

    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal {
            message: message.into(),
            elapsed_ms: None,
        }
    }

    /// Stamp a fatal error with the elapsed time; other kinds are returned unchanged.
    pub fn with_elapsed(self, elapsed_ms: u128) -> Self {
        match self {
            Self::Fatal { message, .. } => Self::Fatal {
                message,
                elapsed_ms: Some(elapsed_ms),
            },
            other => other,
        }
    }

    /// Stable kind label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::NotFound { .. } => "not_found",
            Self::SourceFetch(_) => "source_fetch",
            Self::Upsert { .. } => "upsert",
            Self::Fatal { .. } => "fatal",
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Input { message, detail } => {
                let api_error = ApiError::new(StatusCode::BAD_REQUEST, message);
                match detail {
                    Some(detail) => api_error.with_error(detail),
                    None => api_error,
                }
            }
            SyncError::NotFound { message, detail } => {
                let api_error = ApiError::new(StatusCode::NOT_FOUND, message);
                match detail {
                    Some(detail) => api_error.with_error(detail),
                    None => api_error,
                }
            }
            // Recovered inside the orchestrator; `SyncOrchestrator::run` never returns these.
            recovered @ (SyncError::SourceFetch(_) | SyncError::Upsert { .. }) => {
                tracing::error!(
                    kind = recovered.kind(),
                    error = %recovered,
                    "Recoverable sync error escaped the pipeline"
                );
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected error occurred",
                )
            }
            SyncError::Fatal {
                message,
                elapsed_ms,
            } => {
                let api_error = ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message.clone())
                    .with_error(message);
                match elapsed_ms {
                    Some(ms) => api_error.with_execution_time(ms),
                    None => api_error,
                }
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unexpected error occurred",
        )
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = match &rejection {
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => rejection.body_text(),
        };

        ApiError::new(StatusCode::BAD_REQUEST, "Invalid JSON in request body").with_error(detail)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return ApiError::new(StatusCode::CONFLICT, "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("Record not found: {}", record))
            }
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred",
                )
            }
        }
    }
}

/// True when the database rejected a write because of a primary-key or unique index clash.
pub(crate) fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error.code().is_some_and(|code| {
        let code_str = code.as_ref();
        code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str)
    })
}

/// Create a bad request error (400)
pub fn bad_request(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, message)
}

/// Create a validation error carrying the offending field description
pub fn validation_error(message: &str, detail: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, message).with_error(detail)
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, msg)
}

/// Create a forbidden error (403)
pub fn forbidden(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Insufficient permissions");
    ApiError::new(StatusCode::FORBIDDEN, msg)
}

/// Create a not found error (404)
pub fn not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, message)
}

/// Create a conflict error (409)
pub fn conflict(message: &str) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, message)
}
