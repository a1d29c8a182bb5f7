//! Caller identity.
//!
//! Authentication happens upstream of this service; the gateway forwards the
//! authenticated user's id in `X-User-Id`. Endpoints that act on behalf of a
//! user extract it with [`CurrentUser`].

use axum::{
    extract::FromRequestParts,
    http::{HeaderName, request::Parts},
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::error::{ApiError, unauthorized};

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

const MAX_USER_ID_LEN: usize = 128;

/// Id of the user making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// OpenAPI header parameter for X-User-Id
#[derive(Debug, Serialize, Deserialize, IntoParams, utoipa::ToSchema)]
#[into_params(parameter_in = Header)]
pub struct UserHeader {
    /// Authenticated user id forwarded by the gateway
    #[serde(rename = "X-User-Id")]
    #[param(rename = "X-User-Id", value_type = String)]
    pub user_id: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(&USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= MAX_USER_ID_LEN)
            .map(|value| CurrentUser(value.to_string()))
            .ok_or_else(|| unauthorized(Some("Missing or invalid X-User-Id header")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<CurrentUser, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("X-User-Id", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_trimmed_user_id() {
        let user = extract(Some("  alice ")).await.unwrap();
        assert_eq!(user.id(), "alice");
    }

    #[tokio::test]
    async fn missing_or_blank_header_is_unauthorized() {
        for header in [None, Some(""), Some("   ")] {
            let err = extract(header).await.unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
        let long = "u".repeat(MAX_USER_ID_LEN + 1);
        assert!(extract(Some(&long)).await.is_err());
    }
}
