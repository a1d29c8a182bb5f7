//! # Tests for Handlers
//!
//! Router-level tests against an in-memory SQLite database and a stub issue
//! source.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::handlers::root;
use crate::repositories::test_support::{insert_issue, insert_repo, setup_db};
use crate::server::{AppState, create_app};
use crate::source::{IssueSource, PageRequest, SourceError, SourcePage};

/// Source that never has any issues
struct EmptySource;

#[async_trait]
impl IssueSource for EmptySource {
    async fn fetch_page(
        &self,
        _owner: &str,
        _name: &str,
        _request: &PageRequest,
    ) -> Result<SourcePage, SourceError> {
        Ok(SourcePage::default())
    }
}

async fn test_app() -> (Router, sea_orm::DatabaseConnection) {
    let db = setup_db().await;
    let state = AppState::with_source(AppConfig::default(), db.clone(), Arc::new(EmptySource));
    (create_app(state), db)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let axum::Json(info) = root().await;
    assert_eq!(info.service, "issue-sync");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn health_reports_database_ok() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["database"], "ok");
}

#[tokio::test]
async fn responses_carry_request_id_and_cors_headers() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("X-Request-Id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn preflight_on_sync_route_short_circuits() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(request(Method::OPTIONS, "/sync", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-max-age"], "86400");
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn sync_without_repo_id_is_bad_request() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(request(Method::POST, "/", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Repository ID is required");
    assert!(body["traceId"].is_string());
}

#[tokio::test]
async fn sync_of_unknown_repo_is_not_found() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(request(
            Method::POST,
            "/sync",
            None,
            Some(json!({"repoId": "ghost"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Repository not found");
}

#[tokio::test]
async fn sync_with_no_upstream_issues_still_succeeds() {
    let (app, db) = test_app().await;
    insert_repo(&db, "r1", "octo/widgets", "alice").await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/sync",
            None,
            Some(json!({"repoId": "r1", "issueLimit": "5"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["issuesCount"], 0);
    assert_eq!(body["nextPage"], Value::Null);
    assert_eq!(body["message"], "Synced 0 issues for octo/widgets");
}

#[tokio::test]
async fn user_scoped_routes_require_user_header() {
    let (app, _db) = test_app().await;
    let response = app
        .oneshot(request(Method::GET, "/bookmarks", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn add_repository_validates_and_deduplicates() {
    let (app, _db) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/repos",
            Some("alice"),
            Some(json!({"repository": "not a repo"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Invalid repository format. Use owner/repo format"
    );

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/repos?sync=true",
            Some("alice"),
            Some(json!({"repository": "https://github.com/octo/widgets.git"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["repository"]["fullName"], "octo/widgets");
    assert_eq!(body["initialSync"]["issuesCount"], 0);
    assert_eq!(body["repository"]["lastProcessedCount"], 0);

    let response = app
        .oneshot(request(
            Method::POST,
            "/repos",
            Some("alice"),
            Some(json!({"repository": "octo/widgets"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn bookmark_and_claim_flow() {
    let (app, db) = test_app().await;
    insert_repo(&db, "r1", "octo/widgets", "alice").await;
    insert_issue(&db, "r1", 77, &["good first issue"], 0).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/bookmarks",
            Some("alice"),
            Some(json!({"issueId": "77"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            "/bookmarks/status?issueId=77",
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["bookmarked"], true);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/bookmarks", Some("alice"), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["bookmarks"][0]["repository"], "octo/widgets");

    let response = app
        .clone()
        .oneshot(request(
            Method::DELETE,
            "/bookmarks/by-issue/77",
            Some("alice"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/issues/77/claims", Some("bob"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["status"], "active");

    let response = app
        .oneshot(request(Method::GET, "/issues/77/claims", None, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["claims"][0]["userId"], "bob");
}

#[tokio::test]
async fn presence_heartbeat_lists_active_users() {
    let (app, db) = test_app().await;
    insert_repo(&db, "r1", "octo/widgets", "alice").await;

    let response = app
        .clone()
        .oneshot(request(
            Method::POST,
            "/repos/r1/presence",
            Some("alice"),
            Some(json!({"name": "Alice"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["users"][0]["userId"], "alice");
    assert_eq!(body["windowSecs"], 300);

    let response = app
        .oneshot(request(
            Method::POST,
            "/repos/ghost/presence",
            Some("alice"),
            Some(json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
