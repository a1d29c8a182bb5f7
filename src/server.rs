//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop for the issue sync API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::cors::cors_middleware;
use crate::handlers;
use crate::presence::PresenceTracker;
use crate::source::{GitHubApiConfig, GitHubIssueSource, IssueSource, SourceError};
use crate::store::DbSyncStore;
use crate::sync::SyncOrchestrator;
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub sync: Arc<SyncOrchestrator>,
    pub presence: Arc<PresenceTracker>,
}

impl AppState {
    /// Build state backed by the GitHub issue source from `config`.
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Result<Self, SourceError> {
        let source = GitHubIssueSource::new(GitHubApiConfig::from_config(&config.github))?;
        Ok(Self::with_source(config, db, Arc::new(source)))
    }

    pub fn with_source(
        config: AppConfig,
        db: DatabaseConnection,
        source: Arc<dyn IssueSource>,
    ) -> Self {
        let store = Arc::new(DbSyncStore::new(db.clone()));
        let sync = Arc::new(SyncOrchestrator::new(store, source, config.sync.clone()));
        let presence = Arc::new(PresenceTracker::from_config(&config.presence));

        Self {
            config: Arc::new(config),
            db,
            sync,
            presence,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root).post(handlers::sync::invoke_sync))
        .route("/sync", post(handlers::sync::invoke_sync))
        .route("/health", get(handlers::health))
        .route(
            "/repos",
            get(handlers::repos::list_repositories).post(handlers::repos::add_repository),
        )
        .route(
            "/repos/{repo_id}",
            get(handlers::repos::get_repository).delete(handlers::repos::delete_repository),
        )
        .route("/repos/{repo_id}/issues", get(handlers::issues::list_issues))
        .route("/repos/{repo_id}/labels", get(handlers::issues::list_labels))
        .route(
            "/repos/{repo_id}/messages",
            get(handlers::messages::list_messages).post(handlers::messages::post_message),
        )
        .route(
            "/repos/{repo_id}/presence",
            get(handlers::presence::list_presence)
                .post(handlers::presence::heartbeat)
                .delete(handlers::presence::leave),
        )
        .route(
            "/bookmarks",
            get(handlers::bookmarks::list_bookmarks).post(handlers::bookmarks::create_bookmark),
        )
        .route("/bookmarks/status", get(handlers::bookmarks::bookmark_status))
        .route(
            "/bookmarks/{bookmark_id}",
            delete(handlers::bookmarks::remove_bookmark),
        )
        .route(
            "/bookmarks/by-issue/{issue_id}",
            delete(handlers::bookmarks::remove_bookmark_by_issue),
        )
        .route(
            "/issues/{issue_id}/claims",
            get(handlers::claims::list_claims).post(handlers::claims::claim_issue),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(cors_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("Invalid server address")?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db).context("Failed to build GitHub issue source")?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::sync::invoke_sync,
        crate::handlers::repos::add_repository,
        crate::handlers::repos::list_repositories,
        crate::handlers::repos::get_repository,
        crate::handlers::repos::delete_repository,
        crate::handlers::issues::list_issues,
        crate::handlers::issues::list_labels,
        crate::handlers::bookmarks::create_bookmark,
        crate::handlers::bookmarks::list_bookmarks,
        crate::handlers::bookmarks::bookmark_status,
        crate::handlers::bookmarks::remove_bookmark,
        crate::handlers::bookmarks::remove_bookmark_by_issue,
        crate::handlers::claims::claim_issue,
        crate::handlers::claims::list_claims,
        crate::handlers::messages::post_message,
        crate::handlers::messages::list_messages,
        crate::handlers::presence::heartbeat,
        crate::handlers::presence::list_presence,
        crate::handlers::presence::leave,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthStatus,
            crate::handlers::sync::SyncInvocation,
            crate::sync::SyncReport,
            crate::upsert::IssueUpsertResult,
            crate::handlers::repos::AddRepositoryRequest,
            crate::handlers::repos::AddRepositoryResponse,
            crate::handlers::repos::RepoInfo,
            crate::handlers::repos::RepositoriesResponse,
            crate::handlers::repos::DeleteRepositoryResponse,
            crate::handlers::issues::IssueInfo,
            crate::handlers::issues::IssuesResponse,
            crate::handlers::issues::LabelsResponse,
            crate::repositories::LabelCount,
            crate::repositories::BookmarkDetails,
            crate::handlers::bookmarks::CreateBookmarkRequest,
            crate::handlers::bookmarks::BookmarkInfo,
            crate::handlers::bookmarks::BookmarkStatus,
            crate::handlers::bookmarks::BookmarksResponse,
            crate::handlers::bookmarks::RemovedResponse,
            crate::handlers::claims::ClaimInfo,
            crate::handlers::claims::ClaimsResponse,
            crate::handlers::messages::PostMessageRequest,
            crate::handlers::messages::MessageInfo,
            crate::handlers::messages::MessagesResponse,
            crate::handlers::presence::HeartbeatRequest,
            crate::handlers::presence::PresenceResponse,
            crate::presence::ActiveUser,
        )
    ),
    tags(
        (name = "root", description = "Service information"),
        (name = "sync", description = "Repository issue synchronization"),
        (name = "repositories", description = "Tracked repositories"),
        (name = "issues", description = "Synced issues"),
        (name = "bookmarks", description = "Saved issues"),
        (name = "claims", description = "Issue claims"),
        (name = "messages", description = "Repository discussion"),
        (name = "presence", description = "Active viewers")
    ),
    info(
        title = "Issue Sync API",
        description = "Aggregates beginner-friendly GitHub issues for tracked repositories",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
