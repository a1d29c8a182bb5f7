//! Test utilities for integration tests.
//!
//! In-memory SQLite with migrations applied, repository fixtures and a
//! configuration pointed at a mock GitHub API.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use issue_sync::config::AppConfig;
use issue_sync::models::repo;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::{Value, json};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Inserts a tracked repository row.
#[allow(dead_code)]
pub async fn insert_repo(
    db: &DatabaseConnection,
    id: &str,
    full_name: &str,
    added_by: &str,
) -> Result<repo::Model> {
    let (owner, name) = full_name
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("full name must be owner/name"))?;
    let now = Utc::now().fixed_offset();
    let model = repo::ActiveModel {
        id: Set(id.to_string()),
        owner: Set(owner.to_string()),
        name: Set(name.to_string()),
        full_name: Set(full_name.to_string()),
        added_by: Set(added_by.to_string()),
        last_synced_at: Set(None),
        last_processed_count: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(model)
}

/// Configuration whose GitHub source points at `api_base` (a wiremock uri).
#[allow(dead_code)]
pub fn test_config(api_base: &str, labels_filter: &[&str]) -> AppConfig {
    let mut config = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        ..AppConfig::default()
    };
    config.github.api_base = api_base.trim_end_matches('/').to_string();
    config.github.labels_filter = labels_filter.iter().map(|l| l.to_string()).collect();
    config.github.request_timeout_ms = 2_000;
    config
}

/// A GitHub REST issue object. `id` doubles as the issue number offset.
#[allow(dead_code)]
pub fn github_issue(id: u64, labels: &[&str]) -> Value {
    let created: DateTime<Utc> = Utc::now() - Duration::hours(id as i64);
    json!({
        "id": 9_000 + id,
        "number": id,
        "title": format!("Issue {id}"),
        "body": format!("Body of issue {id}"),
        "state": "open",
        "created_at": created.to_rfc3339(),
        "updated_at": null,
        "html_url": format!("https://github.com/octo/demo/issues/{id}"),
        "labels": labels
            .iter()
            .map(|name| json!({ "name": name, "color": "7057ff" }))
            .collect::<Vec<_>>(),
    })
}

/// A pull request as it appears in the issues listing.
#[allow(dead_code)]
pub fn github_pull_request(id: u64, labels: &[&str]) -> Value {
    let mut value = github_issue(id, labels);
    value["pull_request"] = json!({
        "url": format!("https://api.github.com/repos/octo/demo/pulls/{id}")
    });
    value
}
