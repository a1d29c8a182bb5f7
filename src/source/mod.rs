//! # Issue Sources
//!
//! An issue source turns one page request against an upstream repository into
//! normalized [`IssuePayload`]s. Pull requests and issues without an allowed
//! label are dropped before the page is returned; `raw_count` keeps the size
//! of the unfiltered page so callers can tell when upstream ran dry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub mod github;

pub use github::{GitHubApiConfig, GitHubIssue, GitHubIssueSource, GitHubLabel};

/// Errors surfaced by an issue source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("rate limited by upstream (resets at {reset_at:?})")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Sort key accepted by the issues listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Created,
    Updated,
    Comments,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Created => "created",
            SortKey::Updated => "updated",
            SortKey::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One page of open issues, most recently updated first by default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page index
    pub page: u32,
    pub per_page: u32,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            sort: SortKey::Updated,
            direction: SortDirection::Desc,
        }
    }
}

/// Issue record normalized for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePayload {
    pub source_issue_id: u64,
    pub number: u64,
    pub title: String,
    /// Empty when upstream has no body
    pub body: String,
    pub state: String,
    /// Label names in upstream order
    pub labels: Vec<String>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssuePayload {
    /// Stable document id for the issue within `repo_id`.
    ///
    /// Several tracked repositories may point at the same upstream repository,
    /// so the id is scoped by the owning repository.
    pub fn document_id(&self, repo_id: &str) -> String {
        format!("{}_{}", repo_id, self.source_issue_id)
    }
}

/// A fetched page after filtering
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    /// Number of items upstream returned before any filtering
    pub raw_count: usize,
    /// Eligible issues in upstream order
    pub issues: Vec<IssuePayload>,
}

/// Upstream issue tracker
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetch one page of open issues for `owner/name`.
    async fn fetch_page(
        &self,
        owner: &str,
        name: &str,
        request: &PageRequest,
    ) -> Result<SourcePage, SourceError>;
}
