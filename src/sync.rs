//! # Repository Issue Sync
//!
//! One invocation walks four phases in order:
//!
//! 1. **Resolve** the repository record, failing with `NotFound` if absent.
//! 2. **Paginate** the upstream source, accumulating eligible issues until the
//!    limit, the page cap, an empty page, a fetch error or the time budget
//!    stops it.
//! 3. **Process** the accumulated issues in batches through the upserter.
//! 4. **Finalize** the repository's sync metadata, but only while the budget
//!    still has room.
//!
//! A fetch error mid-pagination ends pagination and the issues gathered so
//! far are still written. Individual write failures are counted, never
//! raised.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::budget::TimeBudget;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::repo;
use crate::source::{IssuePayload, IssueSource, PageRequest};
use crate::store::SyncStore;
use crate::upsert::{IssueUpsertResult, IssueUpserter};

/// Validated invocation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub repo_id: String,
    /// Maximum number of issues to process; the configured default when absent
    pub issue_limit: Option<u32>,
}

impl SyncRequest {
    pub fn new<S: Into<String>>(repo_id: S) -> Self {
        Self {
            repo_id: repo_id.into(),
            issue_limit: None,
        }
    }

    pub fn with_issue_limit(mut self, limit: u32) -> Self {
        self.issue_limit = Some(limit);
        self
    }
}

/// Response body of a successful sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success: bool,
    /// `owner/name`
    pub repository: String,
    /// Issues written successfully
    pub issues_count: usize,
    /// Issues whose write failed
    pub errors_count: usize,
    /// Eligible issues gathered before processing
    pub total_fetched: usize,
    /// Wall time as `<ms>ms`
    pub execution_time: String,
    /// Page to resume from, or null when upstream is exhausted or a cap was hit
    pub next_page: Option<u32>,
    pub message: String,
}

/// Everything a run produced; the report is what callers see
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub report: SyncReport,
    pub budget_exhausted: bool,
    pub metadata_recorded: bool,
    pub results: Vec<IssueUpsertResult>,
}

#[derive(Debug, Default)]
struct Pagination {
    issues: Vec<IssuePayload>,
    has_more: bool,
    page: u32,
}

impl Pagination {
    fn next_page(&self) -> Option<u32> {
        self.has_more.then_some(self.page)
    }
}

pub struct SyncOrchestrator {
    store: Arc<dyn SyncStore>,
    source: Arc<dyn IssueSource>,
    upserter: IssueUpserter,
    settings: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn SyncStore>, source: Arc<dyn IssueSource>, settings: SyncConfig) -> Self {
        let upserter = IssueUpserter::new(Arc::clone(&store), settings.upsert_batch_size);
        Self {
            store,
            source,
            upserter,
            settings,
        }
    }

    /// Run a sync with a fresh budget from the configured window.
    pub async fn run(&self, request: SyncRequest) -> Result<SyncRun, SyncError> {
        let budget = TimeBudget::from_config(&self.settings);
        self.run_with_budget(request, budget).await
    }

    #[instrument(skip(self, budget), fields(repo_id = %request.repo_id))]
    pub async fn run_with_budget(
        &self,
        request: SyncRequest,
        budget: TimeBudget,
    ) -> Result<SyncRun, SyncError> {
        let result = self.execute(&request, &budget).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        counter!("issue_sync_runs_total", "outcome" => outcome).increment(1);
        histogram!("issue_sync_duration_seconds").record(budget.elapsed().as_secs_f64());

        if let Err(err) = &result {
            warn!(error = %err, kind = err.kind(), "Issue sync failed");
        }
        result
    }

    async fn execute(&self, request: &SyncRequest, budget: &TimeBudget) -> Result<SyncRun, SyncError> {
        let limit = request
            .issue_limit
            .unwrap_or(self.settings.default_issue_limit) as usize;

        let repo = match self.store.find_repo(&request.repo_id).await {
            Ok(Some(repo)) => repo,
            Ok(None) => {
                return Err(SyncError::NotFound {
                    message: "Repository not found".to_string(),
                    detail: Some(format!("No repository with id {}", request.repo_id)),
                });
            }
            Err(err) => {
                return Err(SyncError::fatal(format!("Failed to load repository: {}", err))
                    .with_elapsed(budget.elapsed_ms()));
            }
        };
        let full_name = format!("{}/{}", repo.owner, repo.name);
        info!(repository = %full_name, limit, "Starting issue sync");

        let pagination = self.paginate(&repo, limit, budget).await;
        let total_fetched = pagination.issues.len();

        let summary = self
            .upserter
            .upsert_all(&repo.id, &pagination.issues, budget)
            .await;
        counter!("issue_sync_issues_processed_total").increment(summary.processed as u64);
        counter!("issue_sync_issues_errored_total").increment(summary.errors as u64);

        let budget_exhausted = budget.is_approaching_limit();
        let metadata_recorded = if budget_exhausted {
            counter!("issue_sync_budget_exhausted_total").increment(1);
            info!(
                repository = %full_name,
                elapsed_ms = budget.elapsed_ms() as u64,
                "Time budget reached, leaving sync metadata untouched"
            );
            false
        } else {
            match self
                .store
                .record_sync(&repo.id, Utc::now(), summary.processed)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    warn!(repository = %full_name, error = %err, "Failed to record sync metadata");
                    false
                }
            }
        };

        let report = SyncReport {
            success: true,
            repository: full_name.clone(),
            issues_count: summary.processed,
            errors_count: summary.errors,
            total_fetched,
            execution_time: format!("{}ms", budget.elapsed_ms()),
            next_page: pagination.next_page(),
            message: format!("Synced {} issues for {}", summary.processed, full_name),
        };

        info!(
            repository = %full_name,
            processed = report.issues_count,
            errors = report.errors_count,
            fetched = report.total_fetched,
            next_page = ?report.next_page,
            "Issue sync finished"
        );

        Ok(SyncRun {
            report,
            budget_exhausted,
            metadata_recorded,
            results: summary.results,
        })
    }

    async fn paginate(&self, repo: &repo::Model, limit: usize, budget: &TimeBudget) -> Pagination {
        let page_size = self.settings.page_size;
        let max_pages = self.settings.max_pages;
        let mut state = Pagination {
            issues: Vec::new(),
            has_more: true,
            page: 1,
        };

        while state.has_more && !budget.is_approaching_limit() && state.page <= max_pages {
            let request = PageRequest::new(state.page, page_size);
            let fetched = match self.source.fetch_page(&repo.owner, &repo.name, &request).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    let err = SyncError::from(err);
                    warn!(page = state.page, error = %err, "Stopping pagination after fetch error");
                    break;
                }
            };

            debug!(
                page = state.page,
                raw = fetched.raw_count,
                eligible = fetched.issues.len(),
                "Fetched issue page"
            );

            if fetched.issues.is_empty() {
                state.has_more = false;
                break;
            }

            state.issues.extend(fetched.issues);
            if state.issues.len() >= limit {
                state.issues.truncate(limit);
                state.has_more = false;
                break;
            }

            if fetched.raw_count < page_size as usize {
                state.has_more = false;
            }

            state.page += 1;
            if state.page > max_pages {
                state.has_more = false;
            }
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceError, SourcePage};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves scripted pages in order and records the requests it saw.
    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<SourcePage, SourceError>>>,
        requests: Mutex<Vec<PageRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<SourcePage, SourceError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        fn requested_pages(&self) -> Vec<u32> {
            self.requests.lock().unwrap().iter().map(|r| r.page).collect()
        }
    }

    #[async_trait]
    impl IssueSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _owner: &str,
            _name: &str,
            request: &PageRequest,
        ) -> Result<SourcePage, SourceError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SourcePage::default()))
        }
    }

    fn page(range: std::ops::RangeInclusive<u64>, raw_count: usize) -> Result<SourcePage, SourceError> {
        Ok(SourcePage {
            raw_count,
            issues: range
                .map(|n| IssuePayload {
                    source_issue_id: 50_000 + n,
                    number: n,
                    title: format!("Issue {}", n),
                    body: String::new(),
                    state: "open".to_string(),
                    labels: vec!["good first issue".to_string()],
                    html_url: format!("https://github.com/octo/widgets/issues/{}", n),
                    created_at: Utc::now(),
                    updated_at: None,
                })
                .collect(),
        })
    }

    fn orchestrator(store: Arc<MemoryStore>, source: Arc<ScriptedSource>, settings: SyncConfig) -> SyncOrchestrator {
        SyncOrchestrator::new(store, source, settings)
    }

    fn multi_page_settings() -> SyncConfig {
        SyncConfig {
            max_pages: 5,
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn limit_truncates_and_clears_next_page() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![page(1..=12, 50)]));
        let sync = orchestrator(store.clone(), source.clone(), SyncConfig::default());

        let run = sync
            .run(SyncRequest::new("r1").with_issue_limit(10))
            .await
            .unwrap();

        assert_eq!(run.report.total_fetched, 10);
        assert_eq!(run.report.issues_count, 10);
        assert_eq!(run.report.errors_count, 0);
        assert_eq!(run.report.next_page, None);
        assert_eq!(run.report.repository, "octo/widgets");
        assert_eq!(run.report.message, "Synced 10 issues for octo/widgets");
        assert!(run.report.execution_time.ends_with("ms"));
        assert!(run.metadata_recorded);
        assert_eq!(
            *store.recorded.lock().unwrap(),
            vec![("r1".to_string(), 10)]
        );
        assert_eq!(source.requested_pages(), vec![1]);
    }

    #[tokio::test]
    async fn default_limit_applies_when_absent() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![page(1..=30, 50)]));
        let sync = orchestrator(store, source, SyncConfig::default());

        let run = sync.run(SyncRequest::new("r1")).await.unwrap();
        assert_eq!(run.report.total_fetched, 10);
    }

    #[tokio::test]
    async fn page_cap_stops_pagination() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![page(1..=50, 50), page(51..=100, 50)]));
        let sync = orchestrator(store, source.clone(), SyncConfig::default());

        let run = sync
            .run(SyncRequest::new("r1").with_issue_limit(500))
            .await
            .unwrap();

        assert_eq!(source.requested_pages(), vec![1]);
        assert_eq!(run.report.total_fetched, 50);
        assert_eq!(run.report.next_page, None);
    }

    #[tokio::test]
    async fn short_raw_page_ends_pagination() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![page(1..=3, 50), page(4..=50, 20)]));
        let sync = orchestrator(store, source.clone(), multi_page_settings());

        let run = sync
            .run(SyncRequest::new("r1").with_issue_limit(500))
            .await
            .unwrap();

        assert_eq!(source.requested_pages(), vec![1, 2]);
        assert_eq!(run.report.total_fetched, 50);
        assert_eq!(run.report.next_page, None);
    }

    #[tokio::test]
    async fn empty_filtered_page_stops_and_still_records_metadata() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![Ok(SourcePage {
            raw_count: 50,
            issues: vec![],
        })]));
        let sync = orchestrator(store.clone(), source.clone(), multi_page_settings());

        let run = sync.run(SyncRequest::new("r1")).await.unwrap();

        assert_eq!(source.requested_pages(), vec![1]);
        assert_eq!(run.report.issues_count, 0);
        assert_eq!(run.report.total_fetched, 0);
        assert_eq!(run.report.message, "Synced 0 issues for octo/widgets");
        assert_eq!(store.create_calls(), 0);
        assert_eq!(*store.recorded.lock().unwrap(), vec![("r1".to_string(), 0)]);
    }

    #[tokio::test]
    async fn fetch_error_keeps_gathered_issues_and_resumes_at_failed_page() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![
            page(1..=50, 50),
            Err(SourceError::Status {
                status: 502,
                message: "bad gateway".to_string(),
            }),
        ]));
        let sync = orchestrator(store.clone(), source, multi_page_settings());

        let run = sync
            .run(SyncRequest::new("r1").with_issue_limit(100))
            .await
            .unwrap();

        assert!(run.report.success);
        assert_eq!(run.report.issues_count, 50);
        assert_eq!(run.report.next_page, Some(2));
        assert_eq!(store.issues.lock().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn write_failures_are_counted_not_raised() {
        let mut store = MemoryStore::with_repo("r1", "octo", "widgets");
        store.failing_numbers.insert(7);
        let store = Arc::new(store);
        let source = Arc::new(ScriptedSource::new(vec![page(1..=10, 10)]));
        let sync = orchestrator(store.clone(), source, SyncConfig::default());

        let run = sync.run(SyncRequest::new("r1")).await.unwrap();

        assert_eq!(run.report.issues_count, 9);
        assert_eq!(run.report.errors_count, 1);
        assert_eq!(run.report.total_fetched, 10);
        assert_eq!(*store.recorded.lock().unwrap(), vec![("r1".to_string(), 9)]);
    }

    #[tokio::test]
    async fn second_run_updates_instead_of_duplicating() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource::new(vec![page(1..=5, 5), page(1..=5, 5)]));
        let sync = orchestrator(store.clone(), source, SyncConfig::default());

        sync.run(SyncRequest::new("r1")).await.unwrap();
        let second = sync.run(SyncRequest::new("r1")).await.unwrap();

        assert_eq!(second.report.issues_count, 5);
        assert!(second.results.iter().all(|r| r.updated));
        assert_eq!(store.issues.lock().unwrap().len(), 5);
        assert_eq!(store.update_calls(), 5);
    }

    #[tokio::test]
    async fn missing_repository_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let source = Arc::new(ScriptedSource::new(vec![]));
        let sync = orchestrator(store, source.clone(), SyncConfig::default());

        let err = sync.run(SyncRequest::new("ghost")).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { ref message, .. } if message == "Repository not found"));
        assert!(source.requested_pages().is_empty());
    }

    #[tokio::test]
    async fn store_failure_during_resolve_is_fatal() {
        let store = Arc::new(MemoryStore {
            fail_find: true,
            ..MemoryStore::default()
        });
        let source = Arc::new(ScriptedSource::new(vec![]));
        let sync = orchestrator(store, source, SyncConfig::default());

        let err = sync.run(SyncRequest::new("r1")).await.unwrap_err();
        assert!(matches!(err, SyncError::Fatal { elapsed_ms: Some(_), .. }));
    }

    #[tokio::test]
    async fn metadata_write_failure_is_swallowed() {
        let store = Arc::new(MemoryStore {
            fail_record: true,
            ..MemoryStore::with_repo("r1", "octo", "widgets")
        });
        let source = Arc::new(ScriptedSource::new(vec![page(1..=2, 2)]));
        let sync = orchestrator(store, source, SyncConfig::default());

        let run = sync.run(SyncRequest::new("r1")).await.unwrap();
        assert!(run.report.success);
        assert!(!run.metadata_recorded);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_trips_budget_and_skips_processing() {
        let store = Arc::new(MemoryStore::with_repo("r1", "octo", "widgets"));
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_secs(21)),
            ..ScriptedSource::new(vec![page(1..=50, 50), page(51..=100, 50)])
        });
        let sync = orchestrator(store.clone(), source.clone(), multi_page_settings());

        let run = sync
            .run(SyncRequest::new("r1").with_issue_limit(100))
            .await
            .unwrap();

        assert_eq!(source.requested_pages(), vec![1]);
        assert_eq!(run.report.total_fetched, 50);
        assert_eq!(run.report.issues_count, 0);
        assert_eq!(run.report.errors_count, 0);
        assert_eq!(run.report.next_page, Some(2));
        assert!(run.budget_exhausted);
        assert!(!run.metadata_recorded);
        assert!(store.recorded.lock().unwrap().is_empty());
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_trip_between_batches_skips_metadata() {
        let store = Arc::new(MemoryStore {
            write_delay: Some(Duration::from_secs(12)),
            ..MemoryStore::with_repo("r1", "octo", "widgets")
        });
        let source = Arc::new(ScriptedSource::new(vec![page(1..=30, 50)]));
        let sync = orchestrator(store.clone(), source, SyncConfig::default());

        let run = sync
            .run(SyncRequest::new("r1").with_issue_limit(30))
            .await
            .unwrap();

        // Two batches fit before 20s elapse; the third is skipped.
        assert_eq!(run.report.issues_count, 20);
        assert_eq!(run.report.total_fetched, 30);
        assert!(run.budget_exhausted);
        assert!(store.recorded.lock().unwrap().is_empty());
    }

    #[test]
    fn report_serializes_with_camel_case_and_null_next_page() {
        let report = SyncReport {
            success: true,
            repository: "octo/widgets".to_string(),
            issues_count: 3,
            errors_count: 1,
            total_fetched: 4,
            execution_time: "120ms".to_string(),
            next_page: None,
            message: "Synced 3 issues for octo/widgets".to_string(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "success": true,
                "repository": "octo/widgets",
                "issuesCount": 3,
                "errorsCount": 1,
                "totalFetched": 4,
                "executionTime": "120ms",
                "nextPage": null,
                "message": "Synced 3 issues for octo/widgets"
            })
        );
    }
}
