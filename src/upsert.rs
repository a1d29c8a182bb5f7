//! Batched create-or-update of fetched issues.
//!
//! Issues are written in fixed-size batches. Writes inside a batch run
//! concurrently and the batch is awaited as a whole before the next one
//! starts. The time budget is checked before every batch; once it trips the
//! remaining batches are skipped and counted as neither processed nor failed.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::budget::TimeBudget;
use crate::error::SyncError;
use crate::source::IssuePayload;
use crate::store::{StoreError, SyncStore};

/// Outcome of writing a single issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpsertResult {
    pub success: bool,
    pub number: u64,
    /// Set when an existing document was overwritten
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IssueUpsertResult {
    pub fn created(number: u64) -> Self {
        Self {
            success: true,
            number,
            updated: false,
            error: None,
        }
    }

    pub fn updated(number: u64) -> Self {
        Self {
            success: true,
            number,
            updated: true,
            error: None,
        }
    }

    pub fn failed<S: Into<String>>(number: u64, error: S) -> Self {
        Self {
            success: false,
            number,
            updated: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate over every batch that ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub processed: usize,
    pub errors: usize,
    pub batches_run: usize,
    /// True when the time budget stopped the run before all batches were attempted
    pub stopped_early: bool,
    pub results: Vec<IssueUpsertResult>,
}

impl UpsertSummary {
    fn absorb(&mut self, results: Vec<IssueUpsertResult>) {
        for result in &results {
            if result.success {
                self.processed += 1;
            } else {
                self.errors += 1;
            }
        }
        self.batches_run += 1;
        self.results.extend(results);
    }
}

/// Create an issue document, falling back to an update when it already exists.
pub async fn upsert_issue(
    store: &dyn SyncStore,
    repo_id: &str,
    issue: &IssuePayload,
) -> IssueUpsertResult {
    let outcome = match store.create_issue(repo_id, issue).await {
        Ok(()) => Ok(false),
        Err(StoreError::Conflict) => store.update_issue(repo_id, issue).await.map(|()| true),
        Err(err) => Err(err),
    };

    match outcome {
        Ok(false) => IssueUpsertResult::created(issue.number),
        Ok(true) => IssueUpsertResult::updated(issue.number),
        Err(err) => {
            let err = SyncError::Upsert {
                number: issue.number,
                message: err.to_string(),
            };
            warn!(repo_id, error = %err, "Issue write failed");
            IssueUpsertResult::failed(issue.number, err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct IssueUpserter {
    store: Arc<dyn SyncStore>,
    batch_size: usize,
}

impl IssueUpserter {
    pub fn new(store: Arc<dyn SyncStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Write one batch concurrently; results keep the batch order.
    pub async fn upsert_batch(
        &self,
        repo_id: &str,
        batch: &[IssuePayload],
    ) -> Vec<IssueUpsertResult> {
        let mut handles = Vec::with_capacity(batch.len());
        for issue in batch {
            let store = Arc::clone(&self.store);
            let repo_id = repo_id.to_string();
            let issue = issue.clone();
            let number = issue.number;
            let handle =
                tokio::spawn(async move { upsert_issue(store.as_ref(), &repo_id, &issue).await });
            handles.push((number, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (number, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(repo_id, number, error = %join_err, "Issue write task aborted");
                    IssueUpsertResult::failed(number, format!("write task failed: {}", join_err))
                }
            };
            results.push(result);
        }
        results
    }

    /// Write all issues batch by batch until done or the budget trips.
    pub async fn upsert_all(
        &self,
        repo_id: &str,
        issues: &[IssuePayload],
        budget: &TimeBudget,
    ) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for (index, batch) in issues.chunks(self.batch_size).enumerate() {
            if budget.is_approaching_limit() {
                let skipped = issues.len() - index * self.batch_size;
                info!(
                    repo_id,
                    skipped,
                    elapsed_ms = budget.elapsed_ms() as u64,
                    "Time budget reached, skipping remaining issue batches"
                );
                summary.stopped_early = true;
                break;
            }

            let results = self.upsert_batch(repo_id, batch).await;
            debug!(repo_id, batch = index + 1, size = batch.len(), "Issue batch written");
            summary.absorb(results);
        }

        summary
    }
}
