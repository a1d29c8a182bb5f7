//! Document store seam used by the sync pipeline.
//!
//! Issues are written with a create-then-update protocol keyed on the issue's
//! document id. A create against an existing id fails with
//! [`StoreError::Conflict`], which callers answer with an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::error::is_unique_violation;
use crate::models::{issue, repo};
use crate::source::IssuePayload;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document already exists")]
    Conflict,

    #[error("document not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for StoreError {
    fn from(error: DbErr) -> Self {
        if is_unique_violation(&error) {
            return StoreError::Conflict;
        }
        match error {
            DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

/// Persistence operations the sync pipeline needs
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn find_repo(&self, repo_id: &str) -> Result<Option<repo::Model>, StoreError>;

    /// Insert a new issue document; [`StoreError::Conflict`] when the id is taken.
    async fn create_issue(&self, repo_id: &str, issue: &IssuePayload) -> Result<(), StoreError>;

    /// Overwrite the mutable fields of an existing issue document.
    async fn update_issue(&self, repo_id: &str, issue: &IssuePayload) -> Result<(), StoreError>;

    /// Stamp the repository with the outcome of a completed sync.
    async fn record_sync(
        &self,
        repo_id: &str,
        synced_at: DateTime<Utc>,
        processed: usize,
    ) -> Result<(), StoreError>;
}

/// SeaORM-backed store
#[derive(Clone)]
pub struct DbSyncStore {
    db: DatabaseConnection,
}

impl DbSyncStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn issue_fields(repo_id: &str, issue: &IssuePayload) -> issue::ActiveModel {
        issue::ActiveModel {
            id: NotSet,
            repo_id: Set(repo_id.to_string()),
            source_issue_id: Set(issue.source_issue_id as i64),
            number: Set(issue.number as i64),
            title: Set(issue.title.clone()),
            body: Set(issue.body.clone()),
            state: Set(issue.state.clone()),
            labels: Set(JsonValue::from(issue.labels.clone())),
            html_url: Set(issue.html_url.clone()),
            created_at: Set(issue.created_at.fixed_offset()),
            updated_at: Set(issue.updated_at.map(|ts| ts.fixed_offset())),
            synced_at: Set(Utc::now().fixed_offset()),
        }
    }
}

#[async_trait]
impl SyncStore for DbSyncStore {
    async fn find_repo(&self, repo_id: &str) -> Result<Option<repo::Model>, StoreError> {
        Ok(repo::Entity::find_by_id(repo_id.to_string())
            .one(&self.db)
            .await?)
    }

    async fn create_issue(&self, repo_id: &str, issue: &IssuePayload) -> Result<(), StoreError> {
        let mut model = Self::issue_fields(repo_id, issue);
        model.id = Set(issue.document_id(repo_id));

        issue::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn update_issue(&self, repo_id: &str, issue: &IssuePayload) -> Result<(), StoreError> {
        let result = issue::Entity::update_many()
            .set(Self::issue_fields(repo_id, issue))
            .filter(issue::Column::Id.eq(issue.document_id(repo_id)))
            .filter(issue::Column::RepoId.eq(repo_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn record_sync(
        &self,
        repo_id: &str,
        synced_at: DateTime<Utc>,
        processed: usize,
    ) -> Result<(), StoreError> {
        let stamp = synced_at.fixed_offset();
        let update = repo::ActiveModel {
            last_synced_at: Set(Some(stamp)),
            last_processed_count: Set(Some(i32::try_from(processed).unwrap_or(i32::MAX))),
            updated_at: Set(stamp),
            ..Default::default()
        };

        let result = repo::Entity::update_many()
            .set(update)
            .filter(repo::Column::Id.eq(repo_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store with failure and latency injection for pipeline tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub repos: Mutex<HashMap<String, repo::Model>>,
        pub issues: Mutex<HashMap<String, IssuePayload>>,
        pub recorded: Mutex<Vec<(String, usize)>>,
        /// Issue numbers whose writes fail with a database error
        pub failing_numbers: HashSet<u64>,
        /// Latency added to every issue write
        pub write_delay: Option<Duration>,
        pub fail_find: bool,
        pub fail_record: bool,
        pub creates: AtomicUsize,
        pub updates: AtomicUsize,
    }

    impl MemoryStore {
        pub fn with_repo(repo_id: &str, owner: &str, name: &str) -> Self {
            let store = Self::default();
            let now = Utc::now().fixed_offset();
            store.repos.lock().unwrap().insert(
                repo_id.to_string(),
                repo::Model {
                    id: repo_id.to_string(),
                    owner: owner.to_string(),
                    name: name.to_string(),
                    full_name: format!("{}/{}", owner, name),
                    added_by: "tester".to_string(),
                    last_synced_at: None,
                    last_processed_count: None,
                    created_at: now,
                    updated_at: now,
                },
            );
            store
        }

        pub fn create_calls(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        pub fn update_calls(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }

        async fn before_write(&self, issue: &IssuePayload) -> Result<(), StoreError> {
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing_numbers.contains(&issue.number) {
                return Err(StoreError::Database(DbErr::Custom(format!(
                    "injected failure for #{}",
                    issue.number
                ))));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SyncStore for MemoryStore {
        async fn find_repo(&self, repo_id: &str) -> Result<Option<repo::Model>, StoreError> {
            if self.fail_find {
                return Err(StoreError::Database(DbErr::Custom("store offline".into())));
            }
            Ok(self.repos.lock().unwrap().get(repo_id).cloned())
        }

        async fn create_issue(&self, repo_id: &str, issue: &IssuePayload) -> Result<(), StoreError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.before_write(issue).await?;
            let mut issues = self.issues.lock().unwrap();
            let id = issue.document_id(repo_id);
            if issues.contains_key(&id) {
                return Err(StoreError::Conflict);
            }
            issues.insert(id, issue.clone());
            Ok(())
        }

        async fn update_issue(&self, repo_id: &str, issue: &IssuePayload) -> Result<(), StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.before_write(issue).await?;
            let mut issues = self.issues.lock().unwrap();
            match issues.get_mut(&issue.document_id(repo_id)) {
                Some(existing) => {
                    *existing = issue.clone();
                    Ok(())
                }
                None => Err(StoreError::NotFound),
            }
        }

        async fn record_sync(
            &self,
            repo_id: &str,
            _synced_at: DateTime<Utc>,
            processed: usize,
        ) -> Result<(), StoreError> {
            if self.fail_record {
                return Err(StoreError::Database(DbErr::Custom("write rejected".into())));
            }
            self.recorded
                .lock()
                .unwrap()
                .push((repo_id.to_string(), processed));
            Ok(())
        }
    }
}
