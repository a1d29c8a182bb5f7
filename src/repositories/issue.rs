//! # Issue Repository
//!
//! Read access to synced issues for browsing and label filtering.

use std::collections::BTreeMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::issue::{Column, Entity, Model};

/// Number of issues carrying a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LabelCount {
    pub name: String,
    pub count: usize,
}

pub struct IssueRepository {
    db: DatabaseConnection,
}

impl IssueRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, issue_id: &str) -> Result<Option<Model>, ApiError> {
        Ok(Entity::find_by_id(issue_id.to_string()).one(&self.db).await?)
    }

    /// Issues of `repo_id`, newest first. A non-empty `labels` keeps issues
    /// carrying any of them.
    pub async fn list_for_repo(&self, repo_id: &str, labels: &[String]) -> Result<Vec<Model>, ApiError> {
        let issues = Entity::find()
            .filter(Column::RepoId.eq(repo_id))
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await?;

        if labels.is_empty() {
            return Ok(issues);
        }
        Ok(issues
            .into_iter()
            .filter(|issue| issue.has_any_label(labels))
            .collect())
    }

    /// Label usage across a repository's issues, most used first.
    pub async fn label_counts(&self, repo_id: &str) -> Result<Vec<LabelCount>, ApiError> {
        let issues = self.list_for_repo(repo_id, &[]).await?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &issues {
            for label in issue.label_names() {
                *counts.entry(label).or_default() += 1;
            }
        }

        let mut counts: Vec<LabelCount> = counts
            .into_iter()
            .map(|(name, count)| LabelCount { name, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{insert_issue, insert_repo, setup_db};

    #[tokio::test]
    async fn lists_newest_first_with_any_label_filter() {
        let db = setup_db().await;
        insert_repo(&db, "r1", "octo/widgets", "alice").await;
        insert_issue(&db, "r1", 1, &["bug"], 30).await;
        insert_issue(&db, "r1", 2, &["good first issue"], 20).await;
        insert_issue(&db, "r1", 3, &["help wanted", "bug"], 10).await;
        let issues = IssueRepository::new(db);

        let all = issues.list_for_repo("r1", &[]).await.unwrap();
        let ids: Vec<_> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);

        let filtered = issues
            .list_for_repo("r1", &["good first issue".to_string(), "help wanted".to_string()])
            .await
            .unwrap();
        let ids: Vec<_> = filtered.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn label_counts_sort_by_count_then_name() {
        let db = setup_db().await;
        insert_repo(&db, "r1", "octo/widgets", "alice").await;
        insert_issue(&db, "r1", 1, &["bug", "docs"], 0).await;
        insert_issue(&db, "r1", 2, &["bug", "api"], 0).await;
        insert_issue(&db, "r1", 3, &["docs"], 0).await;
        insert_issue(&db, "r1", 4, &["zeta"], 0).await;
        let issues = IssueRepository::new(db);

        let counts = issues.label_counts("r1").await.unwrap();
        let flat: Vec<(&str, usize)> = counts.iter().map(|c| (c.name.as_str(), c.count)).collect();
        assert_eq!(flat, vec![("bug", 2), ("docs", 2), ("api", 1), ("zeta", 1)]);
    }
}
