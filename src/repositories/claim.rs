//! # Claim Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::{ApiError, not_found};
use crate::models::Issue;
use crate::models::claim::{ActiveModel, Column, Entity, Model};

pub const CLAIM_STATUS_ACTIVE: &str = "active";

pub struct ClaimRepository {
    db: DatabaseConnection,
}

impl ClaimRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Record that `user_id` intends to work on `issue_id`.
    pub async fn claim(&self, user_id: &str, issue_id: &str) -> Result<Model, ApiError> {
        if Issue::find_by_id(issue_id.to_string())
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(not_found("Issue not found"));
        }

        let claim = ActiveModel {
            id: Set(Uuid::new_v4().simple().to_string()),
            user_id: Set(user_id.to_string()),
            issue_id: Set(issue_id.to_string()),
            status: Set(CLAIM_STATUS_ACTIVE.to_string()),
            claimed_at: Set(Utc::now().fixed_offset()),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(claim_id = %claim.id, issue_id, user_id, "Issue claimed");
        Ok(claim)
    }

    /// Claims on an issue, oldest first.
    pub async fn claims_for_issue(&self, issue_id: &str) -> Result<Vec<Model>, ApiError> {
        Ok(Entity::find()
            .filter(Column::IssueId.eq(issue_id))
            .order_by_asc(Column::ClaimedAt)
            .all(&self.db)
            .await?)
    }
}
