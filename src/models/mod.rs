//! # Data Models
//!
//! SeaORM entities for the persisted collections, plus small response types
//! shared across handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod bookmark;
pub mod claim;
pub mod issue;
pub mod message;
pub mod repo;

pub use bookmark::Entity as Bookmark;
pub use claim::Entity as Claim;
pub use issue::Entity as Issue;
pub use message::Entity as Message;
pub use repo::Entity as Repo;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "issue-sync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
