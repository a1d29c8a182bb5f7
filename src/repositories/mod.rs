//! # Repository Layer
//!
//! Data access for the browsing, bookmark, claim and discussion endpoints.
//! The sync pipeline writes through [`crate::store::SyncStore`] instead.

pub mod bookmark;
pub mod claim;
pub mod issue;
pub mod message;
pub mod repo;

pub use bookmark::{BookmarkDetails, BookmarkRepository};
pub use claim::ClaimRepository;
pub use issue::{IssueRepository, LabelCount};
pub use message::MessageRepository;
pub use repo::RepoRepository;
