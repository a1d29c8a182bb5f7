//! # Issue Sync Library
//!
//! Core of the beginner-issue aggregation service: a time-budgeted,
//! paginated and idempotent GitHub issue sync, plus the HTTP API for
//! repositories, issues, bookmarks, claims, discussion and presence.

pub mod auth;
pub mod budget;
pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod repo_ref;
pub mod repositories;
pub mod server;
pub mod source;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod upsert;
pub use migration;
