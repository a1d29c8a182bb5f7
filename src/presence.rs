//! Per-repository presence.
//!
//! Tracks which users recently showed activity on a repository page. Entries
//! older than the window are pruned on read. The number of tracked
//! repositories is bounded; the least recently touched one is evicted first.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::config::PresenceConfig;

#[derive(Debug, Clone)]
struct PresenceEntry {
    name: Option<String>,
    last_active: Instant,
}

/// A user seen within the presence window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: String,
    pub name: Option<String>,
    /// Seconds since the user's last heartbeat
    pub last_active_secs: u64,
}

pub struct PresenceTracker {
    repos: Mutex<LruCache<String, HashMap<String, PresenceEntry>>>,
    window: Duration,
}

impl PresenceTracker {
    pub fn new(window: Duration, max_repos: NonZeroUsize) -> Self {
        Self {
            repos: Mutex::new(LruCache::new(max_repos)),
            window,
        }
    }

    pub fn from_config(config: &PresenceConfig) -> Self {
        Self::new(
            Duration::from_secs(config.window_seconds),
            NonZeroUsize::new(config.max_repos).unwrap_or(NonZeroUsize::MIN),
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record activity for `user_id` on `repo_id`.
    pub fn record(&self, repo_id: &str, user_id: &str, name: Option<String>) {
        self.record_at(repo_id, user_id, name, Instant::now());
    }

    pub fn record_at(&self, repo_id: &str, user_id: &str, name: Option<String>, now: Instant) {
        let mut repos = self.repos.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let users = repos.get_or_insert_mut(repo_id.to_string(), HashMap::new);
        users.insert(
            user_id.to_string(),
            PresenceEntry {
                name,
                last_active: now,
            },
        );
    }

    /// Drop `user_id` from `repo_id` immediately.
    pub fn leave(&self, repo_id: &str, user_id: &str) {
        let mut repos = self.repos.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(users) = repos.peek_mut(repo_id) {
            users.remove(user_id);
            if users.is_empty() {
                repos.pop(repo_id);
            }
        }
    }

    /// Users active on `repo_id` within the window, most recent first.
    pub fn active(&self, repo_id: &str) -> Vec<ActiveUser> {
        self.active_at(repo_id, Instant::now())
    }

    pub fn active_at(&self, repo_id: &str, now: Instant) -> Vec<ActiveUser> {
        let mut repos = self.repos.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(users) = repos.peek_mut(repo_id) else {
            return Vec::new();
        };

        users.retain(|_, entry| now.saturating_duration_since(entry.last_active) <= self.window);
        if users.is_empty() {
            repos.pop(repo_id);
            return Vec::new();
        }

        let mut active: Vec<ActiveUser> = users
            .iter()
            .map(|(user_id, entry)| ActiveUser {
                user_id: user_id.clone(),
                name: entry.name.clone(),
                last_active_secs: now.saturating_duration_since(entry.last_active).as_secs(),
            })
            .collect();
        active.sort_by(|a, b| {
            a.last_active_secs
                .cmp(&b.last_active_secs)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        active
    }

    pub fn tracked_repos(&self) -> usize {
        self.repos
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
