//! Execution time budget for a sync invocation.
//!
//! The hosting environment kills an invocation at a hard ceiling. Work is
//! cut short once elapsed time exceeds the ceiling minus a safety buffer so
//! the report can still be written.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::SyncConfig;

#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started_at: Instant,
    max_execution: Duration,
    buffer: Duration,
}

impl TimeBudget {
    /// Start a budget now.
    pub fn start(max_execution: Duration, buffer: Duration) -> Self {
        Self::started_at(Instant::now(), max_execution, buffer)
    }

    pub fn started_at(started_at: Instant, max_execution: Duration, buffer: Duration) -> Self {
        Self {
            started_at,
            max_execution,
            buffer,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::start(config.max_execution(), config.timeout_buffer())
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis()
    }

    /// Point after which no new work may start.
    pub fn soft_limit(&self) -> Duration {
        self.max_execution.saturating_sub(self.buffer)
    }

    /// True once elapsed time is strictly past the soft limit.
    pub fn is_approaching_limit(&self) -> bool {
        self.elapsed() > self.soft_limit()
    }

    /// Time left before the soft limit, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.soft_limit().saturating_sub(self.elapsed())
    }
}
