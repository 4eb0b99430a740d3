//! The session store contract shared by every backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{HistoryEntry, StoreError, UserFacts};

/// Which implementation backs a [`SessionStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map, lost on shutdown.
    #[default]
    Memory,
    /// Networked Redis server, evicted by key TTL.
    Redis,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Redis => f.write_str("redis"),
        }
    }
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions whose history (and cached summary) expired.
    pub histories_expired: usize,
    /// Sessions removed entirely, facts included.
    pub sessions_removed: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.histories_expired == 0 && self.sessions_removed == 0
    }
}

/// Produces a rolling summary of retained history.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, history: &[HistoryEntry]) -> anyhow::Result<String>;
}

/// Bounded, expiring, per-session conversation state.
///
/// Every backend honours the same contract:
/// - reads of an unknown or expired session return empty values, never errors;
/// - a write for one session is atomic with respect to other operations on
///   the same session;
/// - at most `max_pairs` entries are retained, oldest evicted first.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Append `entry`, merge `facts` and refresh the session's expiry.
    ///
    /// Creates the session when absent. Fails with
    /// [`StoreError::Validation`] for an entry without content.
    async fn add_turn(
        &self,
        session_id: &str,
        entry: HistoryEntry,
        facts: Option<UserFacts>,
    ) -> Result<(), StoreError>;

    /// Retained entries, oldest first. Refreshes the session's expiry.
    async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Merged facts. Never revives expired history.
    async fn get_facts(&self, session_id: &str) -> Result<UserFacts, StoreError>;

    /// Cached rolling summary, computed with `summarizer` when missing or
    /// stale and the session holds enough entries.
    async fn get_or_create_summary(
        &self,
        session_id: &str,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<String>, StoreError>;

    /// Drop history, facts and summary for `session_id`. Idempotent.
    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;

    /// Evict expired sessions.
    async fn sweep_expired(&self) -> Result<SweepReport, StoreError>;

    /// Number of sessions currently holding state.
    async fn session_count(&self) -> Result<usize, StoreError>;

    fn backend(&self) -> StoreBackend;
}
