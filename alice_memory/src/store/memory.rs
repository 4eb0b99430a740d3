//! In-process session store on a sharded concurrent map.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alice_core::{
    FactsExpiry, HistoryEntry, MemoryConfig, SessionStore, StoreBackend, StoreError, Summarizer,
    SweepReport, UserFacts,
};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info};

/// A summary and the history generation it was computed from.
#[derive(Debug, Clone)]
struct CachedSummary {
    generation: u64,
    text: String,
}

/// Everything held for one session.
#[derive(Debug)]
struct SessionSlot {
    history: VecDeque<HistoryEntry>,
    history_touched: Instant,
    /// Changes whenever `history` changes
    generation: u64,
    summary: Option<CachedSummary>,
    facts: UserFacts,
    facts_touched: Instant,
}

impl SessionSlot {
    fn new(now: Instant) -> Self {
        Self {
            history: VecDeque::new(),
            history_touched: now,
            generation: 0,
            summary: None,
            facts: UserFacts::new(),
            facts_touched: now,
        }
    }

    fn is_empty(&self) -> bool {
        self.history.is_empty() && self.summary.is_none() && self.facts.is_empty()
    }
}

/// Expiry rules derived from [`MemoryConfig`].
#[derive(Debug, Clone, Copy)]
struct Lifetimes {
    history: Duration,
    facts: Option<Duration>,
    facts_follow_history: bool,
}

impl Lifetimes {
    fn from_config(config: &MemoryConfig) -> Self {
        Self {
            history: config.history_ttl(),
            facts: config.facts_ttl(),
            facts_follow_history: config.facts_expiry == FactsExpiry::WithHistory,
        }
    }
}

/// Default [`SessionStore`], lost on shutdown.
///
/// Every operation on one session runs under that session's shard lock and
/// never awaits while holding it. Unrelated sessions on other shards proceed
/// in parallel.
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionSlot>,
    max_pairs: usize,
    summary_threshold: usize,
    lifetimes: Lifetimes,
    /// Source of generation numbers, unique across the store so a session
    /// recreated after `clear` never reuses one.
    generations: AtomicU64,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(config: &MemoryConfig) -> Self {
        info!(
            "Creating MemorySessionStore: max_pairs={}, expiry={}s, facts_expiry={:?}",
            config.max_pairs, config.expiry_seconds, config.facts_expiry
        );
        Self {
            sessions: DashMap::new(),
            max_pairs: config.max_pairs.max(1),
            summary_threshold: config.summary_threshold.max(1),
            lifetimes: Lifetimes::from_config(config),
            generations: AtomicU64::new(1),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    /// Drop whatever in `slot` has outlived its lifetime.
    ///
    /// Returns whether the history expired.
    fn expire(&self, slot: &mut SessionSlot, now: Instant) -> bool {
        let history_expired = (!slot.history.is_empty() || slot.summary.is_some())
            && now.duration_since(slot.history_touched) >= self.lifetimes.history;
        if history_expired {
            slot.history.clear();
            slot.summary = None;
            slot.generation = self.next_generation();
        }

        let facts_expired = if self.lifetimes.facts_follow_history {
            slot.history.is_empty()
        } else {
            self.lifetimes
                .facts
                .is_some_and(|ttl| now.duration_since(slot.facts_touched) >= ttl)
        };
        if facts_expired && !slot.facts.is_empty() {
            slot.facts = UserFacts::new();
        }

        history_expired
    }

    fn is_live(&self, slot: &SessionSlot, now: Instant) -> bool {
        let history_live = !slot.history.is_empty()
            && now.duration_since(slot.history_touched) < self.lifetimes.history;
        let facts_live = !slot.facts.is_empty()
            && if self.lifetimes.facts_follow_history {
                history_live
            } else {
                self.lifetimes
                    .facts
                    .is_none_or(|ttl| now.duration_since(slot.facts_touched) < ttl)
            };
        history_live || facts_live
    }

    /// Remove the slot for `session_id` if expiry left nothing in it.
    fn discard_if_empty(&self, session_id: &str) {
        if self
            .sessions
            .remove_if(session_id, |_, slot| slot.is_empty())
            .is_some()
        {
            debug!(session_id = %session_id, "Discarded expired session");
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn add_turn(
        &self,
        session_id: &str,
        entry: HistoryEntry,
        facts: Option<UserFacts>,
    ) -> Result<(), StoreError> {
        entry.validate()?;
        let now = Instant::now();

        let mut slot = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot::new(now));
        self.expire(&mut slot, now);

        slot.history.push_back(entry);
        while slot.history.len() > self.max_pairs {
            slot.history.pop_front();
        }
        slot.generation = self.next_generation();
        slot.history_touched = now;

        if let Some(facts) = facts.filter(|f| !f.is_empty()) {
            slot.facts.merge(&facts);
        }
        slot.facts_touched = now;

        debug!(
            session_id = %session_id,
            retained = slot.history.len(),
            facts = slot.facts.len(),
            "Stored turn"
        );
        Ok(())
    }

    async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let now = Instant::now();
        let history = {
            let Some(mut slot) = self.sessions.get_mut(session_id) else {
                return Ok(Vec::new());
            };
            self.expire(&mut slot, now);
            if !slot.history.is_empty() {
                slot.history_touched = now;
                slot.facts_touched = now;
            }
            slot.history.iter().cloned().collect::<Vec<_>>()
        };

        if history.is_empty() {
            self.discard_if_empty(session_id);
        }
        Ok(history)
    }

    async fn get_facts(&self, session_id: &str) -> Result<UserFacts, StoreError> {
        let now = Instant::now();
        let facts = {
            let Some(mut slot) = self.sessions.get_mut(session_id) else {
                return Ok(UserFacts::new());
            };
            self.expire(&mut slot, now);
            if !slot.facts.is_empty() && !self.lifetimes.facts_follow_history {
                slot.facts_touched = now;
            }
            slot.facts.clone()
        };

        if facts.is_empty() {
            self.discard_if_empty(session_id);
        }
        Ok(facts)
    }

    async fn get_or_create_summary(
        &self,
        session_id: &str,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let (generation, snapshot) = {
            let Some(mut slot) = self.sessions.get_mut(session_id) else {
                return Ok(None);
            };
            self.expire(&mut slot, now);
            if slot.history.is_empty() {
                return Ok(None);
            }
            slot.history_touched = now;

            if let Some(cached) = slot.summary.as_ref().filter(|s| s.generation == slot.generation)
            {
                return Ok(Some(cached.text.clone()));
            }
            if slot.history.len() < self.summary_threshold {
                return Ok(None);
            }
            (
                slot.generation,
                slot.history.iter().cloned().collect::<Vec<_>>(),
            )
        };

        let text = summarizer
            .summarize(&snapshot)
            .await
            .map_err(StoreError::Summarizer)?;

        match self.sessions.get_mut(session_id) {
            Some(mut slot) if slot.generation == generation => {
                slot.summary = Some(CachedSummary {
                    generation,
                    text: text.clone(),
                });
            }
            _ => debug!(session_id = %session_id, "History changed while summarizing, not caching"),
        }

        Ok(Some(text))
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        if self.sessions.remove(session_id).is_some() {
            info!(session_id = %session_id, "Cleared session");
        }
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<SweepReport, StoreError> {
        let now = Instant::now();
        let mut report = SweepReport::default();

        // DashMap::retain write-locks one shard at a time.
        self.sessions.retain(|_, slot| {
            if self.expire(slot, now) {
                report.histories_expired += 1;
            }
            if slot.is_empty() {
                report.sessions_removed += 1;
                false
            } else {
                true
            }
        });

        if !report.is_empty() {
            info!(
                "Swept sessions: {} histories expired, {} sessions removed",
                report.histories_expired, report.sessions_removed
            );
        }
        Ok(report)
    }

    async fn session_count(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        Ok(self
            .sessions
            .iter()
            .filter(|slot| self.is_live(slot.value(), now))
            .count())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alice_core::{ConversationPair, Turn};
    use alice_core::facts::keys;

    fn pair(q: &str) -> HistoryEntry {
        ConversationPair::new(q, format!("answer to {q}")).into()
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn blank_entry_is_rejected_without_creating_session() {
        let store = MemorySessionStore::new(&MemoryConfig::default());
        let err = store
            .add_turn("s1", Turn::user("  ").into(), None)
            .await
            .expect_err("blank turn must be rejected");
        assert!(err.is_validation());
        assert_eq!(store.session_count().await.expect("count"), 0);
    }

    #[tokio::test(start_paused = true)]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn reads_refresh_expiry() {
        let store = MemorySessionStore::new(&MemoryConfig::default().with_expiry_seconds(10));
        store.add_turn("s1", pair("Q1"), None).await.expect("add");

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.get_history("s1").await.expect("read").len(), 1);

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.get_history("s1").await.expect("read").len(), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(store.get_history("s1").await.expect("read").is_empty());
    }

    #[tokio::test(start_paused = true)]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn facts_read_does_not_revive_history() {
        let config = MemoryConfig::default()
            .with_expiry_seconds(10)
            .with_facts_expiry(FactsExpiry::Never);
        let store = MemorySessionStore::new(&config);
        let facts: UserFacts = [(keys::NAME, "Alice")].into_iter().collect();
        store
            .add_turn("s1", pair("my name is Alice"), Some(facts))
            .await
            .expect("add");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(
            store.get_facts("s1").await.expect("facts").get(keys::NAME),
            Some("Alice")
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get_history("s1").await.expect("read").is_empty());
        assert_eq!(
            store.get_facts("s1").await.expect("facts").get(keys::NAME),
            Some("Alice")
        );
    }

    #[tokio::test(start_paused = true)]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn facts_follow_history_when_configured() {
        let config = MemoryConfig::default()
            .with_expiry_seconds(5)
            .with_facts_expiry(FactsExpiry::WithHistory);
        let store = MemorySessionStore::new(&config);
        let facts: UserFacts = [(keys::ACCOUNT_NUMBER, "1234")].into_iter().collect();
        store.add_turn("s1", pair("Q1"), Some(facts)).await.expect("add");

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!store.get_facts("s1").await.expect("facts").is_empty());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get_facts("s1").await.expect("facts").is_empty());
        assert_eq!(store.session_count().await.expect("count"), 0);
    }

    #[tokio::test(start_paused = true)]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn scaled_facts_outlive_history_then_expire() {
        let config = MemoryConfig::default()
            .with_expiry_seconds(10)
            .with_facts_expiry(FactsExpiry::Scaled { factor: 2 });
        let store = MemorySessionStore::new(&config);
        let facts: UserFacts = [(keys::NAME, "Bob")].into_iter().collect();
        store.add_turn("s1", pair("Q1"), Some(facts)).await.expect("add");

        tokio::time::advance(Duration::from_secs(15)).await;
        let report = store.sweep_expired().await.expect("sweep");
        assert_eq!(report.histories_expired, 1);
        assert_eq!(report.sessions_removed, 0);
        assert_eq!(store.session_count().await.expect("count"), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        let report = store.sweep_expired().await.expect("sweep");
        assert_eq!(report.sessions_removed, 1);
        assert!(store.get_facts("s1").await.expect("facts").is_empty());
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn new_turn_after_clear_starts_fresh() {
        let store = MemorySessionStore::new(&MemoryConfig::default());
        store.add_turn("s1", pair("Q1"), None).await.expect("add");
        store.clear("s1").await.expect("clear");
        store.add_turn("s1", pair("Q2"), None).await.expect("add");

        let history = store.get_history("s1").await.expect("read");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_text(), Some("Q2"));
        assert_eq!(store.backend(), StoreBackend::Memory);
    }
}
