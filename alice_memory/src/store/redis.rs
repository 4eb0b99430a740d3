//! Session store on a Redis server.
//!
//! Layout per session, all under the configured prefix:
//! - `history:{id}`: list of JSON entries, trimmed to `max_pairs`
//! - `facts:{id}`: hash of fact name to value
//! - `summary:{id}`: JSON `{generation, text}`
//! - `generation:{id}`: counter bumped on every append
//!
//! Expiry is delegated to key TTLs. Every write is a single `MULTI`
//! pipeline, so no client-side lock is held across network I/O.

use std::collections::{HashMap, HashSet};

use alice_core::{
    FactsExpiry, HistoryEntry, MemoryConfig, SessionStore, StoreBackend, StoreConfig, StoreError,
    Summarizer, SweepReport, UserFacts,
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Stores the summary only if the generation still matches.
const CACHE_SUMMARY_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[3])
    return 1
end
return 0
";

#[derive(Debug, Serialize, Deserialize)]
struct CachedSummary {
    generation: u64,
    text: String,
}

fn backend_error(err: &redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    max_pairs: i64,
    summary_threshold: usize,
    history_ttl_secs: u64,
    facts_ttl_secs: Option<u64>,
    facts_follow_history: bool,
}

impl RedisSessionStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(store: &StoreConfig, memory: &MemoryConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(store.redis_url.as_str()).map_err(|e| backend_error(&e))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| backend_error(&e))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;
        if pong != "PONG" {
            return Err(StoreError::Backend(format!(
                "unexpected PING reply: {pong}"
            )));
        }

        info!(
            "Connected RedisSessionStore: prefix={}, max_pairs={}, expiry={}s",
            store.key_prefix, memory.max_pairs, memory.expiry_seconds
        );

        Ok(Self {
            conn,
            prefix: store.key_prefix.clone(),
            max_pairs: i64::try_from(memory.max_pairs.max(1)).unwrap_or(i64::MAX),
            summary_threshold: memory.summary_threshold.max(1),
            history_ttl_secs: memory.expiry_seconds.max(1),
            facts_ttl_secs: memory.facts_ttl().map(|ttl| ttl.as_secs().max(1)),
            facts_follow_history: memory.facts_expiry == FactsExpiry::WithHistory,
        })
    }

    fn key(&self, kind: &str, session_id: &str) -> String {
        format!("{}{kind}:{session_id}", self.prefix)
    }

    const fn summary_ttl_secs(&self) -> u64 {
        self.history_ttl_secs.saturating_mul(2)
    }

    /// Queue TTL refreshes for a session that was just used.
    fn queue_touch(&self, pipe: &mut redis::Pipeline, session_id: &str) {
        pipe.cmd("EXPIRE")
            .arg(self.key("history", session_id))
            .arg(self.history_ttl_secs)
            .ignore()
            .cmd("EXPIRE")
            .arg(self.key("generation", session_id))
            .arg(self.history_ttl_secs)
            .ignore()
            .cmd("EXPIRE")
            .arg(self.key("summary", session_id))
            .arg(self.summary_ttl_secs())
            .ignore();
        if let Some(ttl) = self.facts_ttl_secs {
            pipe.cmd("EXPIRE")
                .arg(self.key("facts", session_id))
                .arg(ttl)
                .ignore();
        }
    }

    fn decode_history(raw: &[String]) -> Result<Vec<HistoryEntry>, StoreError> {
        raw.iter()
            .map(|item| serde_json::from_str(item).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn add_turn(
        &self,
        session_id: &str,
        entry: HistoryEntry,
        facts: Option<UserFacts>,
    ) -> Result<(), StoreError> {
        entry.validate()?;
        let payload = serde_json::to_string(&entry)?;
        let history_key = self.key("history", session_id);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("RPUSH")
            .arg(&history_key)
            .arg(payload)
            .ignore()
            .cmd("LTRIM")
            .arg(&history_key)
            .arg(-self.max_pairs)
            .arg(-1)
            .ignore()
            .cmd("INCR")
            .arg(self.key("generation", session_id))
            .ignore();

        if let Some(facts) = facts.filter(|f| !f.is_empty()) {
            pipe.cmd("HSET").arg(self.key("facts", session_id));
            for (name, value) in facts.iter() {
                pipe.arg(name).arg(value);
            }
            pipe.ignore();
        }
        self.queue_touch(&mut pipe, session_id);

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;

        debug!(session_id = %session_id, "Stored turn in Redis");
        Ok(())
    }

    async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LRANGE")
            .arg(self.key("history", session_id))
            .arg(0)
            .arg(-1);
        self.queue_touch(&mut pipe, session_id);

        let mut conn = self.conn.clone();
        let (raw,): (Vec<String>,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;
        Self::decode_history(&raw)
    }

    async fn get_facts(&self, session_id: &str) -> Result<UserFacts, StoreError> {
        let facts_key = self.key("facts", session_id);
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("HGETALL").arg(&facts_key);
        if let Some(ttl) = self.facts_ttl_secs.filter(|_| !self.facts_follow_history) {
            pipe.cmd("EXPIRE").arg(&facts_key).arg(ttl).ignore();
        }

        let mut conn = self.conn.clone();
        let (raw,): (HashMap<String, String>,) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;
        Ok(raw.into_iter().collect())
    }

    async fn get_or_create_summary(
        &self,
        session_id: &str,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<String>, StoreError> {
        let generation_key = self.key("generation", session_id);
        let summary_key = self.key("summary", session_id);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("LRANGE")
            .arg(self.key("history", session_id))
            .arg(0)
            .arg(-1)
            .cmd("GET")
            .arg(&generation_key)
            .cmd("GET")
            .arg(&summary_key);
        self.queue_touch(&mut pipe, session_id);

        let mut conn = self.conn.clone();
        let (raw, generation, cached): (Vec<String>, Option<u64>, Option<String>) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;

        if raw.is_empty() {
            return Ok(None);
        }
        let generation = generation.unwrap_or_default();
        if let Some(cached) = cached {
            let cached: CachedSummary = serde_json::from_str(&cached)?;
            if cached.generation == generation {
                return Ok(Some(cached.text));
            }
        }
        if raw.len() < self.summary_threshold {
            return Ok(None);
        }

        let history = Self::decode_history(&raw)?;
        let text = summarizer
            .summarize(&history)
            .await
            .map_err(StoreError::Summarizer)?;

        let payload = serde_json::to_string(&CachedSummary {
            generation,
            text: text.clone(),
        })?;
        let script = redis::Script::new(CACHE_SUMMARY_SCRIPT);
        let stored: i64 = script
            .key(&generation_key)
            .key(&summary_key)
            .arg(generation.to_string())
            .arg(payload)
            .arg(self.summary_ttl_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;
        if stored == 0 {
            debug!(session_id = %session_id, "History changed while summarizing, not caching");
        }

        Ok(Some(text))
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(self.key("history", session_id))
            .arg(self.key("facts", session_id))
            .arg(self.key("summary", session_id))
            .arg(self.key("generation", session_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| backend_error(&e))?;
        if removed > 0 {
            info!(session_id = %session_id, "Cleared session");
        }
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<SweepReport, StoreError> {
        // Key TTLs evict on the server.
        Ok(SweepReport::default())
    }

    async fn session_count(&self) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let mut ids = HashSet::new();

        for kind in ["history", "facts"] {
            let prefix = format!("{}{kind}:", self.prefix);
            let pattern = format!("{prefix}*");
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| backend_error(&e))?;
                ids.extend(
                    keys.iter()
                        .filter_map(|key| key.strip_prefix(&prefix))
                        .map(str::to_string),
                );
                if next == 0 {
                    break;
                }
                cursor = next;
            }
        }

        Ok(ids.len())
    }

    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }
}
