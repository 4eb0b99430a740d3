//! Integration tests for the Redis session store.
//!
//! These need a live server (`REDIS_URL`, default `redis://127.0.0.1:6379/15`)
//! and are ignored by default: `cargo test --features redis-backend -- --ignored`.
#![cfg(feature = "redis-backend")]

use alice_core::facts::keys;
use alice_core::{
    ConversationPair, HistoryEntry, MemoryConfig, SessionStore, StoreBackend, StoreConfig,
    Summarizer, UserFacts,
};
use alice_memory::RedisSessionStore;
use async_trait::async_trait;

fn pair(question: &str) -> HistoryEntry {
    ConversationPair::new(question, format!("answer to {question}")).into()
}

async fn connect(test: &str) -> RedisSessionStore {
    let config = StoreConfig {
        backend: StoreBackend::Redis,
        redis_url: std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string()),
        key_prefix: format!("alice-test:{}:{test}:", std::process::id()),
        ..StoreConfig::default()
    };
    RedisSessionStore::connect(&config, &MemoryConfig::default().with_max_pairs(3))
        .await
        .expect("Redis should be reachable for ignored tests")
}

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, history: &[HistoryEntry]) -> anyhow::Result<String> {
        Ok(format!("{} entries", history.len()))
    }
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_bounded_retention() {
    let store = connect("retention").await;
    for q in ["Q1", "Q2", "Q3", "Q4", "Q5"] {
        store.add_turn("s1", pair(q), None).await.expect("add");
    }

    let history = store.get_history("s1").await.expect("read");
    let questions: Vec<&str> = history.iter().filter_map(HistoryEntry::user_text).collect();
    assert_eq!(questions, vec!["Q3", "Q4", "Q5"]);

    store.clear("s1").await.expect("clear");
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_facts_merge_and_clear() {
    let store = connect("facts").await;
    let name: UserFacts = [(keys::NAME, "John")].into_iter().collect();
    let account: UserFacts = [(keys::ACCOUNT_NUMBER, "123")].into_iter().collect();
    store.add_turn("s1", pair("Q1"), Some(name)).await.expect("add");
    store.add_turn("s1", pair("Q2"), Some(account)).await.expect("add");

    let facts = store.get_facts("s1").await.expect("facts");
    assert_eq!(facts.get(keys::NAME), Some("John"));
    assert_eq!(facts.get(keys::ACCOUNT_NUMBER), Some("123"));
    assert_eq!(store.session_count().await.expect("count"), 1);

    store.clear("s1").await.expect("clear");
    store.clear("s1").await.expect("clear again");
    assert!(store.get_history("s1").await.expect("read").is_empty());
    assert!(store.get_facts("s1").await.expect("facts").is_empty());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn test_redis_summary_follows_generation() {
    let store = connect("summary").await;
    store.add_turn("s1", pair("Q1"), None).await.expect("add");
    store.add_turn("s1", pair("Q2"), None).await.expect("add");

    let first = store
        .get_or_create_summary("s1", &EchoSummarizer)
        .await
        .expect("summary");
    assert_eq!(first.as_deref(), Some("2 entries"));

    store.add_turn("s1", pair("Q3"), None).await.expect("add");
    let second = store
        .get_or_create_summary("s1", &EchoSummarizer)
        .await
        .expect("summary");
    assert_eq!(second.as_deref(), Some("3 entries"));

    store.clear("s1").await.expect("clear");
}
