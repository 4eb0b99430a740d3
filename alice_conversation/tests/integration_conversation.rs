//! Integration tests for the conversation pipeline.
//!
//! These tests verify that:
//! - Context assembly is deterministic, bounded and carries known facts
//! - Only the most recent pairs are rendered, even when more are retained
//! - Turns are recorded with their extracted facts
//! - Upstream failures keep the question and surface a generic message
//! - Balance and product questions are routed to the ledger and documents
//! - Voice input with nothing audible is not treated as a turn

use std::sync::{Arc, Mutex};

use alice_conversation::{
    ContextAssembler, ConversationConfig, ConversationError, ConversationManager, Intent,
    SERVICE_UNAVAILABLE, Service,
};
use alice_core::facts::keys;
use alice_core::{
    ChatMessage, CompletionOptions, ContextConfig, ConversationPair, DocumentAnswer, DocumentQa,
    HistoryEntry, LanguageModel, Ledger, MemoryConfig, Role, SessionStore, SourceRef,
    Transaction, Transcriber, UserFacts,
};
use alice_memory::MemorySessionStore;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Replies with a fixed text and remembers every prompt it was sent.
struct ScriptedModel {
    reply: Option<String>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn last_system_prompt(&self) -> String {
        let prompts = self.prompts.lock().expect("prompt log");
        prompts
            .last()
            .and_then(|messages| messages.iter().find(|m| m.role == Role::System))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.prompts.lock().expect("prompt log").len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt log poisoned"))?
            .push(messages.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model offline"))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

struct FakeLedger {
    accounts: Mutex<Vec<String>>,
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn recent_transactions(
        &self,
        account: &str,
        _days: u32,
    ) -> anyhow::Result<Vec<Transaction>> {
        self.accounts
            .lock()
            .map_err(|_| anyhow::anyhow!("ledger log poisoned"))?
            .push(account.to_string());
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap_or_default();
        Ok(vec![Transaction {
            date,
            description: "Salary".to_string(),
            amount: 350_000.0,
            balance: 412_500.0,
            reference: Some("SAL-05".to_string()),
        }])
    }
}

struct FakeDocuments;

#[async_trait]
impl DocumentQa for FakeDocuments {
    async fn answer(&self, _question: &str) -> anyhow::Result<DocumentAnswer> {
        Ok(DocumentAnswer {
            answer: "Home loans are available for up to 20 years.".to_string(),
            sources: vec![SourceRef {
                category: "loans".to_string(),
                product: "Home Loan".to_string(),
                file: "home_loan.pdf".to_string(),
                page: Some(3),
            }],
        })
    }
}

struct FixedTranscriber(&'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

fn memory_store() -> Arc<MemorySessionStore> {
    Arc::new(MemorySessionStore::new(&MemoryConfig::default()))
}

fn manager(store: Arc<MemorySessionStore>, model: Arc<ScriptedModel>) -> ConversationManager {
    ConversationManager::new(
        store,
        model,
        ContextConfig::default(),
        ConversationConfig::default(),
    )
}

async fn only_pair(store: &MemorySessionStore, session_id: &str) -> ConversationPair {
    let history = store.get_history(session_id).await.expect("read");
    assert_eq!(history.len(), 1, "expected exactly one entry");
    match history.into_iter().next() {
        Some(HistoryEntry::Pair(pair)) => pair,
        other => panic!("expected a conversation pair, got {other:?}"),
    }
}

#[tokio::test]
async fn test_context_is_deterministic() {
    let store = memory_store();
    let facts: UserFacts = [(keys::NAME, "Alice Mugisha")].into_iter().collect();
    store
        .add_turn(
            "s1",
            ConversationPair::new("Hello", "Hi, how can I help?").into(),
            Some(facts),
        )
        .await
        .expect("add");

    let assembler = ContextAssembler::new(store, ContextConfig::default());
    let first = assembler.build_context("s1", "What can you do?").await.expect("context");
    let second = assembler.build_context("s1", "What can you do?").await.expect("context");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].role, Role::System);
    assert!(first[0].content.contains("Customer name: Alice Mugisha"));
    assert!(first[0].content.contains("User: Hello"));
    assert_eq!(first[1], ChatMessage::user("What can you do?"));
}

#[tokio::test]
async fn test_context_respects_character_budget() {
    let store = memory_store();
    for i in 0..3 {
        let question = format!("question {i} {}", "x".repeat(200));
        store
            .add_turn("s1", ConversationPair::new(question, "y".repeat(200)).into(), None)
            .await
            .expect("add");
    }

    let config = ContextConfig::default().with_max_chars(600);
    let assembler = ContextAssembler::new(store, config);
    let messages = assembler.build_context("s1", "Hi").await.expect("context");

    let total: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    assert!(total <= 600, "context has {total} chars");
    assert!(!messages[0].content.contains("question 0"));
}

#[tokio::test]
async fn test_context_renders_only_recent_pairs() {
    let store = Arc::new(MemorySessionStore::new(
        &MemoryConfig::default().with_max_pairs(5),
    ));
    for i in 0..5 {
        store
            .add_turn(
                "s1",
                ConversationPair::new(format!("Q{i}"), format!("A{i}")).into(),
                None,
            )
            .await
            .expect("add");
    }
    assert_eq!(store.get_history("s1").await.expect("read").len(), 5);

    let config = ContextConfig::default().with_history_pairs(2);
    let assembler = ContextAssembler::new(store, config);
    let messages = assembler.build_context("s1", "Next").await.expect("context");
    let preamble = &messages[0].content;

    assert!(preamble.contains("User: Q3\nAssistant: A3\nUser: Q4\nAssistant: A4"));
    for i in 0..3 {
        assert!(!preamble.contains(&format!("User: Q{i}")), "Q{i} rendered");
        assert!(!preamble.contains(&format!("Assistant: A{i}")), "A{i} rendered");
    }
}

#[tokio::test]
async fn test_turn_records_pair_and_facts() {
    let store = memory_store();
    let model = ScriptedModel::replying("Nice to meet you, Alice.");
    let manager = manager(Arc::clone(&store), Arc::clone(&model));

    let reply = manager
        .process_turn("s1", "Hello, my name is Alice Mugisha")
        .await
        .expect("turn");
    assert_eq!(reply.answer, "Nice to meet you, Alice.");
    assert_eq!(reply.intent, Intent::General);
    assert_eq!(reply.suggestions.len(), 3);

    let pair = only_pair(&store, "s1").await;
    assert_eq!(pair.answer, "Nice to meet you, Alice.");
    assert_eq!(pair.extracted_facts.get(keys::NAME), Some("Alice Mugisha"));
    let facts = store.get_facts("s1").await.expect("facts");
    assert_eq!(facts.get(keys::NAME), Some("Alice Mugisha"));
}

#[tokio::test]
async fn test_facts_reach_later_prompts() {
    let store = memory_store();
    let model = ScriptedModel::replying("Noted.");
    let manager = manager(store, Arc::clone(&model));

    manager
        .process_turn("s1", "my name is Alice Mugisha")
        .await
        .expect("first turn");
    manager
        .process_turn("s1", "Where is the nearest branch?")
        .await
        .expect("second turn");

    let prompt = model.last_system_prompt();
    assert!(prompt.contains("Customer name: Alice Mugisha"), "{prompt}");
    assert!(prompt.contains("User: my name is Alice Mugisha"), "{prompt}");
}

#[tokio::test]
async fn test_upstream_failure_keeps_question() {
    let store = memory_store();
    let manager = manager(Arc::clone(&store), ScriptedModel::failing());

    let err = manager
        .process_turn("s1", "my account number is 1234-5678")
        .await
        .expect_err("model is offline");
    assert!(matches!(
        err,
        ConversationError::Upstream {
            service: Service::LanguageModel,
            ..
        }
    ));
    assert_eq!(err.user_message(), SERVICE_UNAVAILABLE);

    let pair = only_pair(&store, "s1").await;
    assert_eq!(pair.question, "my account number is 1234-5678");
    assert!(!pair.is_answered());
    let facts = store.get_facts("s1").await.expect("facts");
    assert_eq!(facts.get(keys::ACCOUNT_NUMBER), Some("1234-5678"));
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let store = memory_store();
    let model = ScriptedModel::replying("unused");
    let manager = manager(Arc::clone(&store), Arc::clone(&model));

    let err = manager.process_turn("s1", "   ").await.expect_err("blank");
    assert!(matches!(err, ConversationError::Validation(_)));
    assert_eq!(model.calls(), 0);
    assert!(store.get_history("s1").await.expect("read").is_empty());
}

#[tokio::test]
async fn test_balance_inquiry_uses_ledger() {
    let store = memory_store();
    let model = ScriptedModel::replying("unused");
    let ledger = Arc::new(FakeLedger {
        accounts: Mutex::new(Vec::new()),
    });
    let manager = manager(Arc::clone(&store), Arc::clone(&model))
        .with_ledger(Arc::clone(&ledger) as Arc<dyn Ledger>);

    let ask = manager
        .process_turn("s1", "What is my balance?")
        .await
        .expect("turn");
    assert_eq!(ask.intent, Intent::BalanceInquiry);
    assert!(ask.answer.contains("account number"), "{}", ask.answer);

    manager
        .process_turn("s1", "my account number is 4001-2233")
        .await
        .expect("turn");
    let reply = manager
        .process_turn("s1", "Show my balance please")
        .await
        .expect("turn");

    assert!(reply.answer.contains("RWF 412,500"), "{}", reply.answer);
    assert!(reply.answer.contains("2024-05-02 Salary: RWF 350,000"));
    assert_eq!(
        *ledger.accounts.lock().expect("ledger log"),
        vec!["4001-2233".to_string()]
    );
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_product_inquiry_cites_sources() {
    let store = memory_store();
    let model = ScriptedModel::replying("unused");
    let manager =
        manager(store, Arc::clone(&model)).with_documents(Arc::new(FakeDocuments));

    let reply = manager
        .process_turn("s1", "Tell me about home loans")
        .await
        .expect("turn");

    assert_eq!(reply.intent, Intent::ProductInquiry);
    assert!(reply.answer.starts_with("Home loans are available"));
    assert!(reply.answer.contains("Sources:\n- Home Loan (loans), home_loan.pdf, page 3"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_inaudible_audio_is_not_a_turn() {
    let store = memory_store();
    let model = ScriptedModel::replying("Hello!");
    let silent = manager(Arc::clone(&store), Arc::clone(&model))
        .with_transcriber(Arc::new(FixedTranscriber("   ")));

    let reply = silent.process_audio("s1", b"RIFF").await.expect("audio");
    assert!(reply.is_none());
    assert_eq!(model.calls(), 0);
    assert!(store.get_history("s1").await.expect("read").is_empty());

    let spoken = manager(Arc::clone(&store), model)
        .with_transcriber(Arc::new(FixedTranscriber("Good morning")));
    let reply = spoken.process_audio("s1", b"RIFF").await.expect("audio");
    assert_eq!(reply.map(|r| r.answer).as_deref(), Some("Hello!"));
}

#[tokio::test]
async fn test_clear_forgets_session() {
    let store = memory_store();
    let manager = manager(Arc::clone(&store), ScriptedModel::replying("Hi"));
    manager
        .process_turn("s1", "my name is Alice")
        .await
        .expect("turn");

    manager.clear("s1").await.expect("clear");

    assert!(store.get_history("s1").await.expect("read").is_empty());
    assert!(store.get_facts("s1").await.expect("facts").is_empty());
}
