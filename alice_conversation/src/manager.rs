//! Turn pipeline for the banking assistant.
//!
//! The `ConversationManager` is built once at startup, shared behind an `Arc`
//! and drives every turn: fact extraction, intent routing, the upstream call
//! and the write back into the session store.

use std::io::Write;
use std::sync::Arc;

use alice_core::facts::keys;
use alice_core::services::format_rwf;
use alice_core::{
    ChatMessage, CompletionOptions, ContextConfig, ConversationPair, DocumentAnswer, DocumentQa,
    LanguageModel, Ledger, SessionStore, StoreError, Summarizer, Transaction, Transcriber,
    UserFacts,
};
use alice_memory::extract;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::context::ContextAssembler;
use crate::intent::{Intent, detect_intent};
use crate::summary::ExtractiveSummarizer;

/// Shown to the customer whenever a collaborator fails.
pub const SERVICE_UNAVAILABLE: &str =
    "I'm sorry, this service is temporarily unavailable. Please try again in a moment.";

/// Configuration for the turn pipeline.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Sampling parameters for model replies
    pub completion: CompletionOptions,
    /// Extra system prompt placed before the assembled context
    pub system_prompt: Option<String>,
    /// How far back balance inquiries look
    pub ledger_days: u32,
    /// Transactions listed in a balance reply
    pub max_transactions: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            completion: CompletionOptions::default(),
            system_prompt: None,
            ledger_days: 30,
            max_transactions: 3,
        }
    }
}

impl ConversationConfig {
    #[must_use]
    pub fn with_completion(mut self, completion: CompletionOptions) -> Self {
        self.completion = completion;
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    #[must_use]
    pub const fn with_ledger_days(mut self, days: u32) -> Self {
        self.ledger_days = days;
        self
    }
}

/// The collaborator that failed during a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Transcription,
    LanguageModel,
    DocumentQa,
    Ledger,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::LanguageModel => "language model",
            Self::DocumentQa => "document search",
            Self::Ledger => "ledger",
        })
    }
}

/// Errors that can occur while processing a turn.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{service} unavailable: {source}")]
    Upstream {
        service: Service,
        source: anyhow::Error,
    },

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversationError {
    fn upstream(service: Service) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Upstream { service, source }
    }

    /// Text safe to show the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(reason) => reason.clone(),
            Self::Upstream { .. } | Self::Store(_) | Self::Io(_) => SERVICE_UNAVAILABLE.to_string(),
        }
    }
}

/// What the customer sees after one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub answer: String,
    pub intent: Intent,
    pub suggestions: Vec<String>,
}

/// Multi-turn banking conversation manager.
pub struct ConversationManager {
    store: Arc<dyn SessionStore>,
    assembler: ContextAssembler,
    model: Arc<dyn LanguageModel>,
    summarizer: Arc<dyn Summarizer>,
    transcriber: Option<Arc<dyn Transcriber>>,
    ledger: Option<Arc<dyn Ledger>>,
    documents: Option<Arc<dyn DocumentQa>>,
    config: ConversationConfig,
}

impl ConversationManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        model: Arc<dyn LanguageModel>,
        context: ContextConfig,
        config: ConversationConfig,
    ) -> Self {
        let summarizer: Arc<dyn Summarizer> = Arc::new(ExtractiveSummarizer::default());
        let assembler = ContextAssembler::new(Arc::clone(&store), context)
            .with_summarizer(Arc::clone(&summarizer));
        info!(
            "Creating conversation manager: backend={}, model={}",
            store.backend(),
            config.completion.model
        );

        Self {
            store,
            assembler,
            model,
            summarizer,
            transcriber: None,
            ledger: None,
            documents: None,
            config,
        }
    }

    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.assembler = self.assembler.with_summarizer(Arc::clone(&summarizer));
        self.summarizer = summarizer;
        self
    }

    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn DocumentQa>) -> Self {
        self.documents = Some(documents);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ConversationConfig {
        &self.config
    }

    #[must_use]
    pub const fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Answer one customer message and record it in the session.
    ///
    /// When a collaborator fails the question is still stored, with an empty
    /// answer, before the error is returned.
    pub async fn process_turn(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<TurnReply, ConversationError> {
        if session_id.trim().is_empty() {
            return Err(ConversationError::Validation(
                "Session id must not be empty".to_string(),
            ));
        }
        let question = text.trim();
        if question.is_empty() {
            return Err(ConversationError::Validation(
                "Please type or say your question".to_string(),
            ));
        }

        let extracted = extract(question, "");
        let intent = detect_intent(question);
        debug!(
            session_id = %session_id,
            intent = %intent,
            facts = extracted.len(),
            "Processing turn"
        );

        let answer = match self.answer(session_id, question, intent, &extracted).await {
            Ok(answer) => answer,
            Err(e) => {
                if matches!(e, ConversationError::Upstream { .. }) {
                    self.record(session_id, ConversationPair::new(question, ""), extracted)
                        .await;
                }
                warn!(session_id = %session_id, "Turn failed: {e}");
                return Err(e);
            }
        };

        let pair = ConversationPair::new(question, answer.clone());
        let facts = (!extracted.is_empty()).then(|| extracted.clone());
        self.store
            .add_turn(session_id, pair.with_facts(extracted).into(), facts)
            .await?;

        if let Err(e) = self
            .store
            .get_or_create_summary(session_id, self.summarizer.as_ref())
            .await
        {
            warn!(session_id = %session_id, "Summary refresh failed: {e}");
        }

        debug!(session_id = %session_id, "Turn completed");
        Ok(TurnReply {
            answer,
            intent,
            suggestions: intent
                .suggestions()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Transcribe `audio` and answer it. An inaudible clip yields `None`.
    pub async fn process_audio(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> Result<Option<TurnReply>, ConversationError> {
        let Some(transcriber) = &self.transcriber else {
            return Err(ConversationError::Validation(
                "Voice input is not available".to_string(),
            ));
        };
        if audio.is_empty() {
            return Ok(None);
        }

        let transcript = transcriber
            .transcribe(audio)
            .await
            .map_err(ConversationError::upstream(Service::Transcription))?;
        if transcript.trim().is_empty() {
            debug!(session_id = %session_id, "Empty transcript, nothing to answer");
            return Ok(None);
        }

        self.process_turn(session_id, &transcript).await.map(Some)
    }

    /// Forget everything about `session_id`.
    pub async fn clear(&self, session_id: &str) -> Result<(), ConversationError> {
        self.store.clear(session_id).await?;
        info!(session_id = %session_id, "Session cleared");
        Ok(())
    }

    /// Run an interactive conversation loop on stdin/stdout.
    pub async fn run_interactive(&self, session_id: &str) -> Result<(), ConversationError> {
        println!("=== ALICE, Bank of Kigali assistant (session {session_id}) ===");
        println!("Type 'exit', 'quit' or 'q' to leave, '/clear' to start over.\n");

        let mut turns = 0usize;
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let mut input = String::new();
            if std::io::stdin().read_line(&mut input)? == 0 {
                break;
            }
            let input = input.trim();

            if matches!(input, "exit" | "quit" | "q") {
                break;
            }
            if input.is_empty() {
                continue;
            }
            if input == "/clear" {
                self.clear(session_id).await?;
                println!("\nConversation cleared.\n");
                continue;
            }

            match self.process_turn(session_id, input).await {
                Ok(reply) => {
                    turns += 1;
                    println!("\n{}\n", reply.answer);
                    println!("You could also ask:");
                    for suggestion in &reply.suggestions {
                        println!("  - {suggestion}");
                    }
                    println!();
                }
                Err(e) => {
                    error!(session_id = %session_id, "Turn error: {e}");
                    eprintln!("{}", e.user_message());
                }
            }
        }

        println!("\nSession ended. Turns answered: {turns}");
        Ok(())
    }

    async fn answer(
        &self,
        session_id: &str,
        question: &str,
        intent: Intent,
        extracted: &UserFacts,
    ) -> Result<String, ConversationError> {
        match (intent, &self.ledger, &self.documents) {
            (Intent::BalanceInquiry, Some(ledger), _) => {
                self.balance_reply(session_id, ledger.as_ref(), extracted)
                    .await
            }
            (Intent::ProductInquiry, _, Some(documents)) => {
                document_reply(documents.as_ref(), question).await
            }
            _ => self.model_reply(session_id, question, extracted).await,
        }
    }

    async fn balance_reply(
        &self,
        session_id: &str,
        ledger: &dyn Ledger,
        extracted: &UserFacts,
    ) -> Result<String, ConversationError> {
        let mut facts = self.store.get_facts(session_id).await?;
        facts.merge(extracted);

        let greeting = facts
            .get(keys::NAME)
            .map_or_else(String::new, |name| format!("{name}, "));
        let Some(account) = facts.get(keys::ACCOUNT_NUMBER) else {
            return Ok(format!(
                "{greeting}I can check that for you. Could you please share your account number?"
            ));
        };

        let transactions = ledger
            .recent_transactions(account, self.config.ledger_days)
            .await
            .map_err(ConversationError::upstream(Service::Ledger))?;
        debug!(
            session_id = %session_id,
            transactions = transactions.len(),
            "Ledger lookup complete"
        );

        Ok(render_balance(
            &greeting,
            account,
            &transactions,
            self.config.ledger_days,
            self.config.max_transactions,
        ))
    }

    async fn model_reply(
        &self,
        session_id: &str,
        question: &str,
        extracted: &UserFacts,
    ) -> Result<String, ConversationError> {
        let mut messages = self
            .assembler
            .build_context_with_facts(session_id, question, extracted)
            .await?;
        if let Some(prompt) = &self.config.system_prompt {
            messages.insert(0, ChatMessage::system(prompt.clone()));
        }

        let reply = self
            .model
            .complete(&messages, &self.config.completion)
            .await
            .map_err(ConversationError::upstream(Service::LanguageModel))?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ConversationError::Upstream {
                service: Service::LanguageModel,
                source: anyhow::anyhow!("empty completion"),
            });
        }
        Ok(reply.to_string())
    }

    /// Store a pair without letting a store failure mask the caller's error.
    async fn record(&self, session_id: &str, pair: ConversationPair, extracted: UserFacts) {
        let facts = (!extracted.is_empty()).then(|| extracted.clone());
        if let Err(e) = self
            .store
            .add_turn(session_id, pair.with_facts(extracted).into(), facts)
            .await
        {
            error!(session_id = %session_id, "Failed to record unanswered question: {e}");
        }
    }
}

async fn document_reply(documents: &dyn DocumentQa, question: &str) -> Result<String, ConversationError> {
    let DocumentAnswer { answer, sources } = documents
        .answer(question)
        .await
        .map_err(ConversationError::upstream(Service::DocumentQa))?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ConversationError::Upstream {
            service: Service::DocumentQa,
            source: anyhow::anyhow!("empty document answer"),
        });
    }

    let mut reply = answer.to_string();
    if !sources.is_empty() {
        reply.push_str("\n\nSources:");
        for source in &sources {
            reply.push_str(&format!(
                "\n- {} ({}), {}",
                source.product, source.category, source.file
            ));
            if let Some(page) = source.page {
                reply.push_str(&format!(", page {page}"));
            }
        }
    }
    Ok(reply)
}

fn render_balance(
    greeting: &str,
    account: &str,
    transactions: &[Transaction],
    days: u32,
    limit: usize,
) -> String {
    let Some(latest) = transactions.first() else {
        return format!(
            "{greeting}I found no transactions on account {account} in the last {days} days."
        );
    };

    let lead = if greeting.is_empty() { "The" } else { "the" };
    let mut reply = format!(
        "{greeting}{lead} current balance on account {account} is {}.",
        format_rwf(latest.balance)
    );
    reply.push_str("\nRecent transactions:");
    for tx in transactions.iter().take(limit) {
        reply.push_str(&format!(
            "\n- {} {}: {}",
            tx.date.format("%Y-%m-%d"),
            tx.description,
            format_rwf(tx.amount)
        ));
    }
    reply
}
