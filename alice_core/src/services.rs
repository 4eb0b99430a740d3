//! Collaborators the conversation layer talks to.
//!
//! These are consumed through traits only; concrete implementations live in
//! `alice_providers` or in the embedding service.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ChatMessage;

/// Sampling parameters for one completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

impl CompletionOptions {
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> anyhow::Result<String>;

    fn default_model(&self) -> &str;
}

/// Speech to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> anyhow::Result<String>;
}

/// One ledger movement on a customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub description: String,
    /// Negative for debits
    pub amount: f64,
    /// Running balance after this transaction
    pub balance: f64,
    #[serde(default)]
    pub reference: Option<String>,
}

impl Transaction {
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.amount < 0.0
    }
}

/// Read access to the core banking ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Transactions for `account` within the last `days`, newest first.
    async fn recent_transactions(
        &self,
        account: &str,
        days: u32,
    ) -> anyhow::Result<Vec<Transaction>>;
}

/// Where a document answer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub category: String,
    pub product: String,
    pub file: String,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

/// Question answering over the bank's product documents.
#[async_trait]
pub trait DocumentQa: Send + Sync {
    async fn answer(&self, question: &str) -> anyhow::Result<DocumentAnswer>;
}

/// Format an amount the way the bank prints it, e.g. `RWF 12,500`.
///
/// Fractions are rounded to whole francs.
#[must_use]
pub fn format_rwf(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}RWF {grouped}")
}
