//! Rolling conversation summaries.

use std::sync::Arc;

use alice_core::{ChatMessage, CompletionOptions, HistoryEntry, LanguageModel, Role, Summarizer};
use async_trait::async_trait;
use tracing::debug;

/// Condenses history without calling out anywhere.
///
/// Output is a pure function of the history, so prompts built from it stay
/// reproducible.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_chars: usize,
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self { max_chars: 250 }
    }
}

impl ExtractiveSummarizer {
    #[must_use]
    pub const fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    #[must_use]
    pub fn condense(&self, history: &[HistoryEntry]) -> String {
        let questions: Vec<&str> = history
            .iter()
            .filter_map(HistoryEntry::user_text)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .collect();
        let last_answer = history
            .iter()
            .rev()
            .flat_map(HistoryEntry::lines)
            .find(|(role, content)| *role == Role::Assistant && !content.trim().is_empty())
            .map(|(_, content)| content.trim());

        let mut summary = String::new();
        if !questions.is_empty() {
            summary.push_str("Customer asked: ");
            summary.push_str(&questions.join("; "));
            summary.push('.');
        }
        if let Some(answer) = last_answer {
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str("Last reply: ");
            summary.push_str(answer);
        }

        clip(&summary, self.max_chars)
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut clipped: String = text.chars().take(keep).collect();
    clipped.push_str("...");
    clipped
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, history: &[HistoryEntry]) -> anyhow::Result<String> {
        Ok(self.condense(history))
    }
}

const SUMMARY_PROMPT: &str = "Summarize this banking conversation in at most three sentences. \
Keep the customer's name, account details and any open request. Reply with the summary only.";

/// Asks the language model for a summary.
pub struct ModelSummarizer {
    model: Arc<dyn LanguageModel>,
    options: CompletionOptions,
}

impl ModelSummarizer {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, options: CompletionOptions) -> Self {
        Self {
            model,
            options: options.with_max_tokens(200),
        }
    }
}

#[async_trait]
impl Summarizer for ModelSummarizer {
    async fn summarize(&self, history: &[HistoryEntry]) -> anyhow::Result<String> {
        let transcript = history
            .iter()
            .flat_map(HistoryEntry::lines)
            .map(|(role, content)| format!("{role}: {content}"))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = [
            ChatMessage::system(SUMMARY_PROMPT),
            ChatMessage::user(transcript),
        ];
        let summary = self.model.complete(&messages, &self.options).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            anyhow::bail!("language model returned an empty summary");
        }

        debug!("Summarized {} entries into {} chars", history.len(), summary.len());
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alice_core::{ConversationPair, Turn};

    #[test]
    fn condenses_questions_and_last_reply() {
        let history: Vec<HistoryEntry> = vec![
            ConversationPair::new("What is my balance?", "It is RWF 5,000.").into(),
            ConversationPair::new("Any recent deposits?", "").into(),
        ];
        let summary = ExtractiveSummarizer::default().condense(&history);
        assert_eq!(
            summary,
            "Customer asked: What is my balance?; Any recent deposits?. Last reply: It is RWF 5,000."
        );
    }

    #[test]
    fn summary_is_bounded() {
        let long = "x".repeat(400);
        let history: Vec<HistoryEntry> = vec![Turn::user(long).into()];
        let summary = ExtractiveSummarizer::new(50).condense(&history);
        assert_eq!(summary.chars().count(), 50);
        assert!(summary.ends_with("..."));
    }
}
