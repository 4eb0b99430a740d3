//! Prompt context assembly.
//!
//! Builds the bounded message list sent to the language model from what the
//! session store knows: durable facts, then a rolling summary or the most
//! recent history, then standing instructions.

use std::sync::Arc;

use alice_core::facts::keys;
use alice_core::{
    ChatMessage, ContextConfig, HistoryEntry, Role, SessionStore, StoreError, Summarizer,
    UserFacts,
};
use tracing::{debug, warn};

/// Facts rendered first, in this order, with these labels.
const KNOWN_FACTS: [(&str, &str); 3] = [
    (keys::NAME, "Customer name"),
    (keys::ACCOUNT_NUMBER, "Account number"),
    (keys::CUSTOMER_ID, "Customer ID"),
];

const INSTRUCTIONS: &str = "=== INSTRUCTIONS ===
1. You are ALICE, Bank of Kigali's AI assistant.
2. Address the customer by name whenever it is known.
3. Never ask for information that is already listed above.
4. Refer back to earlier parts of the conversation when it helps.
5. Be warm, professional and concise.";

/// Assembles model input for one turn.
pub struct ContextAssembler {
    store: Arc<dyn SessionStore>,
    summarizer: Option<Arc<dyn Summarizer>>,
    config: ContextConfig,
}

impl ContextAssembler {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: ContextConfig) -> Self {
        Self {
            store,
            summarizer: None,
            config,
        }
    }

    /// Use rolling summaries in place of raw history once they exist.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// `[system(preamble), user(current_message)]` for `session_id`.
    ///
    /// Identical store state and message always produce identical output.
    pub async fn build_context(
        &self,
        session_id: &str,
        current_message: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.build_context_with_facts(session_id, current_message, &UserFacts::new())
            .await
    }

    /// Like [`Self::build_context`], also showing `pending` facts that were
    /// extracted from the current message and are not stored yet.
    pub async fn build_context_with_facts(
        &self,
        session_id: &str,
        current_message: &str,
        pending: &UserFacts,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let mut facts = self.store.get_facts(session_id).await?;
        facts.merge(pending);

        let (heading, lines) = match self.summary(session_id).await {
            Some(summary) => ("=== CONVERSATION SUMMARY ===", vec![summary]),
            None => {
                let history = self.store.get_history(session_id).await?;
                ("=== RECENT CONVERSATION ===", self.history_lines(&history))
            }
        };

        let current = clip_chars(current_message, self.config.max_chars);
        let budget = self
            .config
            .max_chars
            .saturating_sub(current.chars().count());
        let preamble = fit_preamble(render_facts(&facts).as_deref(), heading, lines, budget);

        debug!(
            session_id = %session_id,
            facts = facts.len(),
            chars = preamble.chars().count(),
            "Assembled context"
        );
        Ok(vec![ChatMessage::system(preamble), ChatMessage::user(current)])
    }

    async fn summary(&self, session_id: &str) -> Option<String> {
        let summarizer = self.summarizer.as_ref()?;
        match self
            .store
            .get_or_create_summary(session_id, summarizer.as_ref())
            .await
        {
            Ok(summary) => summary.filter(|s| !s.trim().is_empty()),
            Err(e) => {
                warn!(session_id = %session_id, "Summary unavailable, using history: {e}");
                None
            }
        }
    }

    /// The last `history_pairs` entries as `User:`/`Assistant:` lines,
    /// oldest first.
    fn history_lines(&self, history: &[HistoryEntry]) -> Vec<String> {
        let start = history.len().saturating_sub(self.config.history_pairs);
        history[start..]
            .iter()
            .flat_map(HistoryEntry::lines)
            .map(|(role, content)| {
                let flat = content.replace(['\r', '\n'], " ");
                format!(
                    "{}: {}",
                    role_label(role),
                    clip_with_ellipsis(&flat, self.config.max_line_chars)
                )
            })
            .collect()
    }
}

const fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

fn render_facts(facts: &UserFacts) -> Option<String> {
    if facts.is_empty() {
        return None;
    }

    let mut block = String::from("=== CUSTOMER INFORMATION ===");
    for (key, label) in KNOWN_FACTS {
        if let Some(value) = facts.get(key) {
            block.push_str(&format!("\n{label}: {value}"));
        }
    }
    for (key, value) in facts.iter() {
        if !KNOWN_FACTS.iter().any(|(known, _)| *known == key) {
            block.push_str(&format!("\n{key}: {value}"));
        }
    }
    if let Some(name) = facts.get(keys::NAME) {
        block.push_str(&format!(
            "\nAlways address the customer as {name}. Never say you do not know their name."
        ));
    }
    block.push_str("\nUse these details directly. Never claim you do not have them.");
    Some(block)
}

fn compose(facts: Option<&str>, heading: &str, lines: &[String]) -> String {
    let mut blocks: Vec<String> = Vec::with_capacity(3);
    if let Some(facts) = facts {
        blocks.push(facts.to_string());
    }
    if !lines.is_empty() {
        blocks.push(format!("{heading}\n{}", lines.join("\n")));
    }
    blocks.push(INSTRUCTIONS.to_string());
    blocks.join("\n\n")
}

/// Drop the oldest lines until the preamble fits `budget`, then clip.
fn fit_preamble(facts: Option<&str>, heading: &str, mut lines: Vec<String>, budget: usize) -> String {
    loop {
        let preamble = compose(facts, heading, &lines);
        if preamble.chars().count() <= budget || lines.is_empty() {
            return clip_chars(&preamble, budget).to_string();
        }
        lines.remove(0);
    }
}

/// The first `max` characters of `text`, on a char boundary.
fn clip_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(idx, _)| &text[..idx])
}

fn clip_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", clip_chars(text, max))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip_chars("héllo", 2), "hé");
        assert_eq!(clip_chars("hi", 10), "hi");
        assert_eq!(clip_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(clip_with_ellipsis("abc", 3), "abc");
    }

    #[test]
    fn known_facts_render_in_fixed_order() {
        let facts: UserFacts = [
            ("branch", "Kigali"),
            (keys::CUSTOMER_ID, "C-1"),
            (keys::NAME, "Alice"),
        ]
        .into_iter()
        .collect();
        let block = render_facts(&facts).unwrap_or_default();
        let name = block.find("Customer name: Alice").unwrap_or(usize::MAX);
        let id = block.find("Customer ID: C-1").unwrap_or(usize::MAX);
        let other = block.find("branch: Kigali").unwrap_or(usize::MAX);
        assert!(name < id && id < other, "unexpected order:\n{block}");
    }

    #[test]
    fn oldest_lines_are_dropped_first() {
        let lines = vec!["User: first".to_string(), "User: second".to_string()];
        let full = compose(None, "H", &lines);
        let fitted = fit_preamble(None, "H", lines, full.chars().count() - 1);
        assert!(!fitted.contains("first"));
        assert!(fitted.contains("second"));
    }
}
