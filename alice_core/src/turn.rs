//! Conversation records retained by a session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Role, StoreError, UserFacts};

/// One message with a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// One request/response cycle.
///
/// An empty `answer` marks a question whose answer never arrived, which keeps
/// the question available as context for a retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationPair {
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub extracted_facts: UserFacts,
}

impl ConversationPair {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            created_at: Utc::now(),
            extracted_facts: UserFacts::new(),
        }
    }

    /// Attach the facts extracted from this exchange.
    #[must_use]
    pub fn with_facts(mut self, facts: UserFacts) -> Self {
        self.extracted_facts = facts;
        self
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        !self.answer.trim().is_empty()
    }
}

/// The unit a session store retains and counts against its bound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Pair(ConversationPair),
    Turn(Turn),
}

impl HistoryEntry {
    /// Reject entries that carry no content.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Self::Pair(pair) if pair.question.trim().is_empty() => Err(StoreError::Validation(
                "conversation pair has an empty question".to_string(),
            )),
            Self::Turn(turn) if turn.content.trim().is_empty() => Err(StoreError::Validation(
                format!("{} turn has empty content", turn.role),
            )),
            _ => Ok(()),
        }
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Pair(pair) => pair.created_at,
            Self::Turn(turn) => turn.created_at,
        }
    }

    /// The user-authored text of this entry, if any.
    #[must_use]
    pub fn user_text(&self) -> Option<&str> {
        match self {
            Self::Pair(pair) => Some(&pair.question),
            Self::Turn(turn) if turn.role == Role::User => Some(&turn.content),
            Self::Turn(_) => None,
        }
    }

    /// Flatten into `(role, content)` lines in conversation order.
    ///
    /// Unanswered pairs yield only the question.
    #[must_use]
    pub fn lines(&self) -> Vec<(Role, &str)> {
        match self {
            Self::Pair(pair) if pair.is_answered() => vec![
                (Role::User, pair.question.as_str()),
                (Role::Assistant, pair.answer.as_str()),
            ],
            Self::Pair(pair) => vec![(Role::User, pair.question.as_str())],
            Self::Turn(turn) => vec![(turn.role, turn.content.as_str())],
        }
    }
}

impl From<ConversationPair> for HistoryEntry {
    fn from(pair: ConversationPair) -> Self {
        Self::Pair(pair)
    }
}

impl From<Turn> for HistoryEntry {
    fn from(turn: Turn) -> Self {
        Self::Turn(turn)
    }
}
