use thiserror::Error;

/// Errors surfaced by a [`crate::SessionStore`].
///
/// An unknown or expired session is not an error; reads return empty values.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Summarizer error: {0}")]
    Summarizer(anyhow::Error),
}

impl StoreError {
    /// Whether the caller sent something malformed, as opposed to the store failing.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
