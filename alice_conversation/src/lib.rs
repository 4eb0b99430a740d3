#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Multi-turn banking conversations on top of a session store.
//!
//! # Key Features
//! - Deterministic, bounded prompt context built from facts and history
//! - Rolling summaries, extractive or model-written
//! - Keyword intent routing to the ledger and product documents
//! - Graceful degradation when a collaborator is unavailable

mod context;
mod intent;
mod manager;
mod summary;

pub use context::ContextAssembler;
pub use intent::{Intent, detect_intent};
pub use manager::{
    ConversationConfig, ConversationError, ConversationManager, SERVICE_UNAVAILABLE, Service,
    TurnReply,
};
pub use summary::{ExtractiveSummarizer, ModelSummarizer};
