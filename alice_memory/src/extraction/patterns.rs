//! Compiled phrase patterns for fact extraction.

use std::sync::OnceLock;

use regex::Regex;

static NAME_INTRO: OnceLock<Regex> = OnceLock::new();
static ACCOUNT_INTRO: OnceLock<Regex> = OnceLock::new();
static CUSTOMER_INTRO: OnceLock<Regex> = OnceLock::new();
static TERMINATOR: OnceLock<Regex> = OnceLock::new();
static ID_CONNECTOR: OnceLock<Regex> = OnceLock::new();
static ID_VALUE: OnceLock<Regex> = OnceLock::new();

/// Phrases that introduce a name.
///
/// `i am`, `i'm` and `this is` are weak intros; see [`is_weak_name_intro`].
#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
pub fn name_intro() -> &'static Regex {
    NAME_INTRO.get_or_init(|| {
        Regex::new(r"(?i)\b(?:my\s+name\s+is|call\s+me|i['’]m|i\s+am|this\s+is|name['’]s)\b")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Phrases that introduce an account number.
///
/// The longer `account number` forms come first so that
/// `my account number is` is consumed whole.
#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
pub fn account_intro() -> &'static Regex {
    ACCOUNT_INTRO.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:my\s+)?account\s*(?:number\b|no\b\.?|id\b|#)|\bmy\s+account\b",
        )
        .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
pub fn customer_intro() -> &'static Regex {
    CUSTOMER_INTRO.get_or_init(|| {
        Regex::new(r"(?i)\b(?:my\s+)?(?:customer\s+(?:id|number)|client\s+id)\b")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Where a candidate value ends.
#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
pub fn terminator() -> &'static Regex {
    TERMINATOR.get_or_init(|| {
        Regex::new(r"(?i)[.,?!;:\n]|\b(?:and|but|the|so|or)\b")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Connector between an id phrase and its value: `is`, `:` or `#`.
#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
pub fn id_connector() -> &'static Regex {
    ID_CONNECTOR.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:is\b|:|#)?\s*")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
pub fn id_value() -> &'static Regex {
    ID_VALUE.get_or_init(|| {
        Regex::new(r"^[0-9](?:[0-9-]*[0-9])?$")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Whether a name intro is one people also use for things other than names
/// ("I am looking for a loan").
#[must_use]
pub fn is_weak_name_intro(phrase: &str) -> bool {
    let lower = phrase.to_lowercase();
    !(lower.starts_with("my") || lower.starts_with("call") || lower.starts_with("name"))
}

/// First words that rule out a name.
pub const NOT_A_NAME: &[&str] = &[
    "a", "an", "not", "very", "just", "here", "fine", "good", "ok", "okay", "sure", "sorry",
    "interested", "calling", "trying", "looking", "going", "having", "asking", "wondering",
    "new", "still", "also", "in", "at", "on", "from", "with", "your", "my", "to",
];
