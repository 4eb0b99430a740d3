//! Keyword intent routing.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

static BALANCE: OnceLock<Regex> = OnceLock::new();
static PRODUCT: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    BalanceInquiry,
    ProductInquiry,
    General,
}

impl Intent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BalanceInquiry => "balance_inquiry",
            Self::ProductInquiry => "product_inquiry",
            Self::General => "general",
        }
    }

    /// Follow-up questions offered after a reply of this kind.
    #[must_use]
    pub const fn suggestions(self) -> [&'static str; 3] {
        match self {
            Self::BalanceInquiry => [
                "Can you explain my recent account activity?",
                "What banking features are available on my account?",
                "How can I set up automatic payments?",
            ],
            Self::ProductInquiry => [
                "What loan products would suit my needs?",
                "Are there any special offers on credit cards right now?",
                "Tell me about your investment opportunities",
            ],
            Self::General => [
                "What are your operating hours?",
                "Where are your ATMs located?",
                "How can I open a new account?",
            ],
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn balance() -> &'static Regex {
    BALANCE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:balance|statements?|transactions?|mini[\s-]?statement)\b|\bhow\s+much\b.*\b(?:have|left)\b",
        )
        .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn product() -> &'static Regex {
    PRODUCT.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:loans?|mortgages?|(?:credit|debit)?\s*cards?|savings|interest\s+rates?|products?|investments?|open(?:ing)?\s+(?:a\s+|an\s+|new\s+)*account)\b",
        )
        .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Classify a customer message. Balance questions win over product ones.
#[must_use]
pub fn detect_intent(text: &str) -> Intent {
    if balance().is_match(text) {
        Intent::BalanceInquiry
    } else if product().is_match(text) {
        Intent::ProductInquiry
    } else {
        Intent::General
    }
}
