//! Configuration types shared between the store, the assembler and the
//! config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::StoreBackend;

/// How long extracted facts outlive conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FactsExpiry {
    /// Facts stay until the session is cleared.
    Never,
    /// Facts disappear together with the history.
    WithHistory,
    /// Facts expire after `factor` times the history expiry since last use.
    Scaled { factor: u32 },
}

impl Default for FactsExpiry {
    fn default() -> Self {
        Self::Scaled { factor: 2 }
    }
}

impl FactsExpiry {
    /// Time-to-live for facts given the history time-to-live.
    #[must_use]
    pub fn ttl(self, history_ttl: Duration) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::WithHistory => Some(history_ttl),
            Self::Scaled { factor } => Some(history_ttl.saturating_mul(factor.max(1))),
        }
    }
}

/// Retention and expiry of per-session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum entries retained per session
    #[serde(default = "MemoryConfig::default_max_pairs")]
    pub max_pairs: usize,
    /// Idle seconds after which history expires
    #[serde(default = "MemoryConfig::default_expiry_seconds")]
    pub expiry_seconds: u64,
    #[serde(default)]
    pub facts_expiry: FactsExpiry,
    /// Entries required before a rolling summary is produced
    #[serde(default = "MemoryConfig::default_summary_threshold")]
    pub summary_threshold: usize,
    /// Seconds between background sweeps
    #[serde(default = "MemoryConfig::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_pairs: Self::default_max_pairs(),
            expiry_seconds: Self::default_expiry_seconds(),
            facts_expiry: FactsExpiry::default(),
            summary_threshold: Self::default_summary_threshold(),
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

impl MemoryConfig {
    const fn default_max_pairs() -> usize {
        3
    }

    const fn default_expiry_seconds() -> u64 {
        1800
    }

    const fn default_summary_threshold() -> usize {
        2
    }

    const fn default_sweep_interval_secs() -> u64 {
        300
    }

    #[must_use]
    pub const fn with_max_pairs(mut self, max_pairs: usize) -> Self {
        self.max_pairs = max_pairs;
        self
    }

    #[must_use]
    pub const fn with_expiry_seconds(mut self, secs: u64) -> Self {
        self.expiry_seconds = secs;
        self
    }

    #[must_use]
    pub const fn with_facts_expiry(mut self, policy: FactsExpiry) -> Self {
        self.facts_expiry = policy;
        self
    }

    #[must_use]
    pub const fn with_summary_threshold(mut self, threshold: usize) -> Self {
        self.summary_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }

    #[must_use]
    pub fn facts_ttl(&self) -> Option<Duration> {
        self.facts_expiry.ttl(self.history_ttl())
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        // A zero interval would panic in tokio::time::interval.
        if self.sweep_interval_secs == 0 {
            Duration::from_secs(1)
        } else {
            Duration::from_secs(self.sweep_interval_secs)
        }
    }
}

/// Backend selection for the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "StoreConfig::default_redis_url")]
    pub redis_url: String,
    #[serde(default = "StoreConfig::default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "StoreConfig::default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: Self::default_redis_url(),
            key_prefix: Self::default_key_prefix(),
            connect_timeout_secs: Self::default_connect_timeout_secs(),
        }
    }
}

impl StoreConfig {
    fn default_redis_url() -> String {
        "redis://127.0.0.1:6379/0".to_string()
    }

    fn default_key_prefix() -> String {
        "bk:".to_string()
    }

    const fn default_connect_timeout_secs() -> u64 {
        5
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Bounds for the prompt context handed to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Most recent entries rendered when no summary exists
    #[serde(default = "ContextConfig::default_history_pairs")]
    pub history_pairs: usize,
    /// Ceiling on preamble plus current message, in characters
    #[serde(default = "ContextConfig::default_max_chars")]
    pub max_chars: usize,
    /// Each rendered history line is clipped to this many characters
    #[serde(default = "ContextConfig::default_max_line_chars")]
    pub max_line_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_pairs: Self::default_history_pairs(),
            max_chars: Self::default_max_chars(),
            max_line_chars: Self::default_max_line_chars(),
        }
    }
}

impl ContextConfig {
    const fn default_history_pairs() -> usize {
        4
    }

    const fn default_max_chars() -> usize {
        6000
    }

    const fn default_max_line_chars() -> usize {
        150
    }

    #[must_use]
    pub const fn with_history_pairs(mut self, pairs: usize) -> Self {
        self.history_pairs = pairs;
        self
    }

    #[must_use]
    pub const fn with_max_chars(mut self, max: usize) -> Self {
        self.max_chars = max;
        self
    }
}
