use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use alice_core::{CompletionOptions, ContextConfig, MemoryConfig, StoreConfig};

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const API_KEY_PLACEHOLDER: &str = "your-openai-api-key-here";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefaults {
    #[serde(default = "AgentDefaults::default_model")]
    pub model: String,
    #[serde(default = "AgentDefaults::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "AgentDefaults::default_temperature")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
            system_prompt: None,
        }
    }
}

impl AgentDefaults {
    fn default_model() -> String {
        CompletionOptions::default().model
    }

    fn default_max_tokens() -> u32 {
        CompletionOptions::default().max_tokens
    }

    fn default_temperature() -> f32 {
        CompletionOptions::default().temperature
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Whether a usable key is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != API_KEY_PLACEHOLDER
    }
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("alice"))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load `~/alice/config.json`, with `OPENAI_API_KEY` filling in a missing key.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'alice init' to create config.",
                config_path.display()
            );
        }

        let mut config = Self::load_from(&config_path)?;
        config.apply_env_key(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Use `env_key` when the file carries no usable key.
    pub fn apply_env_key(&mut self, env_key: Option<String>) {
        if self.providers.openai.has_api_key() {
            return;
        }
        if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
            info!("Using API key from {API_KEY_ENV}");
            self.providers.openai.api_key = key;
        }
    }

    /// Sampling parameters for the conversation pipeline.
    #[must_use]
    pub fn completion_options(&self) -> CompletionOptions {
        let defaults = &self.agents.defaults;
        CompletionOptions {
            model: defaults.model.clone(),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your OpenAI API key (or set {API_KEY_ENV})");
        println!("   2. Optionally point store.redis_url at a Redis server and set store.backend to \"redis\"");
        println!("   3. Run 'alice chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - memory.max_pairs: Exchanges kept per session");
        println!("   - memory.expiry_seconds: Idle time before a session's history is forgotten");
        println!("   - memory.facts_expiry: never | with_history | scaled (with a factor)");
        println!("   - context.max_chars: Upper bound on the prompt sent to the model");
        println!();
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "agents": {
    "defaults": {
      "model": "gpt-4o-mini",
      "max_tokens": 500,
      "temperature": 0.7
    }
  },
  "providers": {
    "openai": {
      "api_key": "your-openai-api-key-here",
      "base_url": "https://api.openai.com/v1"
    }
  },
  "memory": {
    "max_pairs": 3,
    "expiry_seconds": 1800,
    "facts_expiry": { "policy": "scaled", "factor": 2 },
    "summary_threshold": 2,
    "sweep_interval_secs": 300
  },
  "store": {
    "backend": "memory",
    "redis_url": "redis://127.0.0.1:6379/0",
    "key_prefix": "bk:",
    "connect_timeout_secs": 5
  },
  "context": {
    "history_pairs": 4,
    "max_chars": 6000,
    "max_line_chars": 150
  }
}"#;
