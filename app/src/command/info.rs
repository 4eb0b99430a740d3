use alice_config::Config;
use alice_core::{FactsExpiry, StoreBackend};
use alice_memory::select_store;
use tracing::info;

/// Strategy for displaying configuration information.
///
/// Prints the masked API key, agent defaults, retention settings and which
/// session store is actually reachable.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== alice Configuration ===\n");

        println!("API Key:");
        let openai = &config.providers.openai;
        if openai.has_api_key() {
            println!("  OpenAI: {}", mask_secret(&openai.api_key));
        } else {
            println!("  OpenAI: (not set)");
        }
        if let Some(base_url) = &openai.base_url {
            println!("  Base URL: {base_url}");
        }
        println!();

        println!("Agent Defaults:");
        println!("  Model: {}", config.agents.defaults.model);
        println!("  Max Tokens: {}", config.agents.defaults.max_tokens);
        println!("  Temperature: {}", config.agents.defaults.temperature);
        if let Some(ref prompt) = config.agents.defaults.system_prompt {
            println!("  System Prompt: {}", truncate(prompt, 60));
        }
        println!();

        println!("Memory:");
        println!("  Max Pairs: {}", config.memory.max_pairs);
        println!("  Expiry: {}s", config.memory.expiry_seconds);
        println!("  Facts Expiry: {}", format_facts_expiry(config.memory.facts_expiry));
        println!("  Summary Threshold: {}", config.memory.summary_threshold);
        println!("  Sweep Interval: {}s", config.memory.sweep_interval_secs);
        println!();

        println!("Context:");
        println!("  History Pairs: {}", config.context.history_pairs);
        println!("  Max Chars: {}", config.context.max_chars);
        println!("  Max Line Chars: {}", config.context.max_line_chars);
        println!();

        println!("Session Store:");
        println!("  Configured: {}", config.store.backend);
        if config.store.backend == StoreBackend::Redis {
            println!("  Redis URL: {}", mask_url(&config.store.redis_url));
            println!("  Key Prefix: {}", config.store.key_prefix);
        }

        info!("Probing session store");
        let handle = select_store(&config.store, &config.memory).await;
        let active = handle.backend();
        if active == config.store.backend {
            println!("  Status: {active} ready");
        } else {
            println!("  Status: unreachable, falling back to {active}");
        }
        handle.shutdown().await;

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn mask_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    let user = credentials.split_once(':').map_or(credentials, |(user, _)| user);
    format!("{scheme}://{user}:***@{host}")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn format_facts_expiry(policy: FactsExpiry) -> String {
    match policy {
        FactsExpiry::Never => "never".to_string(),
        FactsExpiry::WithHistory => "with history".to_string(),
        FactsExpiry::Scaled { factor } => format!("{factor}x history expiry"),
    }
}
