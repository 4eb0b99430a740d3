//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;

use alice_config::Config;
use alice_conversation::{ConversationConfig, ConversationManager};
use alice_memory::{StoreHandle, select_store};
use alice_providers::OpenAiProvider;
use tracing::info;

mod chat;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Everything a conversation command needs, built once per process.
struct CommonComponents {
    store: StoreHandle,
    manager: Arc<ConversationManager>,
}

async fn init_common_components(model: Option<String>) -> anyhow::Result<CommonComponents> {
    let config = Config::load()?;
    info!("Loaded config from {}", Config::config_path()?.display());

    if !config.providers.openai.has_api_key() {
        anyhow::bail!(
            "No OpenAI API key configured. Edit {} or set OPENAI_API_KEY.",
            Config::config_path()?.display()
        );
    }

    let mut provider = OpenAiProvider::new(config.providers.openai.api_key.clone())
        .with_default_model(config.agents.defaults.model.clone());
    if let Some(base_url) = &config.providers.openai.base_url {
        provider = provider.with_base_url(base_url.clone());
    }

    let mut completion = config.completion_options();
    if let Some(model) = model {
        completion = completion.with_model(model);
    }
    let mut conversation = ConversationConfig::default().with_completion(completion);
    if let Some(prompt) = &config.agents.defaults.system_prompt {
        conversation = conversation.with_system_prompt(prompt.clone());
    }

    let store = select_store(&config.store, &config.memory).await;
    let manager = ConversationManager::new(
        store.store(),
        Arc::new(provider),
        config.context.clone(),
        conversation,
    );

    Ok(CommonComponents {
        store,
        manager: Arc::new(manager),
    })
}
