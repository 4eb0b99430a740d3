//! Multi-turn conversation command.

use tracing::{error, info};
use uuid::Uuid;

use super::init_common_components;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Session to continue (creates a new one if not provided)
    pub session_id: Option<String>,
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components(input.model).await?;

        let session_id = input
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        info!(session_id = %session_id, "Starting conversation session");

        if let Some(msg) = input.message {
            match common.manager.process_turn(&session_id, &msg).await {
                Ok(reply) => println!("{}", reply.answer),
                Err(e) => {
                    error!(session_id = %session_id, "Turn failed: {e}");
                    eprintln!("{}", e.user_message());
                }
            }
        } else {
            common.manager.run_interactive(&session_id).await?;
        }

        common.store.shutdown().await;
        Ok(())
    }
}
