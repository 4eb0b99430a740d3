use alice_config::Config;
use tracing::info;

/// Writes `~/alice/config.json` from the template, then reports whether an
/// API key is already usable. An existing file is never overwritten.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        Config::create_config()?;

        let config = Config::load()?;
        if config.providers.openai.has_api_key() {
            info!("OpenAI API key found in the environment; 'alice chat' is ready to use");
        } else {
            info!("No OpenAI API key yet; 'alice chat' will refuse to start until one is set");
        }
        Ok(())
    }
}
