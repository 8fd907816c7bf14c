pub mod port;
pub mod providers;
pub mod retry;
pub mod streaming;

use std::sync::Arc;

use cadence_core::config::{ModelConfig, RetryConfig};
use cadence_core::traits::LlmClient;

pub use port::LlmPort;
pub use providers::openai::OpenAiClient;
pub use providers::presets::apply_preset_defaults;
pub use retry::RetryingClient;

/// Create an LLM client for the provider. Every supported provider speaks
/// the OpenAI chat-completions protocol.
pub fn create_client(_config: &ModelConfig) -> Box<dyn LlmClient> {
    Box::new(OpenAiClient::new())
}

/// Build the shared client for a primary model, wrapping it in a
/// [`RetryingClient`] when retries or fallbacks are configured.
///
/// Preset defaults are applied to the fallback configs here; apply them to
/// the primary config with [`apply_preset_defaults`] before building ports.
pub fn build_client(primary: &ModelConfig, fallbacks: &[ModelConfig]) -> Arc<dyn LlmClient> {
    let client = create_client(primary);
    if fallbacks.is_empty() && primary.retry.is_none() {
        return Arc::from(client);
    }

    let retry_config = primary.retry.clone().unwrap_or_else(RetryConfig::default);
    let fallbacks = fallbacks
        .iter()
        .map(|mc| {
            let mut mc = mc.clone();
            apply_preset_defaults(&mut mc);
            let client = create_client(&mc);
            (mc, client)
        })
        .collect();
    Arc::new(RetryingClient::new(client, fallbacks, retry_config))
}
