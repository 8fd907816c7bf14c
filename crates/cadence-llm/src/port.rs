use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::debug;

use cadence_core::config::ModelConfig;
use cadence_core::error::{CadenceError, Result};
use cadence_core::traits::LlmClient;
use cadence_core::types::{ChatMessage, StreamDelta};

/// The LLM as the graph's nodes see it: messages in, one text blob out,
/// bounded by a timeout.
///
/// Cheap to clone; the client is shared.
#[derive(Clone)]
pub struct LlmPort {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
    timeout: Duration,
}

impl LlmPort {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig, timeout: Duration) -> Self {
        Self {
            client,
            config,
            timeout,
        }
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    /// Collect a full completion. The whole request, including streaming,
    /// must finish within the port's timeout.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let start = Instant::now();
        let collect = async {
            let mut stream = self.client.chat_stream(&self.config, messages).await?;
            let mut text = String::new();
            while let Some(delta) = stream.next().await {
                match delta? {
                    StreamDelta::TextDelta(t) => text.push_str(&t),
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => debug!(input_tokens, output_tokens, "LLM usage"),
                    StreamDelta::Stop(_) => {}
                }
            }
            Ok::<_, CadenceError>(text)
        };

        let text = tokio::time::timeout(self.timeout, collect)
            .await
            .map_err(|_| CadenceError::timeout("llm", self.timeout.as_secs()))??;

        debug!(
            model = %self.config.model_id,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "LLM completion"
        );
        Ok(text)
    }
}

impl std::fmt::Debug for LlmPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmPort")
            .field("model", &self.config.model_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}
