use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM client: OpenAI-compatible streaming completion.
pub trait LlmClient: Send + Sync + 'static {
    /// Send role-tagged messages and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Web search: a query in, a text summary out.
pub trait SearchClient: Send + Sync + 'static {
    /// Provider name, used in logs and failure text.
    fn name(&self) -> &str;

    fn search(&self, query: &str) -> BoxFuture<'_, Result<String>>;
}

/// Arithmetic evaluation over a restricted expression alphabet.
pub trait Calculator: Send + Sync + 'static {
    /// Evaluate `expr` and render the numeric result as text.
    fn evaluate(&self, expr: &str) -> Result<String>;
}
