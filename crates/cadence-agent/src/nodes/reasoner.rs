use futures::future::BoxFuture;
use tracing::warn;

use cadence_core::types::{ChatMessage, Turn};
use cadence_llm::LlmPort;

use crate::graph::{Node, NodeKind, NodeOutput};
use crate::prompts;
use crate::state::{PartialUpdate, SharedState};

/// Thinks about the next step: one LLM call over the whole transcript and
/// the document.
pub struct Reasoner {
    name: String,
    llm: LlmPort,
    instructions: &'static str,
}

impl Reasoner {
    pub fn new(name: impl Into<String>, llm: LlmPort, instructions: &'static str) -> Self {
        Self {
            name: name.into(),
            llm,
            instructions,
        }
    }
}

impl Node for Reasoner {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Reasoner
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let prompt =
                prompts::reasoner_context(self.instructions, &state.transcript, &state.document);
            let content = match self.llm.complete(vec![ChatMessage::system(prompt)]).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(node = %self.name, error = %e, "Reasoner LLM call failed");
                    format!("Reasoning failed: {}", e)
                }
            };
            PartialUpdate::turn(Turn::agent(self.name.clone(), content)).into()
        })
    }
}
