use futures::future::BoxFuture;
use tracing::{debug, warn};

use cadence_core::types::{ChatMessage, Turn};
use cadence_llm::LlmPort;

use crate::graph::{Node, NodeKind, NodeOutput};
use crate::state::{PartialUpdate, SharedState};

/// Picks one action from a closed menu. Its turn carries the routing
/// marker the router reads.
pub struct Executor {
    name: String,
    llm: LlmPort,
    menu: &'static str,
}

impl Executor {
    pub fn new(name: impl Into<String>, llm: LlmPort, menu: &'static str) -> Self {
        Self {
            name: name.into(),
            llm,
            menu,
        }
    }

    fn messages(&self, state: &SharedState) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(self.menu))
            .chain(state.transcript.iter().map(Turn::to_chat_message))
            .collect()
    }
}

impl Node for Executor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Executor
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let content = match self.llm.complete(self.messages(state)).await {
                Ok(text) => {
                    debug!(node = %self.name, decision = %text.lines().next().unwrap_or(""), "Executor decision");
                    text
                }
                Err(e) => {
                    // carries no marker, so the router sends the run back to the reasoner
                    warn!(node = %self.name, error = %e, "Executor LLM call failed");
                    format!("Executor failed to choose an action: {}", e)
                }
            };
            PartialUpdate::turn(Turn::agent(self.name.clone(), content)).into()
        })
    }
}
