use futures::future::BoxFuture;
use tracing::warn;

use cadence_core::types::ChatMessage;
use cadence_llm::LlmPort;

use super::{decision_payload, report};
use crate::graph::{Node, NodeKind, NodeOutput};
use crate::prompts;
use crate::state::SharedState;
use crate::workflow::REFLECTION;

/// Thinks over the executor's `REFLECTION:` text without external tools.
pub struct Reflection {
    llm: LlmPort,
}

impl Reflection {
    pub fn new(llm: LlmPort) -> Self {
        Self { llm }
    }
}

fn thoughts_of(text: &str) -> Option<String> {
    decision_payload(text, &["REFLECTION:"])
        .or_else(|| text.to_lowercase().contains("reflect").then(|| text.to_string()))
}

impl Node for Reflection {
    fn name(&self) -> &str {
        REFLECTION
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let Some(thoughts) = thoughts_of(state.last_content()) else {
                return report(REFLECTION, "Could not extract reflection thoughts from executor decision");
            };
            let messages = vec![ChatMessage::system(prompts::reflection(&thoughts))];
            match self.llm.complete(messages).await {
                Ok(text) => report(REFLECTION, format!("Reflection: {}", text)),
                Err(e) => {
                    warn!(error = %e, "Reflection failed");
                    report(REFLECTION, format!("Error during reflection: {}", e))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use cadence_core::error::CadenceError;
    use cadence_core::types::Turn;
    use cadence_test_utils::{test_model, ScriptedLlm};

    fn node(llm: &ScriptedLlm) -> Reflection {
        Reflection::new(LlmPort::new(Arc::new(llm.clone()), test_model(), Duration::from_secs(5)))
    }

    fn state(decision: &str) -> SharedState {
        let mut state = SharedState::new("q");
        state.transcript.push(Turn::agent("orchestrator_executor", decision));
        state
    }

    #[tokio::test]
    async fn test_reflects_on_payload() {
        let llm = ScriptedLlm::new(["The ratio looks plausible."]);
        let out = node(&llm)
            .execute(&state("ROUTING: REFLECTION - REFLECTION: is 10.3 a sensible ratio?"))
            .await;
        assert_eq!(out.update.turns[0].content, "Reflection: The ratio looks plausible.");
        assert!(llm.prompt_text(0).contains("is 10.3 a sensible ratio?"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_text() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        llm.push_error(|| CadenceError::RateLimited("429".into()));
        let out = node(&llm)
            .execute(&state("I should reflect on what we have"))
            .await;
        assert_eq!(
            out.update.turns[0].content,
            "Error during reflection: LLM rate limited: 429"
        );
    }

    #[tokio::test]
    async fn test_nothing_to_reflect_on() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let out = node(&llm).execute(&state("Nothing further to add.")).await;
        assert!(out.update.turns[0].content.starts_with("Could not extract"));
        assert_eq!(llm.call_count(), 0);
    }
}
