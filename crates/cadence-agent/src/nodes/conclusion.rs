use futures::future::BoxFuture;
use tracing::{info, warn};

use cadence_core::types::ChatMessage;
use cadence_llm::LlmPort;

use super::report;
use crate::graph::marker::extract_section;
use crate::graph::{Node, NodeKind, NodeOutput};
use crate::prompts;
use crate::state::SharedState;
use crate::workflow::CONCLUSION;

const DEFAULT_FINDINGS: &str = "Based on our research and analysis from the conversation";

/// The terminal effector: writes the final answer.
pub struct Conclusion {
    llm: LlmPort,
}

impl Conclusion {
    pub fn new(llm: LlmPort) -> Self {
        Self { llm }
    }
}

/// Split a `CONCLUSION:` section into findings and optional limitations.
fn sections(text: &str) -> (String, Option<String>) {
    let Some(body) = extract_section(text, "CONCLUSION:") else {
        return (DEFAULT_FINDINGS.to_string(), None);
    };
    let Some(findings) = extract_section(body, "FINDINGS:") else {
        return (body.to_string(), None);
    };
    match findings.split_once("LIMITATIONS:") {
        Some((findings, limitations)) => {
            let limitations = limitations.trim();
            (
                findings.trim().to_string(),
                (!limitations.is_empty()).then(|| limitations.to_string()),
            )
        }
        None => (findings.to_string(), None),
    }
}

impl Node for Conclusion {
    fn name(&self) -> &str {
        CONCLUSION
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let (findings, limitations) = sections(state.last_content());
            let prompt = prompts::conclusion(&findings, limitations.as_deref());
            match self.llm.complete(vec![ChatMessage::system(prompt)]).await {
                Ok(text) => {
                    info!(chars = text.len(), "Research concluded");
                    report(CONCLUSION, format!("CONCLUSION: {}", text))
                }
                Err(e) => {
                    warn!(error = %e, "Conclusion failed");
                    report(CONCLUSION, format!("Error creating conclusion: {}", e))
                }
            }
        })
    }
}
