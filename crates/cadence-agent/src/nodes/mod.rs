//! The node variants of the research workflow.
//!
//! Reasoners and executors wrap one LLM call each. Effectors read the
//! executor's decision from the last turn and perform one effect. Every
//! failure comes back as a turn, never as an error.

pub mod arithmetic;
pub mod conclusion;
pub mod executor;
pub mod memory;
pub mod reasoner;
pub mod reflection;
pub mod search;

pub use arithmetic::DataAnalysis;
pub use conclusion::Conclusion;
pub use executor::Executor;
pub use memory::{AddFinding, AddOpenQuestion, CloseQuestion};
pub use reasoner::Reasoner;
pub use reflection::Reflection;
pub use search::Search;

use cadence_core::types::Turn;

use crate::graph::marker::{extract_payload, parse_decision};
use crate::graph::NodeOutput;
use crate::state::PartialUpdate;

/// Argument of the decision in `text`: the first labelled payload, else the
/// payload after the routing marker.
pub(crate) fn decision_payload(text: &str, labels: &[&str]) -> Option<String> {
    extract_payload(text, labels).or_else(|| parse_decision(text).and_then(|d| d.payload))
}

/// One tool-result turn, no patch.
pub(crate) fn report(origin: &str, content: impl Into<String>) -> NodeOutput {
    PartialUpdate::turn(Turn::tool_result(origin, content)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_payload_prefers_label() {
        assert_eq!(
            decision_payload("ROUTING: SEARCH - SEARCH: population of Seattle", &["SEARCH:"]).as_deref(),
            Some("population of Seattle")
        );
        assert_eq!(
            decision_payload("ROUTING: ADD_OPEN_QUESTION - What is the area of NYC?", &["QUESTION:"])
                .as_deref(),
            Some("What is the area of NYC?")
        );
        assert_eq!(decision_payload("no decision", &["SEARCH:"]), None);
    }
}
