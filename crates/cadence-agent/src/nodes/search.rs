use futures::future::BoxFuture;
use tracing::{info, warn};

use cadence_tools::SearchPort;

use super::{decision_payload, report};
use crate::graph::{Node, NodeKind, NodeOutput};
use crate::state::SharedState;
use crate::workflow::SEARCH;

/// Runs the query named by the executor's `SEARCH:` line.
pub struct Search {
    port: SearchPort,
}

impl Search {
    pub fn new(port: SearchPort) -> Self {
        Self { port }
    }
}

impl Node for Search {
    fn name(&self) -> &str {
        SEARCH
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let Some(query) = decision_payload(state.last_content(), &["SEARCH:"]) else {
                return report(SEARCH, "Could not extract search query from executor decision");
            };
            info!(provider = %self.port.provider(), query = %query, "Searching");
            match self.port.search(&query).await {
                Ok(summary) => report(SEARCH, format!("Search results for '{}': {}", query, summary)),
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed");
                    report(SEARCH, format!("Error searching for '{}': {}", query, e))
                }
            }
        })
    }
}
