use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::state::{PartialUpdate, SharedState};

/// The three roles a node can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Thinks: one LLM call over the full transcript and document.
    Reasoner,
    /// Decides: one LLM call that picks exactly one action from a menu.
    Executor,
    /// Acts: performs one external effect named by the previous turn.
    Effector,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Reasoner => "reasoner",
            Self::Executor => "executor",
            Self::Effector => "effector",
        };
        f.write_str(s)
    }
}

/// What a node returns from one execution.
#[derive(Debug, Clone, Default)]
pub struct NodeOutput {
    pub update: PartialUpdate,
    /// Successor proposed by the node itself. When `None` the engine
    /// consults the edge table.
    pub next_hint: Option<String>,
}

impl NodeOutput {
    pub fn new(update: PartialUpdate) -> Self {
        Self {
            update,
            next_hint: None,
        }
    }

    pub fn with_hint(mut self, next: impl Into<String>) -> Self {
        self.next_hint = Some(next.into());
        self
    }
}

impl From<PartialUpdate> for NodeOutput {
    fn from(update: PartialUpdate) -> Self {
        Self::new(update)
    }
}

/// A named unit of work in the graph.
///
/// `execute` is infallible: a node that hits a ToolPort failure encodes it
/// as a turn in its update, so the next reasoner can see it.
pub trait Node: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput>;
}
