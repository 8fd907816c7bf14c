//! Graph execution engine.
//!
//! A workflow is a fixed set of named [`Node`]s plus an edge table mapping
//! each node to either a static successor or a [`Router`]. The
//! [`GraphEngine`] walks it one node per step, merging each node's partial
//! update into the [`SharedState`](crate::state::SharedState), until the
//! terminal node has run or the step bound is hit.

pub mod edge;
pub mod engine;
pub mod marker;
pub mod node;
pub mod router;

pub use edge::Edge;
pub use engine::{
    AbortReason, AbortedReport, FinalTranscript, GraphBuilder, GraphEngine, RunContext,
    RunOutcome,
};
pub use marker::{parse_decision, Decision};
pub use node::{Node, NodeKind, NodeOutput};
pub use router::{MarkerRouter, RouteDecision, RouteRule, Router};
