pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod state;
pub mod workflow;

pub use graph::{
    AbortReason, AbortedReport, FinalTranscript, GraphBuilder, GraphEngine, MarkerRouter, Node,
    NodeKind, NodeOutput, RunOutcome, Router,
};
pub use state::{PartialUpdate, SharedState};
pub use workflow::{ports_from_config, research_topology, research_workflow, ResearchPorts};
