//! The research workflow: an orchestrator think/act loop with a memory
//! subgraph for editing the research document.
//!
//! ```text
//! orchestrator_reasoner -> orchestrator_executor
//! orchestrator_executor => memory_reasoner | data_analysis | search | reflection | conclusion
//!                          (fallback: orchestrator_reasoner)
//! memory_reasoner -> memory_executor
//! memory_executor => add_open_question | add_finding | close_question
//!                    (fallback: memory_reasoner)
//! effectors -> orchestrator_reasoner; conclusion ends the run
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use cadence_core::config::{AppConfig, ModelConfig};
use cadence_core::error::{CadenceError, Result};
use cadence_core::traits::{Calculator, LlmClient, SearchClient};
use cadence_core::types::{ChatMessage, StreamDelta};
use cadence_llm::LlmPort;
use cadence_tools::SearchPort;

use crate::graph::{GraphEngine, MarkerRouter};
use crate::nodes::{
    AddFinding, AddOpenQuestion, CloseQuestion, Conclusion, DataAnalysis, Executor, Reasoner,
    Reflection, Search,
};
use crate::prompts;

pub const ORCHESTRATOR_REASONER: &str = "orchestrator_reasoner";
pub const ORCHESTRATOR_EXECUTOR: &str = "orchestrator_executor";
pub const MEMORY_REASONER: &str = "memory_reasoner";
pub const MEMORY_EXECUTOR: &str = "memory_executor";
pub const ADD_OPEN_QUESTION: &str = "add_open_question";
pub const ADD_FINDING: &str = "add_finding";
pub const CLOSE_QUESTION: &str = "close_question";
pub const DATA_ANALYSIS: &str = "data_analysis";
pub const SEARCH: &str = "search";
pub const REFLECTION: &str = "reflection";
pub const CONCLUSION: &str = "conclusion";

/// The ToolPorts the workflow's nodes call.
#[derive(Clone)]
pub struct ResearchPorts {
    /// Orchestrator reasoner, executor, reflection, and conclusion.
    pub llm: LlmPort,
    /// Memory reasoner and executor.
    pub memory_llm: LlmPort,
    pub search: SearchPort,
    pub calculator: Arc<dyn Calculator>,
}

pub fn orchestrator_router() -> MarkerRouter {
    MarkerRouter::new(ORCHESTRATOR_REASONER)
        .with_route("MEMORY_MANAGEMENT", MEMORY_REASONER, &["memory_management"])
        .with_route("DATA_ANALYSIS", DATA_ANALYSIS, &["calculation:"])
        .with_route("SEARCH", SEARCH, &["search:"])
        .with_route("REFLECTION", REFLECTION, &["reflection:"])
        .with_route("CONCLUSION", CONCLUSION, &["conclusion:"])
}

pub fn memory_router() -> MarkerRouter {
    MarkerRouter::new(MEMORY_REASONER)
        .with_route("ADD_OPEN_QUESTION", ADD_OPEN_QUESTION, &["add_open_question"])
        .with_route("ADD_FINDING", ADD_FINDING, &["add_finding"])
        .with_route("CLOSE_QUESTION", CLOSE_QUESTION, &["close_question"])
}

/// Wire the research graph over the given ports.
pub fn research_workflow(ports: ResearchPorts, stall_warning_steps: usize) -> Result<GraphEngine> {
    let mut builder = GraphEngine::builder()
        .add_node(Reasoner::new(
            ORCHESTRATOR_REASONER,
            ports.llm.clone(),
            prompts::ORCHESTRATOR_REASONER,
        ))
        .add_node(Executor::new(
            ORCHESTRATOR_EXECUTOR,
            ports.llm.clone(),
            prompts::ORCHESTRATOR_EXECUTOR,
        ))
        .add_node(Reasoner::new(
            MEMORY_REASONER,
            ports.memory_llm.clone(),
            prompts::MEMORY_REASONER,
        ))
        .add_node(Executor::new(
            MEMORY_EXECUTOR,
            ports.memory_llm,
            prompts::MEMORY_EXECUTOR,
        ))
        .add_node(AddOpenQuestion)
        .add_node(AddFinding)
        .add_node(CloseQuestion)
        .add_node(DataAnalysis::new(ports.calculator))
        .add_node(Search::new(ports.search))
        .add_node(Reflection::new(ports.llm.clone()))
        .add_node(Conclusion::new(ports.llm))
        .add_edge(ORCHESTRATOR_REASONER, ORCHESTRATOR_EXECUTOR)
        .add_conditional_edge(ORCHESTRATOR_EXECUTOR, orchestrator_router())
        .add_edge(MEMORY_REASONER, MEMORY_EXECUTOR)
        .add_conditional_edge(MEMORY_EXECUTOR, memory_router());

    for effector in [ADD_OPEN_QUESTION, ADD_FINDING, CLOSE_QUESTION, DATA_ANALYSIS, SEARCH, REFLECTION] {
        builder = builder.add_edge(effector, ORCHESTRATOR_REASONER);
    }

    builder
        .start(ORCHESTRATOR_REASONER)
        .terminal(CONCLUSION)
        .stall_warning_steps(stall_warning_steps)
        .build()
}

/// Build the ports from configuration. Fails on missing credentials.
pub fn ports_from_config(config: &AppConfig) -> Result<ResearchPorts> {
    config.validate()?;

    let llm_timeout = Duration::from_secs(config.engine.llm_timeout_secs);
    let mut model = config.model.clone();
    cadence_llm::apply_preset_defaults(&mut model);
    let mut memory_model = config.memory_model();
    cadence_llm::apply_preset_defaults(&mut memory_model);

    let client = cadence_llm::build_client(&model, &config.fallback_models);
    let search_config = config
        .search
        .as_ref()
        .ok_or_else(|| CadenceError::Config("no [search] section configured".into()))?;

    Ok(ResearchPorts {
        llm: LlmPort::new(client.clone(), model, llm_timeout),
        memory_llm: LlmPort::new(client, memory_model, llm_timeout),
        search: SearchPort::new(
            cadence_tools::create_search(search_config)?,
            Duration::from_secs(config.engine.search_timeout_secs),
        ),
        calculator: Arc::new(cadence_tools::ExpressionEvaluator::new()),
    })
}

/// Port backend for a workflow that is only inspected, never run.
struct Unconfigured;

impl LlmClient for Unconfigured {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        _messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        Box::pin(async { Err(CadenceError::Config("no LLM configured".into())) })
    }
}

impl SearchClient for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn search(&self, _query: &str) -> BoxFuture<'_, Result<String>> {
        Box::pin(async { Err(CadenceError::Config("no search provider configured".into())) })
    }
}

/// The research graph over ports that need no credentials, for describing
/// the topology. Every LLM and search call fails.
pub fn research_topology(stall_warning_steps: usize) -> Result<GraphEngine> {
    let llm = LlmPort::new(
        Arc::new(Unconfigured),
        ModelConfig::new("openai", "unconfigured"),
        Duration::from_secs(1),
    );
    research_workflow(
        ResearchPorts {
            llm: llm.clone(),
            memory_llm: llm,
            search: SearchPort::new(Arc::new(Unconfigured), Duration::from_secs(1)),
            calculator: Arc::new(cadence_tools::ExpressionEvaluator::new()),
        },
        stall_warning_steps,
    )
}
