use std::sync::Arc;
use std::time::Duration;

use cadence_agent::graph::RouteRule;
use cadence_agent::workflow::{
    self, MEMORY_EXECUTOR, MEMORY_REASONER, ORCHESTRATOR_EXECUTOR, ORCHESTRATOR_REASONER,
};
use cadence_agent::{
    research_workflow, AbortReason, GraphEngine, PartialUpdate, ResearchPorts, RunOutcome,
    SharedState,
};
use cadence_core::traits::SearchClient;
use cadence_core::types::Turn;
use cadence_llm::LlmPort;
use cadence_test_utils::{test_model, FailingSearch, ScriptedLlm, StubSearch};
use cadence_tools::{ExpressionEvaluator, SearchPort};
use tokio_util::sync::CancellationToken;

fn engine(llm: &ScriptedLlm, search: Arc<dyn SearchClient>) -> GraphEngine {
    let port = LlmPort::new(Arc::new(llm.clone()), test_model(), Duration::from_secs(120));
    let ports = ResearchPorts {
        llm: port.clone(),
        memory_llm: port,
        search: SearchPort::new(search, Duration::from_secs(60)),
        calculator: Arc::new(ExpressionEvaluator::new()),
    };
    research_workflow(ports, 8).unwrap()
}

fn origins(outcome: &RunOutcome) -> Vec<&str> {
    outcome
        .transcript()
        .iter()
        .map(|t| t.origin.as_deref().unwrap_or("-"))
        .collect()
}

#[tokio::test]
async fn test_full_run_reaches_conclusion() {
    let llm = ScriptedLlm::new([
        "We need Seattle's population first.",
        "ROUTING: SEARCH - SEARCH: population of Seattle",
        "Now double-check the arithmetic.",
        "ROUTING: DATA_ANALYSIS - CALCULATION: 2 + 2 * 3",
        "We have enough to answer.",
        "ROUTING: CONCLUSION - CONCLUSION: FINDINGS: Seattle has about 750,000 people LIMITATIONS: 2022 estimate",
        "Seattle has roughly 750,000 residents.",
    ]);
    let search = StubSearch::new("Seattle population is about 750,000 (2022).");
    let engine = engine(&llm, Arc::new(search.clone()));

    let outcome = engine.run("How many people live in Seattle?", 40).await;

    let RunOutcome::Terminated(done) = &outcome else {
        panic!("expected termination, got {:?}", outcome);
    };
    assert_eq!(done.step_count, 9);
    assert_eq!(done.conclusion(), "CONCLUSION: Seattle has roughly 750,000 residents.");
    assert_eq!(search.queries(), vec!["population of Seattle"]);
    assert_eq!(
        origins(&outcome),
        vec![
            "-",
            ORCHESTRATOR_REASONER,
            ORCHESTRATOR_EXECUTOR,
            workflow::SEARCH,
            ORCHESTRATOR_REASONER,
            ORCHESTRATOR_EXECUTOR,
            workflow::DATA_ANALYSIS,
            ORCHESTRATOR_REASONER,
            ORCHESTRATOR_EXECUTOR,
            workflow::CONCLUSION,
        ]
    );
    assert_eq!(outcome.transcript()[6].content, "Calculation: 2 + 2 * 3 = 8");
    // the conclusion prompt is built from the executor's sections
    let prompt = llm.prompt_text(6);
    assert!(prompt.contains("Seattle has about 750,000 people"));
    assert!(prompt.contains("LIMITATIONS:\n2022 estimate"));
}

#[tokio::test]
async fn test_aborts_at_exactly_max_steps() {
    let llm = ScriptedLlm::default().with_idle_response("no idea");
    let engine = engine(&llm, Arc::new(StubSearch::new("")));

    let outcome = engine.run("Compare NYC and SF", 7).await;

    let RunOutcome::Aborted(report) = outcome else {
        panic!("expected abort");
    };
    assert_eq!(report.reason, AbortReason::LoopBoundExceeded { max_steps: 7 });
    assert_eq!(report.step_count, 7);
    assert_eq!(report.transcript.len(), 8);
    assert_eq!(llm.call_count(), 7);
    // never reached an effector
    assert_eq!(report.visited_since_last_tool, 7);
    assert_eq!(report.last_node.as_deref(), Some(ORCHESTRATOR_REASONER));
}

#[tokio::test(start_paused = true)]
async fn test_search_timeout_is_reported_and_run_continues() {
    let llm = ScriptedLlm::new([
        "Find the population.",
        "ROUTING: SEARCH - SEARCH: population of Seattle",
    ])
    .with_idle_response("no idea");
    let engine = engine(&llm, Arc::new(FailingSearch::Hang));

    let outcome = engine.run("How many people live in Seattle?", 4).await;

    assert!(!outcome.is_terminated());
    assert_eq!(
        outcome.transcript()[3].content,
        "Error searching for 'population of Seattle': search timed out after 60s"
    );
    // the next reasoner sees the failure
    assert!(llm
        .prompt_text(2)
        .contains("Error searching for 'population of Seattle'"));
}

#[tokio::test]
async fn test_search_auth_failure_becomes_a_turn() {
    let llm = ScriptedLlm::new(["search", "ROUTING: SEARCH - SEARCH: x"]).with_idle_response("no idea");
    let engine = engine(&llm, Arc::new(FailingSearch::Auth));

    let outcome = engine.run("q", 3).await;
    assert!(outcome.transcript()[3]
        .content
        .starts_with("Error searching for 'x': "));
}

#[tokio::test]
async fn test_memory_subgraph_records_questions() {
    let llm = ScriptedLlm::new([
        "Log the sub-questions before searching.",
        "ROUTING: MEMORY_MANAGEMENT - log questions about Seattle",
        "Add an open question about the population.",
        "ROUTING: ADD_OPEN_QUESTION - QUESTION: What is the population of Seattle?",
        "Also track the area.",
        "ROUTING: MEMORY_MANAGEMENT - log the area question",
        "Add an open question about the area.",
        "ROUTING: ADD_OPEN_QUESTION - QUESTION: What is the area of Seattle?",
    ])
    .with_idle_response("no idea");
    let engine = engine(&llm, Arc::new(StubSearch::new("")));

    let outcome = engine.run("What is Seattle's population density?", 10).await;

    assert_eq!(
        outcome.document().open_questions,
        vec!["What is the population of Seattle?", "What is the area of Seattle?"]
    );
    assert_eq!(
        outcome.transcript()[5].content,
        "Added open question: 'What is the population of Seattle?'"
    );
    // the second question sees the first in the document
    assert!(llm.prompt_text(6).contains("What is the population of Seattle?"));
}

#[tokio::test]
async fn test_unparsable_memory_decision_returns_to_memory_reasoner() {
    let llm = ScriptedLlm::new([
        "Record something.",
        "ROUTING: MEMORY_MANAGEMENT - record",
        "Maybe add a question.",
        "I am not sure what to do.",
    ])
    .with_idle_response("no idea");
    let engine = engine(&llm, Arc::new(StubSearch::new("")));

    let outcome = engine.run("q", 5).await;

    assert_eq!(
        origins(&outcome)[3..],
        [MEMORY_REASONER, MEMORY_EXECUTOR, MEMORY_REASONER]
    );
}

const QUESTION_SCRIPT: [&str; 12] = [
    "r",
    "ROUTING: MEMORY_MANAGEMENT - q1",
    "r",
    "ROUTING: ADD_OPEN_QUESTION - QUESTION: Q1",
    "r",
    "ROUTING: MEMORY_MANAGEMENT - q2",
    "r",
    "ROUTING: ADD_OPEN_QUESTION - QUESTION: Q2",
    "r",
    "ROUTING: MEMORY_MANAGEMENT - close q1",
    "r",
    "ROUTING: CLOSE_QUESTION - QUESTION: Q1 | answer: yes",
];

#[tokio::test]
async fn test_open_questions_grow_monotonically() {
    // replay the same script with growing bounds; each run's document
    // extends the previous one's
    let mut previous: Vec<String> = Vec::new();
    for max_steps in 1..=16 {
        let llm = ScriptedLlm::new(QUESTION_SCRIPT).with_idle_response("no idea");
        let outcome = engine(&llm, Arc::new(StubSearch::new(""))).run("q", max_steps).await;
        let open = &outcome.document().open_questions;
        assert!(open.starts_with(&previous), "open questions shrank at {}", max_steps);
        previous = open.clone();
    }

    // closing does not remove the question from the open list
    assert_eq!(previous, vec!["Q1", "Q2"]);
    let llm = ScriptedLlm::new(QUESTION_SCRIPT).with_idle_response("no idea");
    let outcome = engine(&llm, Arc::new(StubSearch::new(""))).run("q", 16).await;
    assert!(outcome.document().is_closed("Q1"));
    assert!(!outcome.document().is_closed("Q2"));
}

#[tokio::test]
async fn test_cancelled_run_aborts_before_next_step() {
    let llm = ScriptedLlm::default().with_idle_response("no idea");
    let engine = engine(&llm, Arc::new(StubSearch::new("")));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = engine
        .run_with_state(SharedState::new("q"), 10, cancel)
        .await;

    let RunOutcome::Aborted(report) = outcome else {
        panic!("expected abort");
    };
    assert_eq!(report.reason, AbortReason::Cancelled);
    assert_eq!(report.step_count, 0);
    assert_eq!(llm.call_count(), 0);
}

#[test]
fn test_empty_update_is_identity() {
    let mut state = SharedState::with_document("q", cadence_test_utils::sample_document());
    state.transcript.push(Turn::agent(ORCHESTRATOR_REASONER, "thinking"));
    let before = state.clone();
    state.apply(PartialUpdate::empty()).unwrap();
    assert_eq!(state, before);
}

#[test]
fn test_routing_is_deterministic() {
    let router = workflow::orchestrator_router();
    let mut state = SharedState::new("q");
    state.transcript.push(Turn::agent(
        ORCHESTRATOR_EXECUTOR,
        "ROUTING: SEARCH - SEARCH: population of Seattle",
    ));
    let first = router.classify(state.last_content());
    for _ in 0..10 {
        assert_eq!(router.classify(state.last_content()), first);
    }
    assert_eq!(first.target, workflow::SEARCH);
    assert_eq!(first.rule, RouteRule::Marker);
}
