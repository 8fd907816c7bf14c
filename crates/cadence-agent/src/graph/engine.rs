use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cadence_core::document::Document;
use cadence_core::error::{CadenceError, Result};
use cadence_core::types::{RunId, Turn};

use super::edge::Edge;
use super::node::{Node, NodeKind};
use super::router::{RouteRule, Router};
use crate::state::SharedState;

pub const DEFAULT_STALL_WARNING_STEPS: usize = 8;

/// Per-run counters. Created at run start, dropped at run end.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub step_count: usize,
    pub max_steps: usize,
    /// Steps since an effector last ran.
    pub visited_since_last_tool: usize,
    pub last_node: Option<String>,
}

impl RunContext {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            ..Default::default()
        }
    }
}

/// Why a run stopped without reaching the terminal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    LoopBoundExceeded { max_steps: usize },
    Cancelled,
    /// A router or edge produced a successor that is not registered.
    DeadEnd { node: String },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoopBoundExceeded { max_steps } => {
                write!(f, "loop bound exceeded ({} steps)", max_steps)
            }
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadEnd { node } => write!(f, "no usable successor after '{}'", node),
        }
    }
}

/// A run that reached the terminal node.
#[derive(Debug, Clone)]
pub struct FinalTranscript {
    pub transcript: Vec<Turn>,
    pub document: Document,
    pub step_count: usize,
}

impl FinalTranscript {
    /// Content of the terminal node's turn.
    pub fn conclusion(&self) -> &str {
        self.transcript.last().map(|t| t.content.as_str()).unwrap_or("")
    }
}

/// A run that was stopped, with everything needed to see where it stalled.
#[derive(Debug, Clone)]
pub struct AbortedReport {
    pub reason: AbortReason,
    pub step_count: usize,
    pub last_node: Option<String>,
    pub visited_since_last_tool: usize,
    pub transcript: Vec<Turn>,
    pub document: Document,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Terminated(FinalTranscript),
    Aborted(AbortedReport),
}

impl RunOutcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    pub fn transcript(&self) -> &[Turn] {
        match self {
            Self::Terminated(t) => &t.transcript,
            Self::Aborted(r) => &r.transcript,
        }
    }

    pub fn document(&self) -> &Document {
        match self {
            Self::Terminated(t) => &t.document,
            Self::Aborted(r) => &r.document,
        }
    }

    pub fn step_count(&self) -> usize {
        match self {
            Self::Terminated(t) => t.step_count,
            Self::Aborted(r) => r.step_count,
        }
    }
}

/// Assembles and validates a [`GraphEngine`].
pub struct GraphBuilder {
    nodes: Vec<Arc<dyn Node>>,
    edges: Vec<(String, Edge)>,
    start: Option<String>,
    terminal: Option<String>,
    stall_warning_steps: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            start: None,
            terminal: None,
            stall_warning_steps: DEFAULT_STALL_WARNING_STEPS,
        }
    }

    pub fn add_node(mut self, node: impl Node) -> Self {
        self.nodes.push(Arc::new(node));
        self
    }

    pub fn add_shared_node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.push(node);
        self
    }

    /// Fixed successor.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::Static(to.into())));
        self
    }

    /// Successor chosen by `router` after `from` runs.
    pub fn add_conditional_edge(mut self, from: impl Into<String>, router: impl Router) -> Self {
        self.edges
            .push((from.into(), Edge::Conditional(Arc::new(router))));
        self
    }

    pub fn start(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    pub fn terminal(mut self, name: impl Into<String>) -> Self {
        self.terminal = Some(name.into());
        self
    }

    pub fn stall_warning_steps(mut self, steps: usize) -> Self {
        self.stall_warning_steps = steps;
        self
    }

    /// Check the topology and freeze it.
    pub fn build(self) -> Result<GraphEngine> {
        let mut nodes = HashMap::new();
        let mut order = Vec::new();
        for node in self.nodes {
            let name = node.name().to_string();
            if nodes.insert(name.clone(), node).is_some() {
                return Err(config_error(format!("duplicate node '{}'", name)));
            }
            order.push(name);
        }

        let start = self
            .start
            .ok_or_else(|| config_error("no start node set".into()))?;
        let terminal = self
            .terminal
            .ok_or_else(|| config_error("no terminal node set".into()))?;
        for (role, name) in [("start", &start), ("terminal", &terminal)] {
            if !nodes.contains_key(name) {
                return Err(config_error(format!("{} node '{}' is not registered", role, name)));
            }
        }
        if start == terminal {
            return Err(config_error(format!(
                "'{}' cannot be both start and terminal",
                start
            )));
        }

        let mut edges = HashMap::new();
        let mut terminal_reachable = false;
        for (from, edge) in self.edges {
            if !nodes.contains_key(&from) {
                return Err(config_error(format!("edge from unknown node '{}'", from)));
            }
            if from == terminal {
                return Err(config_error(format!(
                    "terminal node '{}' cannot have an outgoing edge",
                    from
                )));
            }
            for target in edge.targets() {
                if !nodes.contains_key(target) {
                    return Err(config_error(format!(
                        "edge from '{}' to unknown node '{}'",
                        from, target
                    )));
                }
            }
            match &edge {
                Edge::Static(to) if *to == terminal => {
                    return Err(config_error(format!(
                        "static edge '{}' -> '{}' bypasses routing into the terminal node",
                        from, to
                    )));
                }
                Edge::Conditional(router) => {
                    if router.fallback() == terminal {
                        return Err(config_error(format!(
                            "router on '{}' falls back to the terminal node",
                            from
                        )));
                    }
                    terminal_reachable |= router.targets().contains(&terminal.as_str());
                }
                Edge::Static(_) => {}
            }
            if edges.insert(from.clone(), edge).is_some() {
                return Err(config_error(format!("node '{}' has two outgoing edges", from)));
            }
        }

        if let Some(dangling) = order
            .iter()
            .find(|name| **name != terminal && !edges.contains_key(*name))
        {
            return Err(config_error(format!("node '{}' has no outgoing edge", dangling)));
        }
        if !terminal_reachable {
            return Err(config_error(format!(
                "no router leads to terminal node '{}'",
                terminal
            )));
        }

        Ok(GraphEngine {
            nodes,
            order,
            edges,
            start,
            terminal,
            stall_warning_steps: self.stall_warning_steps,
        })
    }
}

fn config_error(message: String) -> CadenceError {
    CadenceError::Config(format!("invalid graph: {}", message))
}

/// Drives a run over an immutable node registry and edge table.
///
/// The engine holds no per-run state; share it behind an `Arc` to run
/// several independent runs concurrently.
pub struct GraphEngine {
    nodes: HashMap<String, Arc<dyn Node>>,
    order: Vec<String>,
    edges: HashMap<String, Edge>,
    start: String,
    terminal: String,
    stall_warning_steps: usize,
}

impl GraphEngine {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn start_node(&self) -> &str {
        &self.start
    }

    pub fn terminal_node(&self) -> &str {
        &self.terminal
    }

    /// Registered node names in registration order.
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    /// Run from a fresh state holding `input`.
    pub async fn run(&self, input: impl Into<String>, max_steps: usize) -> RunOutcome {
        self.run_with_state(SharedState::new(input), max_steps, CancellationToken::new())
            .await
    }

    /// Run from an existing state. `cancel` is observed between steps.
    pub async fn run_with_state(
        &self,
        mut state: SharedState,
        max_steps: usize,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let run_id = RunId::new();
        let started = Instant::now();
        let mut ctx = RunContext::new(max_steps);
        let mut stall_warned = false;
        let mut current = self.start.clone();

        info!(run_id = %run_id, start = %current, max_steps, "Run started");

        loop {
            if cancel.is_cancelled() {
                return self.abort(&run_id, AbortReason::Cancelled, ctx, state);
            }
            if ctx.step_count >= max_steps {
                return self.abort(&run_id, AbortReason::LoopBoundExceeded { max_steps }, ctx, state);
            }

            let Some(node) = self.nodes.get(&current).cloned() else {
                error!(run_id = %run_id, node = %current, "Successor is not a registered node");
                let node = ctx.last_node.clone().unwrap_or_else(|| current.clone());
                return self.abort(&run_id, AbortReason::DeadEnd { node }, ctx, state);
            };

            ctx.step_count += 1;
            ctx.last_node = Some(current.clone());
            let kind = node.kind();
            info!(run_id = %run_id, step = ctx.step_count, node = %current, kind = %kind, "Executing node");

            let node_start = Instant::now();
            let output = node.execute(&state).await;
            debug!(
                node = %current,
                turns = output.update.turns.len(),
                patch = output.update.patch.is_some(),
                elapsed_ms = node_start.elapsed().as_millis() as u64,
                "Node finished"
            );

            if let Err(e) = state.apply(output.update) {
                warn!(node = %current, error = %e, "Document patch rejected");
                state.transcript.push(Turn::tool_result(
                    current.clone(),
                    format!("Document update from {} rejected: {}", current, e),
                ));
            }

            if kind == NodeKind::Effector {
                ctx.visited_since_last_tool = 0;
                stall_warned = false;
            } else {
                ctx.visited_since_last_tool += 1;
                if ctx.visited_since_last_tool >= self.stall_warning_steps && !stall_warned {
                    warn!(
                        run_id = %run_id,
                        steps = ctx.visited_since_last_tool,
                        node = %current,
                        "No effector has run for a while; the graph may be cycling"
                    );
                    stall_warned = true;
                }
            }

            if current == self.terminal {
                info!(
                    run_id = %run_id,
                    steps = ctx.step_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run terminated"
                );
                return RunOutcome::Terminated(FinalTranscript {
                    transcript: state.transcript,
                    document: state.document,
                    step_count: ctx.step_count,
                });
            }

            match self.next_node(&current, output.next_hint, &state) {
                Some(next) => current = next,
                None => {
                    let node = current.clone();
                    return self.abort(&run_id, AbortReason::DeadEnd { node }, ctx, state);
                }
            }
        }
    }

    fn next_node(&self, current: &str, hint: Option<String>, state: &SharedState) -> Option<String> {
        if let Some(hint) = hint {
            if hint == self.terminal {
                warn!(node = %current, hint = %hint, "Ignoring hint to the terminal node");
            } else if !self.nodes.contains_key(&hint) {
                warn!(node = %current, hint = %hint, "Ignoring hint to an unknown node");
            } else {
                debug!(node = %current, next = %hint, "Following node hint");
                return Some(hint);
            }
        }

        match self.edges.get(current)? {
            Edge::Static(to) => Some(to.clone()),
            Edge::Conditional(router) => Some(self.route(current, router.as_ref(), state)),
        }
    }

    fn route(&self, current: &str, router: &dyn Router, state: &SharedState) -> String {
        let decision = router.decide(state);
        match decision.rule {
            RouteRule::Fallback => warn!(
                node = %current,
                next = %decision.target,
                "No recognisable decision, returning to reasoner"
            ),
            rule => debug!(
                node = %current,
                next = %decision.target,
                action = decision.action.as_deref().unwrap_or(""),
                rule = ?rule,
                "Routed"
            ),
        }
        if !self.nodes.contains_key(&decision.target) {
            warn!(node = %current, target = %decision.target, "Router chose an unknown node, using fallback");
            return router.fallback().to_string();
        }
        decision.target
    }

    fn abort(
        &self,
        run_id: &RunId,
        reason: AbortReason,
        ctx: RunContext,
        state: SharedState,
    ) -> RunOutcome {
        warn!(
            run_id = %run_id,
            reason = %reason,
            steps = ctx.step_count,
            last_node = ctx.last_node.as_deref().unwrap_or("-"),
            "Run aborted"
        );
        RunOutcome::Aborted(AbortedReport {
            reason,
            step_count: ctx.step_count,
            last_node: ctx.last_node,
            visited_since_last_tool: ctx.visited_since_last_tool,
            transcript: state.transcript,
            document: state.document,
        })
    }

    /// Human-readable node and edge table.
    pub fn describe(&self) -> String {
        let mut out = format!("start: {}\nterminal: {}\n", self.start, self.terminal);
        for name in &self.order {
            let kind = self
                .nodes
                .get(name)
                .map(|n| n.kind().to_string())
                .unwrap_or_default();
            let edge = match self.edges.get(name) {
                None => "(end)".to_string(),
                Some(Edge::Static(to)) => format!("-> {}", to),
                Some(Edge::Conditional(router)) => format!(
                    "=> {} (fallback: {})",
                    router.targets().join(" | "),
                    router.fallback()
                ),
            };
            out.push_str(&format!("  {} [{}] {}\n", name, kind, edge));
        }
        out
    }
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine")
            .field("nodes", &self.order)
            .field("edges", &self.edges)
            .field("start", &self.start)
            .field("terminal", &self.terminal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeOutput;
    use crate::graph::router::MarkerRouter;
    use crate::state::PartialUpdate;
    use cadence_core::document::DocumentPatch;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Appends a fixed agent turn.
    struct Say {
        name: &'static str,
        kind: NodeKind,
        text: &'static str,
    }

    impl Node for Say {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> NodeKind {
            self.kind
        }

        fn execute<'a>(&'a self, _state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
            Box::pin(async move { PartialUpdate::turn(Turn::agent(self.name, self.text)).into() })
        }
    }

    fn say(name: &'static str, kind: NodeKind, text: &'static str) -> Say {
        Say { name, kind, text }
    }

    /// Executor that says "ROUTING: FINISH" on its `nth` call, and
    /// something unparsable before that.
    struct Decides {
        calls: AtomicUsize,
        nth: usize,
    }

    impl Node for Decides {
        fn name(&self) -> &str {
            "executor"
        }

        fn kind(&self) -> NodeKind {
            NodeKind::Executor
        }

        fn execute<'a>(&'a self, _state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let text = if n >= self.nth { "ROUTING: FINISH" } else { "hmm" };
            Box::pin(async move { PartialUpdate::turn(Turn::agent("executor", text)).into() })
        }
    }

    fn router() -> MarkerRouter {
        MarkerRouter::new("reasoner")
            .with_route("ACT", "act", &["act:"])
            .with_route("FINISH", "finish", &[])
    }

    fn engine_with_executor(executor: impl Node) -> GraphEngine {
        GraphEngine::builder()
            .add_node(say("reasoner", NodeKind::Reasoner, "thinking"))
            .add_node(executor)
            .add_node(say("act", NodeKind::Effector, "acted"))
            .add_node(say("finish", NodeKind::Effector, "done"))
            .add_edge("reasoner", "executor")
            .add_conditional_edge("executor", router())
            .add_edge("act", "reasoner")
            .start("reasoner")
            .terminal("finish")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_terminates_at_terminal_node() {
        let engine = engine_with_executor(Decides {
            calls: AtomicUsize::new(0),
            nth: 2,
        });
        let outcome = engine.run("go", 10).await;
        let RunOutcome::Terminated(done) = outcome else {
            panic!("expected termination");
        };
        // reasoner, executor, reasoner, executor, finish
        assert_eq!(done.step_count, 5);
        assert_eq!(done.conclusion(), "done");
        assert_eq!(done.transcript[0].content, "go");
    }

    #[tokio::test]
    async fn test_never_terminating_router_aborts_at_max_steps() {
        for max_steps in [0, 1, 7, 40] {
            let engine = engine_with_executor(say("executor", NodeKind::Executor, "no idea"));
            let outcome = engine.run("go", max_steps).await;
            let RunOutcome::Aborted(report) = outcome else {
                panic!("expected abort");
            };
            assert_eq!(report.reason, AbortReason::LoopBoundExceeded { max_steps });
            assert_eq!(report.step_count, max_steps);
            assert_eq!(report.transcript.len(), max_steps + 1);
            assert_eq!(report.visited_since_last_tool, max_steps);
        }
    }

    #[tokio::test]
    async fn test_terminal_on_last_allowed_step_terminates() {
        let engine = engine_with_executor(Decides {
            calls: AtomicUsize::new(0),
            nth: 1,
        });
        assert!(engine.run("go", 3).await.is_terminated());
        let engine = engine_with_executor(Decides {
            calls: AtomicUsize::new(0),
            nth: 1,
        });
        assert!(!engine.run("go", 2).await.is_terminated());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let engine = engine_with_executor(say("executor", NodeKind::Executor, "no idea"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = engine
            .run_with_state(SharedState::new("go"), 10, cancel)
            .await;
        let RunOutcome::Aborted(report) = outcome else {
            panic!("expected abort");
        };
        assert_eq!(report.reason, AbortReason::Cancelled);
        assert_eq!(report.step_count, 0);
        assert_eq!(report.transcript.len(), 1);
    }

    /// Effector whose patch tries to drop every open question.
    struct Vandal;

    impl Node for Vandal {
        fn name(&self) -> &str {
            "act"
        }

        fn kind(&self) -> NodeKind {
            NodeKind::Effector
        }

        fn execute<'a>(&'a self, _state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
            Box::pin(async {
                PartialUpdate::turn(Turn::tool_result("act", "wiping"))
                    .with_patch(DocumentPatch::rewrite(|d| {
                        let mut d = d.clone();
                        d.open_questions.clear();
                        d
                    }))
                    .into()
            })
        }
    }

    #[tokio::test]
    async fn test_rejected_patch_becomes_turn() {
        let engine = GraphEngine::builder()
            .add_node(say("reasoner", NodeKind::Reasoner, "thinking"))
            .add_node(say("executor", NodeKind::Executor, "ROUTING: ACT"))
            .add_node(Vandal)
            .add_node(say("finish", NodeKind::Effector, "done"))
            .add_edge("reasoner", "executor")
            .add_conditional_edge("executor", router())
            .add_edge("act", "reasoner")
            .start("reasoner")
            .terminal("finish")
            .build()
            .unwrap();

        let mut state = SharedState::new("go");
        state.document.open_questions.push("keep me".into());
        let outcome = engine
            .run_with_state(state, 3, CancellationToken::new())
            .await;

        assert_eq!(outcome.document().open_questions, vec!["keep me"]);
        let contents: Vec<_> = outcome.transcript().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents[3], "wiping");
        assert_eq!(
            contents[4],
            "Document update from act rejected: open_questions shrank from 1 to 0 entries"
        );
    }

    /// Reasoner that proposes a successor of its own.
    struct Hints(&'static str);

    impl Node for Hints {
        fn name(&self) -> &str {
            "reasoner"
        }

        fn kind(&self) -> NodeKind {
            NodeKind::Reasoner
        }

        fn execute<'a>(&'a self, _state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
            let hint = self.0;
            Box::pin(async move {
                NodeOutput::new(PartialUpdate::turn(Turn::agent("reasoner", "skip ahead")))
                    .with_hint(hint)
            })
        }
    }

    fn engine_with_hint(hint: &'static str) -> GraphEngine {
        GraphEngine::builder()
            .add_node(Hints(hint))
            .add_node(say("executor", NodeKind::Executor, "nothing"))
            .add_node(say("act", NodeKind::Effector, "acted"))
            .add_node(say("finish", NodeKind::Effector, "done"))
            .add_edge("reasoner", "executor")
            .add_conditional_edge("executor", router())
            .add_edge("act", "reasoner")
            .start("reasoner")
            .terminal("finish")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_hint_is_followed() {
        let outcome = engine_with_hint("act").run("go", 2).await;
        assert_eq!(outcome.transcript()[2].content, "acted");
    }

    #[tokio::test]
    async fn test_hint_to_terminal_or_unknown_is_ignored() {
        for hint in ["finish", "nowhere"] {
            let outcome = engine_with_hint(hint).run("go", 2).await;
            assert!(!outcome.is_terminated());
            assert_eq!(outcome.transcript()[2].content, "nothing");
        }
    }

    fn base() -> GraphBuilder {
        GraphEngine::builder()
            .add_node(say("reasoner", NodeKind::Reasoner, ""))
            .add_node(say("executor", NodeKind::Executor, ""))
            .add_node(say("act", NodeKind::Effector, ""))
            .add_node(say("finish", NodeKind::Effector, ""))
            .start("reasoner")
            .terminal("finish")
    }

    fn assert_invalid(builder: GraphBuilder, needle: &str) {
        match builder.build() {
            Err(CadenceError::Config(msg)) => {
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle)
            }
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_validation() {
        assert!(base()
            .add_edge("reasoner", "executor")
            .add_conditional_edge("executor", router())
            .add_edge("act", "reasoner")
            .build()
            .is_ok());

        assert_invalid(
            base()
                .add_edge("reasoner", "executor")
                .add_conditional_edge("executor", router())
                .add_edge("act", "finish"),
            "bypasses routing",
        );
        assert_invalid(
            base()
                .add_edge("reasoner", "executor")
                .add_conditional_edge("executor", MarkerRouter::new("finish").with_route("ACT", "act", &[]))
                .add_edge("act", "reasoner"),
            "falls back to the terminal",
        );
        assert_invalid(
            base()
                .add_edge("reasoner", "executor")
                .add_conditional_edge("executor", router()),
            "'act' has no outgoing edge",
        );
        assert_invalid(
            base()
                .add_edge("reasoner", "ghost")
                .add_conditional_edge("executor", router())
                .add_edge("act", "reasoner"),
            "unknown node 'ghost'",
        );
        assert_invalid(
            base()
                .add_edge("reasoner", "executor")
                .add_edge("executor", "act")
                .add_edge("act", "reasoner"),
            "no router leads to terminal",
        );
        assert_invalid(
            base()
                .add_edge("reasoner", "executor")
                .add_conditional_edge("executor", router())
                .add_edge("act", "reasoner")
                .add_edge("finish", "reasoner"),
            "cannot have an outgoing edge",
        );
        assert_invalid(
            base().add_node(say("act", NodeKind::Effector, "")),
            "duplicate node 'act'",
        );
        assert_invalid(base().start("finish"), "both start and terminal");
        assert_invalid(base().start("missing"), "start node 'missing'");
    }

    #[test]
    fn test_describe_lists_edges() {
        let engine = engine_with_executor(say("executor", NodeKind::Executor, ""));
        let text = engine.describe();
        assert!(text.contains("start: reasoner"));
        assert!(text.contains("reasoner [reasoner] -> executor"));
        assert!(text.contains("executor [executor] => act | finish (fallback: reasoner)"));
        assert!(text.contains("finish [effector] (end)"));
    }

    #[tokio::test]
    async fn test_concurrent_runs_share_engine() {
        let engine = Arc::new(engine_with_executor(say("executor", NodeKind::Executor, "no idea")));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.run(format!("run {}", i), 5).await })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let outcome = handle.await.unwrap();
            assert_eq!(outcome.step_count(), 5);
            assert_eq!(outcome.transcript()[0].content, format!("run {}", i));
        }
    }
}
