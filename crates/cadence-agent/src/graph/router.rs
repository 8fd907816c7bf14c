use tracing::debug;

use super::marker::parse_decision;
use crate::state::SharedState;

/// Which matching rule produced a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRule {
    /// A `ROUTING: <ACTION>` marker named a known action.
    Marker,
    /// No marker, but a bare capability signal was present.
    Signal,
    /// Nothing recognisable; back to the subgraph's reasoner.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub target: String,
    pub rule: RouteRule,
    /// The action that matched, if any.
    pub action: Option<String>,
}

/// Conditional edge evaluator.
///
/// Implementations must be pure: the same state always yields the same
/// decision, and routing performs no I/O.
pub trait Router: Send + Sync + 'static {
    fn decide(&self, state: &SharedState) -> RouteDecision;

    /// Nodes reachable through rules 1 and 2.
    fn targets(&self) -> Vec<&str>;

    /// Node used when nothing matches.
    fn fallback(&self) -> &str;

    fn route(&self, state: &SharedState) -> String {
        self.decide(state).target
    }
}

#[derive(Debug, Clone)]
struct Route {
    action: String,
    target: String,
    signals: Vec<String>,
}

/// Routes on the most recent turn, first match wins:
///
/// 1. a `ROUTING: <ACTION>` marker, looked up in the action table; an
///    unknown action goes to the fallback;
/// 2. a legacy signal (case-insensitive substring) of some action, tried
///    in table order;
/// 3. the fallback, which is the reasoner of the owning subgraph.
#[derive(Debug, Clone)]
pub struct MarkerRouter {
    routes: Vec<Route>,
    fallback: String,
}

impl MarkerRouter {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Map `action` to `target`, also matching any of `signals` when the
    /// turn carries no marker.
    pub fn with_route(mut self, action: &str, target: impl Into<String>, signals: &[&str]) -> Self {
        self.routes.push(Route {
            action: action.to_uppercase(),
            target: target.into(),
            signals: signals.iter().map(|s| s.to_lowercase()).collect(),
        });
        self
    }

    fn fallback_decision(&self) -> RouteDecision {
        RouteDecision {
            target: self.fallback.clone(),
            rule: RouteRule::Fallback,
            action: None,
        }
    }

    /// Classify `text` with the three rules.
    pub fn classify(&self, text: &str) -> RouteDecision {
        if let Some(decision) = parse_decision(text) {
            return match self.routes.iter().find(|r| r.action == decision.action) {
                Some(route) => RouteDecision {
                    target: route.target.clone(),
                    rule: RouteRule::Marker,
                    action: Some(route.action.clone()),
                },
                None => {
                    debug!(action = %decision.action, "Unknown routing action");
                    self.fallback_decision()
                }
            };
        }

        let lowered = text.to_lowercase();
        self.routes
            .iter()
            .find(|r| r.signals.iter().any(|s| lowered.contains(s.as_str())))
            .map(|route| RouteDecision {
                target: route.target.clone(),
                rule: RouteRule::Signal,
                action: Some(route.action.clone()),
            })
            .unwrap_or_else(|| self.fallback_decision())
    }
}

impl Router for MarkerRouter {
    fn decide(&self, state: &SharedState) -> RouteDecision {
        self.classify(state.last_content())
    }

    fn targets(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.target.as_str()).collect()
    }

    fn fallback(&self) -> &str {
        &self.fallback
    }
}
