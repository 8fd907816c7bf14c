use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use cadence_core::traits::Calculator;

use super::{decision_payload, report};
use crate::graph::marker::longest_math_run;
use crate::graph::{Node, NodeKind, NodeOutput};
use crate::state::SharedState;
use crate::workflow::DATA_ANALYSIS;

/// Evaluates the expression named by the executor's `CALCULATION:` line.
pub struct DataAnalysis {
    calculator: Arc<dyn Calculator>,
}

impl DataAnalysis {
    pub fn new(calculator: Arc<dyn Calculator>) -> Self {
        Self { calculator }
    }
}

fn expression_of(text: &str) -> Option<String> {
    decision_payload(text, &["CALCULATION:"]).or_else(|| {
        text.to_lowercase()
            .contains("calculate")
            .then(|| longest_math_run(text))
            .flatten()
    })
}

impl Node for DataAnalysis {
    fn name(&self) -> &str {
        DATA_ANALYSIS
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let Some(expr) = expression_of(state.last_content()) else {
                return report(DATA_ANALYSIS, "Could not extract calculation from executor decision");
            };
            match self.calculator.evaluate(&expr) {
                Ok(value) => {
                    debug!(expr = %expr, value = %value, "Calculated");
                    report(DATA_ANALYSIS, format!("Calculation: {} = {}", expr, value))
                }
                Err(e) => {
                    warn!(expr = %expr, error = %e, "Calculation failed");
                    report(DATA_ANALYSIS, format!("Error calculating '{}': {}", expr, e))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::types::Turn;
    use cadence_tools::ExpressionEvaluator;

    async fn run(decision: &str) -> String {
        let node = DataAnalysis::new(Arc::new(ExpressionEvaluator::new()));
        let mut state = SharedState::new("question");
        state.transcript.push(Turn::agent("orchestrator_executor", decision));
        let out = node.execute(&state).await;
        assert!(out.update.patch.is_none());
        out.update.turns[0].content.clone()
    }

    #[tokio::test]
    async fn test_labelled_expression() {
        assert_eq!(
            run("ROUTING: DATA_ANALYSIS - CALCULATION: 2 + 2 * 3").await,
            "Calculation: 2 + 2 * 3 = 8"
        );
    }

    #[tokio::test]
    async fn test_calculate_in_prose() {
        assert_eq!(
            run("Let's calculate 10 / 4 now").await,
            "Calculation: 10 / 4 = 2.5"
        );
    }

    #[tokio::test]
    async fn test_failures_are_text() {
        assert_eq!(
            run("ROUTING: DATA_ANALYSIS - CALCULATION: 1 / 0").await,
            "Error calculating '1 / 0': Division by zero"
        );
        assert_eq!(
            run("ROUTING: DATA_ANALYSIS").await,
            "Could not extract calculation from executor decision"
        );
    }
}
