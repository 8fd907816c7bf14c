//! Document effectors of the memory subgraph.
//!
//! Payloads are `text | key: value | key: value`, e.g.
//! `FINDING: NYC has 8.3M people | source: search | confidence: high`.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::{info, warn};

use cadence_core::document::{ClosedQuestion, Confidence, DocumentOp, DocumentPatch, Finding, QuestionStatus};
use cadence_core::types::Turn;

use super::{decision_payload, report};
use crate::graph::{Node, NodeKind, NodeOutput};
use crate::state::{PartialUpdate, SharedState};
use crate::workflow::{ADD_FINDING, ADD_OPEN_QUESTION, CLOSE_QUESTION};

const DEFAULT_SOURCE: &str = "research";

/// Split a payload into its leading text and its `key: value` fields.
/// Keys are lowercased; later duplicates win.
fn parse_fields(payload: &str) -> (String, HashMap<String, String>) {
    let mut parts = payload.split('|');
    let text = parts.next().unwrap_or("").trim().to_string();
    let fields = parts
        .filter_map(|part| {
            let (key, value) = part.split_once(':')?;
            let value = value.trim();
            (!value.is_empty()).then(|| (key.trim().to_lowercase(), value.to_string()))
        })
        .collect();
    (text, fields)
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn confidence_of(fields: &HashMap<String, String>) -> Confidence {
    fields
        .get("confidence")
        .and_then(|c| Confidence::parse(c))
        .unwrap_or_default()
}

fn commit(origin: &str, message: String, op: DocumentOp) -> NodeOutput {
    info!(node = origin, "{}", message);
    PartialUpdate::turn(Turn::tool_result(origin, message))
        .with_patch(DocumentPatch::op(op))
        .into()
}

/// Appends a question to `open_questions`.
pub struct AddOpenQuestion;

impl Node for AddOpenQuestion {
    fn name(&self) -> &str {
        ADD_OPEN_QUESTION
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let question = decision_payload(state.last_content(), &["QUESTION:", "DETAILS:"])
                .map(|p| parse_fields(&p).0)
                .filter(|q| !q.is_empty());
            let Some(question) = question else {
                return report(ADD_OPEN_QUESTION, "Could not extract question from executor decision");
            };
            commit(
                ADD_OPEN_QUESTION,
                format!("Added open question: '{}'", question),
                DocumentOp::AddOpenQuestion(question),
            )
        })
    }
}

/// Appends a finding with source, confidence, and related questions.
pub struct AddFinding;

impl Node for AddFinding {
    fn name(&self) -> &str {
        ADD_FINDING
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let Some(payload) = decision_payload(state.last_content(), &["FINDING:", "DETAILS:"]) else {
                return report(ADD_FINDING, "Could not extract finding from executor decision");
            };
            let (content, fields) = parse_fields(&payload);
            if content.is_empty() {
                return report(ADD_FINDING, "Could not extract finding from executor decision");
            }

            let source = fields.get("source").map(String::as_str).unwrap_or(DEFAULT_SOURCE);
            let mut finding = Finding::new(content.clone(), source).with_confidence(confidence_of(&fields));
            for key in ["question", "questions"] {
                if let Some(value) = fields.get(key) {
                    for q in split_list(value) {
                        finding = finding.with_question(q);
                    }
                }
            }
            commit(
                ADD_FINDING,
                format!("Recorded finding: '{}'", content),
                DocumentOp::AddFinding(finding),
            )
        })
    }
}

/// Records an answer for a question. A question is closed at most once.
pub struct CloseQuestion;

impl Node for CloseQuestion {
    fn name(&self) -> &str {
        CLOSE_QUESTION
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Effector
    }

    fn execute<'a>(&'a self, state: &'a SharedState) -> BoxFuture<'a, NodeOutput> {
        Box::pin(async move {
            let Some(payload) = decision_payload(state.last_content(), &["QUESTION:", "DETAILS:"]) else {
                return report(CLOSE_QUESTION, "Could not extract question from executor decision");
            };
            let (question, fields) = parse_fields(&payload);
            if question.is_empty() {
                return report(CLOSE_QUESTION, "Could not extract question from executor decision");
            }
            if state.document.is_closed(&question) {
                warn!(question = %question, "Question already closed");
                return report(
                    CLOSE_QUESTION,
                    format!("Error closing question '{}': question is already closed", question),
                );
            }

            let mut closed = ClosedQuestion::new(
                question.clone(),
                fields.get("answer").cloned().unwrap_or_default(),
            );
            closed.confidence = confidence_of(&fields);
            if let Some(status) = fields.get("status").and_then(|s| QuestionStatus::parse(s)) {
                closed.status = status;
            }
            if let Some(evidence) = fields.get("evidence") {
                closed.evidence = split_list(evidence).collect();
            }
            commit(
                CLOSE_QUESTION,
                format!("Closed question: '{}'", question),
                DocumentOp::CloseQuestion(closed),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(decision: &str) -> SharedState {
        let mut state = SharedState::new("Compare NYC and SF populations");
        state.transcript.push(Turn::agent("memory_executor", decision));
        state
    }

    async fn run_and_apply(node: &dyn Node, state: &mut SharedState) -> String {
        let out = node.execute(state).await;
        let content = out.update.turns[0].content.clone();
        state.apply(out.update).unwrap();
        content
    }

    #[test]
    fn test_parse_fields() {
        let (text, fields) = parse_fields("NYC has 8.3M people | Source: search | confidence: high | bogus");
        assert_eq!(text, "NYC has 8.3M people");
        assert_eq!(fields.get("source").map(String::as_str), Some("search"));
        assert_eq!(fields.get("confidence").map(String::as_str), Some("high"));
        assert_eq!(fields.len(), 2);
    }

    #[tokio::test]
    async fn test_add_open_question() {
        let mut s = state("ROUTING: ADD_OPEN_QUESTION - QUESTION: What is the population of NYC?");
        let msg = run_and_apply(&AddOpenQuestion, &mut s).await;
        assert_eq!(msg, "Added open question: 'What is the population of NYC?'");
        assert_eq!(s.document.open_questions, vec!["What is the population of NYC?"]);
    }

    #[tokio::test]
    async fn test_add_open_question_from_details_line() {
        let mut s = state("OPERATION: ADD_OPEN_QUESTION\nDETAILS: What is the area of SF?");
        run_and_apply(&AddOpenQuestion, &mut s).await;
        assert_eq!(s.document.open_questions, vec!["What is the area of SF?"]);
    }

    #[tokio::test]
    async fn test_add_finding_with_fields() {
        let mut s = state(
            "ROUTING: ADD_FINDING - FINDING: NYC population is 8.3 million | source: search | confidence: high | question: What is the population of NYC?",
        );
        let msg = run_and_apply(&AddFinding, &mut s).await;
        assert_eq!(msg, "Recorded finding: 'NYC population is 8.3 million'");

        let finding = &s.document.findings[0];
        assert_eq!(finding.source, "search");
        assert_eq!(finding.confidence, Confidence::High);
        assert!(finding.related_questions.contains("What is the population of NYC?"));
    }

    #[tokio::test]
    async fn test_close_question_once() {
        let decision = "ROUTING: CLOSE_QUESTION - QUESTION: What is the population of NYC? | answer: 8.3 million | evidence: census; city records | confidence: high | status: partial";
        let mut s = state(decision);
        s.document.open_questions.push("What is the population of NYC?".into());

        let msg = run_and_apply(&CloseQuestion, &mut s).await;
        assert_eq!(msg, "Closed question: 'What is the population of NYC?'");
        let closed = &s.document.closed_questions[0];
        assert_eq!(closed.answer, "8.3 million");
        assert_eq!(closed.evidence, vec!["census", "city records"]);
        assert_eq!(closed.status, QuestionStatus::Partial);

        s.transcript.push(Turn::agent("memory_executor", decision));
        let out = CloseQuestion.execute(&s).await;
        assert!(out.update.patch.is_none());
        assert_eq!(
            out.update.turns[0].content,
            "Error closing question 'What is the population of NYC?': question is already closed"
        );
    }

    #[tokio::test]
    async fn test_missing_payloads() {
        let s = state("ROUTING: ADD_FINDING");
        let out = AddFinding.execute(&s).await;
        assert_eq!(
            out.update.turns[0].content,
            "Could not extract finding from executor decision"
        );
        assert!(out.update.patch.is_none());
    }
}
