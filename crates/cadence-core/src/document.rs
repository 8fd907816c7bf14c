//! The research document: findings, open questions, and closed questions
//! accumulated over a run.
//!
//! The document only grows. Nodes never edit it in place; they hand the
//! engine a [`DocumentPatch`], and the engine accepts the patched document
//! only if every list of the previous document survives as a prefix of the
//! new one and no question is closed twice.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Confidence attached to a finding or an answer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Lenient parse used on model-produced text. Unknown words yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// How a question was closed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    #[default]
    #[serde(rename = "closed_complete")]
    Complete,
    #[serde(rename = "closed_partial")]
    Partial,
    #[serde(rename = "closed_unanswerable")]
    Unanswerable,
}

impl QuestionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "complete" | "closed_complete" | "answered" => Some(Self::Complete),
            "partial" | "closed_partial" => Some(Self::Partial),
            "unanswerable" | "closed_unanswerable" => Some(Self::Unanswerable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub content: String,
    pub source: String,
    pub confidence: Confidence,
    #[serde(default)]
    pub related_questions: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            confidence: Confidence::default(),
            related_questions: BTreeSet::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.related_questions.insert(question.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedQuestion {
    pub question: String,
    pub status: QuestionStatus,
    pub answer: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub confidence: Confidence,
    pub closed_at: DateTime<Utc>,
}

impl ClosedQuestion {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            status: QuestionStatus::default(),
            answer: answer.into(),
            evidence: Vec::new(),
            confidence: Confidence::default(),
            closed_at: Utc::now(),
        }
    }
}

/// The auxiliary research record carried in shared state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub closed_questions: Vec<ClosedQuestion>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty() && self.open_questions.is_empty() && self.closed_questions.is_empty()
    }

    /// Whether a closed record exists for this question text.
    pub fn is_closed(&self, question: &str) -> bool {
        self.closed_questions.iter().any(|c| c.question == question)
    }

    /// Open questions that have no closed record yet, in insertion order.
    pub fn pending_questions(&self) -> Vec<&str> {
        self.open_questions
            .iter()
            .filter(|q| !self.is_closed(q))
            .map(|q| q.as_str())
            .collect()
    }

    /// Check that `self` is an append-only extension of `previous`.
    pub fn verify_extends(&self, previous: &Document) -> Result<(), PatchError> {
        check_prefix("findings", &previous.findings, &self.findings)?;
        check_prefix("open_questions", &previous.open_questions, &self.open_questions)?;
        check_prefix("closed_questions", &previous.closed_questions, &self.closed_questions)?;

        let mut seen = HashSet::new();
        for closed in &self.closed_questions {
            if !seen.insert(closed.question.as_str()) {
                return Err(PatchError::DuplicateClosure(closed.question.clone()));
            }
        }
        Ok(())
    }
}

fn check_prefix<T: PartialEq>(field: &'static str, old: &[T], new: &[T]) -> Result<(), PatchError> {
    if new.len() < old.len() {
        return Err(PatchError::Truncated {
            field,
            before: old.len(),
            after: new.len(),
        });
    }
    if let Some(index) = old.iter().zip(new).position(|(a, b)| a != b) {
        return Err(PatchError::Rewritten { field, index });
    }
    Ok(())
}

/// A rejected document patch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("{field} shrank from {before} to {after} entries")]
    Truncated {
        field: &'static str,
        before: usize,
        after: usize,
    },

    #[error("{field} entry {index} was modified")]
    Rewritten { field: &'static str, index: usize },

    #[error("question already closed: '{0}'")]
    DuplicateClosure(String),
}

/// One append operation on the document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    AddOpenQuestion(String),
    AddFinding(Finding),
    CloseQuestion(ClosedQuestion),
}

pub type RewriteFn = Arc<dyn Fn(&Document) -> Document + Send + Sync>;

/// A proposed change to the document, returned by a node.
#[derive(Clone)]
pub enum DocumentPatch {
    /// Append operations applied in order.
    Ops(Vec<DocumentOp>),
    /// Arbitrary rewrite. The result is still held to the append-only rule.
    Rewrite(RewriteFn),
}

impl DocumentPatch {
    pub fn op(op: DocumentOp) -> Self {
        Self::Ops(vec![op])
    }

    pub fn rewrite(f: impl Fn(&Document) -> Document + Send + Sync + 'static) -> Self {
        Self::Rewrite(Arc::new(f))
    }

    /// Compute the patched document without touching `doc`.
    ///
    /// All-or-nothing: on error the caller keeps the original document.
    pub fn apply_to(&self, doc: &Document) -> Result<Document, PatchError> {
        let candidate = match self {
            Self::Ops(ops) => {
                let mut next = doc.clone();
                for op in ops {
                    match op {
                        DocumentOp::AddOpenQuestion(q) => next.open_questions.push(q.clone()),
                        DocumentOp::AddFinding(f) => next.findings.push(f.clone()),
                        DocumentOp::CloseQuestion(c) => {
                            if next.is_closed(&c.question) {
                                return Err(PatchError::DuplicateClosure(c.question.clone()));
                            }
                            next.closed_questions.push(c.clone());
                        }
                    }
                }
                next
            }
            Self::Rewrite(f) => f(doc),
        };
        candidate.verify_extends(doc)?;
        Ok(candidate)
    }
}

impl std::fmt::Debug for DocumentPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ops(ops) => f.debug_tuple("Ops").field(ops).finish(),
            Self::Rewrite(_) => f.write_str("Rewrite(..)"),
        }
    }
}
