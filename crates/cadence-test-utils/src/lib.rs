//! Shared mocks for Cadence tests: a scripted LLM and canned search backends.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use cadence_core::config::ModelConfig;
use cadence_core::document::{ClosedQuestion, Document, Finding};
use cadence_core::error::{CadenceError, Result};
use cadence_core::traits::{LlmClient, SearchClient};
use cadence_core::types::{ChatMessage, StopReason, StreamDelta};

type Script = VecDeque<std::result::Result<String, fn() -> CadenceError>>;

/// An LLM that replays queued responses in order and records every
/// conversation it was sent.
///
/// Once the queue is empty it answers with the idle response, or fails
/// with `LlmRequest` when none is set.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    script: Arc<Mutex<Script>>,
    idle: Option<String>,
    seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = responses.into_iter().map(|r| Ok(r.into())).collect();
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Default::default()
        }
    }

    /// Response used after the script runs out.
    pub fn with_idle_response(mut self, text: impl Into<String>) -> Self {
        self.idle = Some(text.into());
        self
    }

    /// Queue a response at the back of the script.
    pub fn push(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failure at the back of the script.
    pub fn push_error(&self, error: fn() -> CadenceError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Every message list this LLM was called with, oldest first.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Concatenated text of the `n`th call's messages.
    pub fn prompt_text(&self, n: usize) -> String {
        self.seen.lock().unwrap()[n]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn next_response(&self) -> Result<String> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(make_error)) => Err(make_error()),
            None => self
                .idle
                .clone()
                .ok_or_else(|| CadenceError::LlmRequest("script exhausted".into())),
        }
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.seen.lock().unwrap().push(messages);
        let response = self.next_response();
        Box::pin(async move {
            let text = response?;
            let deltas = vec![
                Ok(StreamDelta::TextDelta(text)),
                Ok(StreamDelta::Stop(StopReason::EndTurn)),
            ];
            Ok(Box::pin(futures::stream::iter(deltas)) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// Search backend that answers every query with the same summary.
#[derive(Clone)]
pub struct StubSearch {
    summary: String,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StubSearch {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchClient for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        let summary = self.summary.clone();
        Box::pin(async move { Ok(summary) })
    }
}

/// Search backend that always fails.
#[derive(Clone, Copy)]
pub enum FailingSearch {
    /// Never answers; pair with a timed search port.
    Hang,
    /// Rejects the credential.
    Auth,
    /// Upstream 500.
    Upstream,
}

impl SearchClient for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    fn search(&self, _query: &str) -> BoxFuture<'_, Result<String>> {
        match self {
            Self::Hang => Box::pin(futures::future::pending()),
            Self::Auth => Box::pin(async {
                Err(CadenceError::Auth {
                    port: "search".into(),
                    message: "HTTP 401 Unauthorized: invalid api key".into(),
                })
            }),
            Self::Upstream => Box::pin(async {
                Err(CadenceError::upstream("search", "HTTP 500 Internal Server Error: boom"))
            }),
        }
    }
}

/// Model config used by test ports.
pub fn test_model() -> ModelConfig {
    ModelConfig::new("openai", "test-model")
}

/// A document with one open question, one finding, and one closed question.
pub fn sample_document() -> Document {
    let mut doc = Document::new();
    doc.open_questions.push("What is the population of NYC?".into());
    doc.open_questions.push("What is the area of NYC?".into());
    doc.findings.push(
        Finding::new("NYC population is about 8.3 million", "search")
            .with_question("What is the population of NYC?"),
    );
    doc.closed_questions.push(ClosedQuestion::new(
        "What is the population of NYC?",
        "About 8.3 million",
    ));
    doc
}
