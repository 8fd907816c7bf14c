use serde::{Deserialize, Serialize};

use cadence_core::document::{Document, DocumentPatch, PatchError};
use cadence_core::types::Turn;

/// The record threaded through every node invocation.
///
/// Only the engine mutates it, by merging the [`PartialUpdate`] a node
/// returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    pub transcript: Vec<Turn>,
    pub document: Document,
}

impl SharedState {
    /// Fresh state holding the initial human input.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            transcript: vec![Turn::human(input)],
            document: Document::new(),
        }
    }

    /// Seed a run with an existing document.
    pub fn with_document(input: impl Into<String>, document: Document) -> Self {
        Self {
            transcript: vec![Turn::human(input)],
            document,
        }
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }

    /// Content of the most recent turn, or `""` for an empty transcript.
    pub fn last_content(&self) -> &str {
        self.last_turn().map(|t| t.content.as_str()).unwrap_or("")
    }

    /// Merge a node's update.
    ///
    /// Turns always commit, in order. The document patch is all-or-nothing:
    /// on `Err` the document is exactly what it was before the call.
    pub fn apply(&mut self, update: PartialUpdate) -> Result<(), PatchError> {
        self.transcript.extend(update.turns);
        if let Some(patch) = update.patch {
            self.document = patch.apply_to(&self.document)?;
        }
        Ok(())
    }
}

/// The delta a node hands back to the engine.
#[derive(Debug, Clone, Default)]
pub struct PartialUpdate {
    pub turns: Vec<Turn>,
    pub patch: Option<DocumentPatch>,
}

impl PartialUpdate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn turn(turn: Turn) -> Self {
        Self {
            turns: vec![turn],
            patch: None,
        }
    }

    pub fn with_patch(mut self, patch: DocumentPatch) -> Self {
        self.patch = Some(patch);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.patch.is_none()
    }
}
