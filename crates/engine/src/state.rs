//! Turn State: the persisted unit of progress for one question.

use crate::source::{SourceId, SourceProgress, SourceState};
use serde::{Deserialize, Serialize};

/// A completed question/answer pair from an earlier turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Progress of one user question within one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    /// Immutable for the turn.
    pub original_query: String,

    /// Starts equal to `original_query`; rewritten by the refiner.
    pub working_query: String,

    /// Relevant passages in arrival order. Append-only.
    pub evidence: Vec<String>,

    /// Ungraded results of the last search.
    pub pending_passages: Vec<String>,

    pub source_progress: SourceProgress,

    /// Source currently being worked on; `None` only once the turn is terminal.
    pub active_source: Option<SourceId>,

    pub final_answer: Option<String>,

    /// Earlier exchanges of the conversation, oldest first.
    #[serde(default)]
    pub history: Vec<Exchange>,
}

impl TurnState {
    /// Fresh state for a new question.
    pub fn new(question: impl Into<String>, history: Vec<Exchange>, first: SourceId) -> Self {
        let question = question.into();
        Self {
            working_query: question.clone(),
            original_query: question,
            evidence: Vec::new(),
            pending_passages: Vec::new(),
            source_progress: SourceProgress::default(),
            active_source: Some(first),
            final_answer: None,
            history,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.final_answer.is_some()
    }

    /// Sources marked exhausted so far.
    pub fn exhausted(&self) -> Vec<SourceId> {
        self.source_progress
            .iter()
            .filter(|(_, status)| status.state == SourceState::Exhausted)
            .map(|(id, _)| id)
            .collect()
    }

    /// Queries already tried against `source`.
    pub fn queries_for(&self, source: SourceId) -> &[String] {
        &self.source_progress.get(source).queries
    }
}
