//! Retrieval sources and their per-turn progress.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three retrieval backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    GeneralWeb,
    AcademicIndex,
    LocalKnowledgeBase,
}

impl SourceId {
    /// Every source, in the default consultation order.
    pub const ALL: [SourceId; 3] = [
        SourceId::GeneralWeb,
        SourceId::AcademicIndex,
        SourceId::LocalKnowledgeBase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeneralWeb => "general-web",
            Self::AcademicIndex => "academic-index",
            Self::LocalKnowledgeBase => "local-knowledge-base",
        }
    }

    /// Parse a source identifier. Accepts the short aliases used in the CLI.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "general-web" | "web" => Some(Self::GeneralWeb),
            "academic-index" | "academic" | "arxiv" => Some(Self::AcademicIndex),
            "local-knowledge-base" | "knowledge" | "local" => Some(Self::LocalKnowledgeBase),
            _ => None,
        }
    }

    /// Human readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GeneralWeb => "the Web",
            Self::AcademicIndex => "arXiv",
            Self::LocalKnowledgeBase => "the local knowledge base",
        }
    }

    /// Phrasing conventions handed to the query refiner.
    pub fn conventions(&self) -> &'static str {
        match self {
            Self::GeneralWeb => {
                "general web search engine; natural language or keyword phrasing, \
                 include product names, versions and dates when they matter"
            }
            Self::AcademicIndex => {
                "academic paper index; formal scientific terminology, method and \
                 field names as they appear in paper titles and abstracts"
            }
            Self::LocalKnowledgeBase => {
                "private document collection searched by similarity; reuse the exact \
                 domain terms and jargon the documents are likely to contain"
            }
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a source within one turn: `untried -> searched -> exhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    #[default]
    Untried,
    Searched,
    Exhausted,
}

/// Progress of one source within one turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceStatus {
    pub attempts_used: u32,
    pub relevant_found: u32,
    pub state: SourceState,

    /// Queries sent to this source, in order.
    #[serde(default)]
    pub queries: Vec<String>,

    /// Searches that failed and were counted as empty.
    #[serde(default)]
    pub errors: u32,
}

/// Fixed mapping from every `SourceId` to its status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceProgress {
    #[serde(rename = "general-web")]
    general_web: SourceStatus,
    #[serde(rename = "academic-index")]
    academic_index: SourceStatus,
    #[serde(rename = "local-knowledge-base")]
    local_knowledge_base: SourceStatus,
}

impl SourceProgress {
    pub fn get(&self, source: SourceId) -> &SourceStatus {
        match source {
            SourceId::GeneralWeb => &self.general_web,
            SourceId::AcademicIndex => &self.academic_index,
            SourceId::LocalKnowledgeBase => &self.local_knowledge_base,
        }
    }

    pub fn get_mut(&mut self, source: SourceId) -> &mut SourceStatus {
        match source {
            SourceId::GeneralWeb => &mut self.general_web,
            SourceId::AcademicIndex => &mut self.academic_index,
            SourceId::LocalKnowledgeBase => &mut self.local_knowledge_base,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &SourceStatus)> {
        SourceId::ALL.into_iter().map(move |id| (id, self.get(id)))
    }
}
