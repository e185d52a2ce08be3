//! Research policy configuration.

use crate::source::SourceId;
use researchx_core::config::ResearchConfig;
use researchx_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Answer returned when no source produced relevant evidence.
pub const DEFAULT_FALLBACK_ANSWER: &str =
    "After a thorough search, I could not find any relevant documents to answer your question.";

/// Default refinement budget per source.
pub const DEFAULT_MAX_REFINEMENTS: u32 = 2;

/// Which query the relevance judge compares passages against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradingTarget {
    #[default]
    OriginalQuestion,
    WorkingQuery,
}

impl GradingTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "original-question" | "original" => Some(Self::OriginalQuestion),
            "working-query" | "working" | "refined" => Some(Self::WorkingQuery),
            _ => None,
        }
    }
}

/// Engine policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_refinements: u32,
    pub source_order: Vec<SourceId>,
    pub grade_against: GradingTarget,
    pub fallback_answer: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_refinements: DEFAULT_MAX_REFINEMENTS,
            source_order: SourceId::ALL.to_vec(),
            grade_against: GradingTarget::default(),
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Build from the `research` section of the application config.
    pub fn from_research(research: &ResearchConfig) -> AppResult<Self> {
        let source_order = research
            .source_order
            .iter()
            .map(|name| {
                SourceId::parse(name)
                    .ok_or_else(|| AppError::Config(format!("Unknown source in sourceOrder: {}", name)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let grade_against = GradingTarget::parse(&research.grade_against).ok_or_else(|| {
            AppError::Config(format!(
                "Invalid gradeAgainst '{}': expected original-question or working-query",
                research.grade_against
            ))
        })?;

        let fallback_answer = if research.fallback_answer.trim().is_empty() {
            DEFAULT_FALLBACK_ANSWER.to_string()
        } else {
            research.fallback_answer.clone()
        };

        let config = Self {
            max_refinements: research.max_refinements,
            source_order,
            grade_against,
            fallback_answer,
        };
        config.validate()?;
        Ok(config)
    }

    /// The order must name each source exactly once.
    pub fn validate(&self) -> AppResult<()> {
        let is_permutation = self.source_order.len() == SourceId::ALL.len()
            && SourceId::ALL
                .iter()
                .all(|id| self.source_order.iter().filter(|o| *o == id).count() == 1);

        if !is_permutation {
            return Err(AppError::Config(format!(
                "sourceOrder must list each of general-web, academic-index and local-knowledge-base exactly once, got {:?}",
                self.source_order
            )));
        }
        Ok(())
    }

    pub fn first_source(&self) -> SourceId {
        self.source_order
            .first()
            .copied()
            .unwrap_or(SourceId::GeneralWeb)
    }
}
