//! Failure taxonomy for a research turn.
//!
//! Retrieval failures are recovered locally by the executor (they count as an
//! empty search). Everything else is surfaced to the caller tagged with the
//! executor step and, where one applies, the source being worked on.

use crate::executor::ExecutorNode;
use crate::source::SourceId;
use researchx_core::AppError;
use thiserror::Error;

/// Errors raised while driving a research turn.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A retrieval backend could not be reached.
    #[error("Retrieval failure at {source_id}: {message}")]
    Retrieval { source_id: SourceId, message: String },

    /// The query rewrite capability failed.
    #[error("Generation failure during {step} for {source_id}: {message}")]
    Generation {
        step: ExecutorNode,
        source_id: SourceId,
        message: String,
    },

    /// The final answer could not be generated.
    #[error("Synthesis failure: {message}")]
    Synthesis { message: String },

    /// A checkpoint could not be written or read.
    #[error("Persistence failure during {step}: {message}")]
    Persistence { step: ExecutorNode, message: String },

    /// The conversation already has a turn running.
    #[error("A turn is already in progress for conversation {0}")]
    TurnInProgress(String),

    /// Unknown conversation, or nothing stored for it.
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// A request that does not fit the stored state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl EngineError {
    /// The executor step the failure is attributed to, if any.
    pub fn step(&self) -> Option<ExecutorNode> {
        match self {
            Self::Retrieval { .. } => Some(ExecutorNode::Searching),
            Self::Generation { step, .. } => Some(*step),
            Self::Synthesis { .. } => Some(ExecutorNode::Synthesizing),
            Self::Persistence { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The source the failure is attributed to, if any.
    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            Self::Retrieval { source_id, .. } | Self::Generation { source_id, .. } => {
                Some(*source_id)
            }
            _ => None,
        }
    }

    pub(crate) fn persistence(step: ExecutorNode, err: AppError) -> Self {
        Self::Persistence {
            step,
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::App(inner) => inner,
            EngineError::Retrieval { .. } => AppError::Retrieval(err.to_string()),
            EngineError::Generation { .. } | EngineError::Synthesis { .. } => {
                AppError::Llm(err.to_string())
            }
            EngineError::Persistence { .. } => AppError::Persistence(err.to_string()),
            EngineError::TurnInProgress(_)
            | EngineError::NotFound(_)
            | EngineError::InvalidState(_) => AppError::Conversation(err.to_string()),
        }
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_failure_carries_step_and_source() {
        let err = EngineError::Generation {
            step: ExecutorNode::Refining,
            source_id: SourceId::AcademicIndex,
            message: "model offline".to_string(),
        };
        assert_eq!(err.step(), Some(ExecutorNode::Refining));
        assert_eq!(err.source_id(), Some(SourceId::AcademicIndex));
        assert_eq!(
            err.to_string(),
            "Generation failure during refining for academic-index: model offline"
        );
    }

    #[test]
    fn test_conversion_into_app_error() {
        let err: AppError = EngineError::NotFound("abc".to_string()).into();
        assert!(matches!(err, AppError::Conversation(_)));

        let err: AppError =
            EngineError::persistence(ExecutorNode::Grading, AppError::Persistence("disk".into()))
                .into();
        assert!(matches!(err, AppError::Persistence(_)));
        assert!(err.to_string().contains("grading"));
    }
}
