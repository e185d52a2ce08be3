//! Error types for ResearchX.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM, retrieval, prompt,
//! persistence, and conversation errors.

use thiserror::Error;

/// Unified error type for ResearchX.
///
/// Library functions return `Result<T, AppError>` unless they need a more
/// specific taxonomy (the engine has its own `EngineError` which converts
/// into this one at the crate boundary).
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Retrieval backend errors (web, academic index, local knowledge base)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Checkpoint and conversation storage errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Conversation lifecycle errors (unknown id, turn already running)
    #[error("Conversation error: {0}")]
    Conversation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
