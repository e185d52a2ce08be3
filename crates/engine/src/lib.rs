//! Research orchestration engine.
//!
//! Answers a question by consulting several retrieval sources in turn,
//! grading what they return, rewriting the query for a source when it comes
//! back empty, and synthesizing an answer from the evidence gathered.
//!
//! A turn is an explicit state machine:
//! - [`router::Router`] decides the next [`router::Action`] from per-source progress
//! - [`executor::GraphExecutor`] runs one node per step and persists a checkpoint
//! - [`engine::ResearchEngine`] owns conversations and starts, resumes or forks turns
//!
//! Every step is appended to a [`store::CheckpointStore`], so a turn survives
//! a process restart and any earlier snapshot can be replayed.

pub mod accumulator;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod generator;
pub mod judge;
pub mod refiner;
pub mod retrieval;
pub mod router;
pub mod source;
pub mod state;
pub mod store;
pub mod synthesizer;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{EngineConfig, GradingTarget};
pub use engine::ResearchEngine;
pub use error::{EngineError, EngineResult};
pub use executor::{ExecutorEvent, ExecutorNode, GraphExecutor, TurnStream};
pub use generator::{suggest_title, Generator, LlmGenerator};
pub use retrieval::{
    AcademicSearch, KnowledgeBaseSearch, LearnStats, Retriever, RetrieverSet, WebSearch,
};
pub use router::{Action, Decision, Router};
pub use source::{SourceId, SourceState, SourceStatus};
pub use state::{Exchange, TurnState};
pub use store::{
    conversation_name, Checkpoint, CheckpointStore, ConversationStore, ConversationSummary,
    MemoryStore, SqliteStore,
};
