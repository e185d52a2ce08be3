//! Command handlers for the ResearchX CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod history;
pub mod knowledge;
pub mod resume;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use knowledge::KnowledgeCommand;
pub use resume::ResumeCommand;
