//! Prompt system for ResearchX.
//!
//! This crate provides structured prompt management with:
//! - Built-in YAML prompt definitions for refinement, grading, synthesis and titles
//! - Per-workspace overrides under `.researchx/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{list_prompts, load_prompt, PromptLibrary};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
