//! ResearchX Core Library
//!
//! This crate provides the foundational utilities shared by every ResearchX crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (workspace, LLM providers, research policy, sources)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
