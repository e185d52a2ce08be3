//! Knowledge command handler.
//!
//! Handles ingestion into the local knowledge base that backs the
//! `local-knowledge-base` source.

use clap::{Args, Subcommand};
use researchx_core::{config::AppConfig, AppError, AppResult};
use researchx_engine::KnowledgeBaseSearch;
use std::path::PathBuf;

/// Local knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Index files or directories
    Learn(KnowledgeLearnCommand),
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
}

/// Index files or directories
#[derive(Args, Debug)]
pub struct KnowledgeLearnCommand {
    /// Files or directories to learn from
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Reset base before learning
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeLearnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = config.sources.knowledge.base_name.clone();
        tracing::info!("Executing knowledge learn command for base '{}'", base);

        let path = config.knowledge_path();
        let knowledge = config.sources.knowledge.clone();
        let paths = self.paths.clone();
        let reset = self.reset;

        let stats = tokio::task::spawn_blocking(move || {
            KnowledgeBaseSearch::open(&path, &knowledge)?.learn(&paths, reset)
        })
        .await
        .map_err(|e| AppError::Other(format!("Learn task failed: {}", e)))??;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "documents": stats.documents,
                "chunks": stats.chunks,
                "skipped": stats.skipped,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Learned {} documents ({} chunks, {} bytes, {} skipped) in {:.2}s",
                stats.documents, stats.chunks, stats.bytes_processed, stats.skipped, stats.duration_secs
            );
        }

        Ok(())
    }
}

/// Show knowledge base stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let base = &config.sources.knowledge.base_name;
        tracing::info!("Executing knowledge stats command for base '{}'", base);

        let stats = KnowledgeBaseSearch::open(&config.knowledge_path(), &config.sources.knowledge)?
            .stats()?;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "path": stats.path.display().to_string(),
                "documents": stats.documents,
                "chunks": stats.chunks,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", base);
            println!("  Path: {}", stats.path.display());
            println!("  Documents: {}", stats.documents);
            println!("  Chunks: {}", stats.chunks);
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Learn(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}
