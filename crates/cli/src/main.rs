//! ResearchX CLI
//!
//! Main entry point for the researchx command-line tool.
//! Answers questions by consulting the web, arXiv and a local knowledge base,
//! keeping every conversation resumable on disk.

mod commands;
mod progress;
mod session;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, HistoryCommand, KnowledgeCommand, ResumeCommand};
use researchx_core::{config::AppConfig, logging, logging::LogFormat, AppResult};
use std::path::PathBuf;

/// ResearchX - multi-source research assistant with resumable conversations
#[derive(Parser, Debug)]
#[command(name = "researchx")]
#[command(about = "Multi-source research assistant with resumable conversations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RESEARCHX_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RESEARCHX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "RESEARCHX_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "RESEARCHX_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage conversations
    Chat(ChatCommand),

    /// Research a question
    Ask(AskCommand),

    /// Continue an interrupted turn, or replay from an earlier checkpoint
    Resume(ResumeCommand),

    /// Show a conversation's exchanges or checkpoints
    History(HistoryCommand),

    /// Local knowledge base management
    Knowledge(KnowledgeCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    let mut config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.json_logs {
        config.json_logs = true;
    }

    let format = if config.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    // Quiet by default so progress labels stay readable
    let level = config.log_level.clone().unwrap_or_else(|| "warn".to_string());
    logging::init_logging(Some(level.as_str()), config.no_color, format)?;

    tracing::info!("ResearchX CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Chat(_) => "chat",
        Commands::Ask(_) => "ask",
        Commands::Resume(_) => "resume",
        Commands::History(_) => "history",
        Commands::Knowledge(_) => "knowledge",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Resume(cmd) => cmd.execute(&config).await,
        Commands::History(cmd) => cmd.execute(&config).await,
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
