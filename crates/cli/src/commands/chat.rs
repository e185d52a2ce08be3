//! Chat command handler.
//!
//! Conversation bookkeeping: create, list, rename and delete.

use crate::session::open_store;
use clap::{Args, Subcommand};
use researchx_core::{config::AppConfig, AppError, AppResult};
use researchx_engine::{conversation_name, ConversationStore, ConversationSummary};

/// Manage conversations
#[derive(Args, Debug)]
pub struct ChatCommand {
    #[command(subcommand)]
    pub action: ChatAction,
}

#[derive(Subcommand, Debug)]
pub enum ChatAction {
    /// Start a new conversation
    New {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List conversations, most recently used first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a conversation
    Rename {
        /// Conversation id
        id: String,
        /// New name
        name: String,
    },
    /// Delete a conversation and its whole history
    Delete {
        /// Conversation id
        id: String,
    },
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = open_store(config)?;

        match &self.action {
            ChatAction::New { json } => {
                let summary = store.create()?;
                tracing::info!(conversation = %summary.id, "Created conversation");
                if *json {
                    println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
                } else {
                    println!("{}", summary.id);
                }
            }
            ChatAction::List { json } => {
                let conversations = store.list()?;
                if *json {
                    let output: Vec<_> = conversations.iter().map(summary_json).collect();
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else if conversations.is_empty() {
                    println!("No conversations yet. Start one with 'researchx ask'.");
                } else {
                    for summary in &conversations {
                        println!(
                            "{}  {}  (last used {})",
                            summary.id,
                            summary.name,
                            summary.last_used.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            ChatAction::Rename { id, name } => {
                let name = conversation_name(name)
                    .ok_or_else(|| AppError::Conversation("Name cannot be empty".to_string()))?;
                existing(&store, id)?;
                store.rename(id, name)?;
                println!("Renamed {} to '{}'", id, name);
            }
            ChatAction::Delete { id } => {
                if !ConversationStore::delete(&store, id)? {
                    return Err(AppError::Conversation(format!("Unknown conversation: {}", id)));
                }
                tracing::info!(conversation = %id, "Deleted conversation");
                println!("Deleted {}", id);
            }
        }

        Ok(())
    }
}

fn existing(store: &dyn ConversationStore, id: &str) -> AppResult<ConversationSummary> {
    store
        .get(id)?
        .ok_or_else(|| AppError::Conversation(format!("Unknown conversation: {}", id)))
}

fn summary_json(summary: &ConversationSummary) -> serde_json::Value {
    serde_json::json!({
        "id": summary.id,
        "name": summary.name,
        "createdAt": summary.created_at.to_rfc3339(),
        "lastUsed": summary.last_used.to_rfc3339(),
    })
}
