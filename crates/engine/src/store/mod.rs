//! Checkpoint and conversation persistence.
//!
//! Checkpoints form an append-only snapshot log per conversation. Every
//! executor step appends one record; nothing is ever rewritten, so any
//! earlier snapshot can be resumed or forked.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::executor::ExecutorNode;
use crate::state::TurnState;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use researchx_core::AppResult;
use serde::{Deserialize, Serialize};

/// Name given to new conversations.
pub const DEFAULT_CONVERSATION_NAME: &str = "New Chat";

/// One persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub conversation_id: String,
    /// Strictly increasing per conversation, assigned by the store.
    pub seq: u64,
    /// 1-based turn number within the conversation.
    pub turn: u32,
    /// Node that produced this snapshot; `None` for the first one of a turn.
    pub node: Option<ExecutorNode>,
    /// Node to run when resuming from this snapshot.
    pub next: ExecutorNode,
    pub state: TurnState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn is_terminal(&self) -> bool {
        self.next == ExecutorNode::Done
    }
}

/// Checkpoint contents before the store assigns `seq` and `created_at`.
#[derive(Debug, Clone)]
pub struct CheckpointDraft {
    pub turn: u32,
    pub node: Option<ExecutorNode>,
    pub next: ExecutorNode,
    pub state: TurnState,
}

/// Append-only snapshot log keyed by conversation.
pub trait CheckpointStore: Send + Sync {
    /// Append a snapshot and return it with its assigned `seq`.
    fn save(&self, conversation_id: &str, draft: CheckpointDraft) -> AppResult<Checkpoint>;

    /// Latest snapshot.
    fn load(&self, conversation_id: &str) -> AppResult<Option<Checkpoint>>;

    /// Every snapshot, oldest first.
    fn history(&self, conversation_id: &str) -> AppResult<Vec<Checkpoint>>;

    fn get(&self, conversation_id: &str, seq: u64) -> AppResult<Option<Checkpoint>>;

    /// Remove every snapshot of the conversation. Irreversible.
    fn delete(&self, conversation_id: &str) -> AppResult<()>;
}

/// Sidebar entry for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

pub trait ConversationStore: Send + Sync {
    /// Create a conversation with a fresh identifier.
    fn create(&self) -> AppResult<ConversationSummary>;

    /// Most recently used first.
    fn list(&self) -> AppResult<Vec<ConversationSummary>>;

    fn get(&self, id: &str) -> AppResult<Option<ConversationSummary>>;

    fn rename(&self, id: &str, name: &str) -> AppResult<()>;

    /// Bump `last_used` to now.
    fn touch(&self, id: &str) -> AppResult<()>;

    /// Remove the conversation and its checkpoints. Returns whether it existed.
    fn delete(&self, id: &str) -> AppResult<bool>;
}

/// Trimmed conversation name, or `None` when nothing is left.
pub fn conversation_name(name: &str) -> Option<&str> {
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

pub(crate) fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_name_is_trimmed() {
        assert_eq!(conversation_name("  Lifetimes \n"), Some("Lifetimes"));
        assert_eq!(conversation_name(" \t "), None);
        assert_eq!(conversation_name(""), None);
    }
}
