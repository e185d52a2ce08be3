//! SQLite implementation of both stores (`.researchx/research.sqlite`).

use super::{
    format_timestamp, new_conversation_id, now, Checkpoint, CheckpointDraft, CheckpointStore,
    ConversationStore, ConversationSummary, DEFAULT_CONVERSATION_NAME,
};
use crate::executor::ExecutorNode;
use chrono::{DateTime, Utc};
use researchx_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_used TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS checkpoints (
    conversation_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    turn INTEGER NOT NULL,
    node TEXT,
    next TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (conversation_id, seq)
);
"#;

const CHECKPOINT_COLUMNS: &str = "conversation_id, seq, turn, node, next, state, created_at";

/// Single-file store. Writes are serialized by the connection mutex and each
/// checkpoint append runs in its own immediate transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            AppError::Persistence(format!("Failed to open {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "Opened research database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Persistence("Database lock poisoned".to_string()))
    }
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| AppError::Persistence(format!("Invalid timestamp '{}': {}", raw, e)))
}

fn parse_node(raw: &str) -> AppResult<ExecutorNode> {
    ExecutorNode::parse(raw)
        .ok_or_else(|| AppError::Persistence(format!("Unknown executor node '{}'", raw)))
}

struct CheckpointRow {
    conversation_id: String,
    seq: i64,
    turn: i64,
    node: Option<String>,
    next: String,
    state: String,
    created_at: String,
}

impl CheckpointRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            conversation_id: row.get(0)?,
            seq: row.get(1)?,
            turn: row.get(2)?,
            node: row.get(3)?,
            next: row.get(4)?,
            state: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_checkpoint(self) -> AppResult<Checkpoint> {
        Ok(Checkpoint {
            conversation_id: self.conversation_id,
            seq: self.seq as u64,
            turn: self.turn as u32,
            node: self.node.as_deref().map(parse_node).transpose()?,
            next: parse_node(&self.next)?,
            state: serde_json::from_str(&self.state)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_summary(raw: (String, String, String, String)) -> AppResult<ConversationSummary> {
    let (id, name, created_at, last_used) = raw;
    Ok(ConversationSummary {
        id,
        name,
        created_at: parse_timestamp(&created_at)?,
        last_used: parse_timestamp(&last_used)?,
    })
}

impl CheckpointStore for SqliteStore {
    fn save(&self, conversation_id: &str, draft: CheckpointDraft) -> AppResult<Checkpoint> {
        let state_json = serde_json::to_string(&draft.state)?;
        let created_at = now();

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM checkpoints WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO checkpoints (conversation_id, seq, turn, node, next, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                conversation_id,
                seq,
                draft.turn as i64,
                draft.node.map(|node| node.as_str()),
                draft.next.as_str(),
                state_json,
                format_timestamp(&created_at),
            ],
        )?;
        tx.commit()?;

        Ok(Checkpoint {
            conversation_id: conversation_id.to_string(),
            seq: seq as u64,
            turn: draft.turn,
            node: draft.node,
            next: draft.next,
            state: draft.state,
            created_at,
        })
    }

    fn load(&self, conversation_id: &str) -> AppResult<Option<Checkpoint>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM checkpoints WHERE conversation_id = ?1 ORDER BY seq DESC LIMIT 1",
                    CHECKPOINT_COLUMNS
                ),
                params![conversation_id],
                CheckpointRow::from_row,
            )
            .optional()?;
        row.map(CheckpointRow::into_checkpoint).transpose()
    }

    fn history(&self, conversation_id: &str) -> AppResult<Vec<Checkpoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM checkpoints WHERE conversation_id = ?1 ORDER BY seq ASC",
            CHECKPOINT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![conversation_id], CheckpointRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(CheckpointRow::into_checkpoint).collect()
    }

    fn get(&self, conversation_id: &str, seq: u64) -> AppResult<Option<Checkpoint>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM checkpoints WHERE conversation_id = ?1 AND seq = ?2",
                    CHECKPOINT_COLUMNS
                ),
                params![conversation_id, seq as i64],
                CheckpointRow::from_row,
            )
            .optional()?;
        row.map(CheckpointRow::into_checkpoint).transpose()
    }

    fn delete(&self, conversation_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM checkpoints WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        tracing::debug!(conversation = conversation_id, removed, "Deleted checkpoints");
        Ok(())
    }
}

impl ConversationStore for SqliteStore {
    fn create(&self) -> AppResult<ConversationSummary> {
        let at = now();
        let summary = ConversationSummary {
            id: new_conversation_id(),
            name: DEFAULT_CONVERSATION_NAME.to_string(),
            created_at: at,
            last_used: at,
        };

        self.conn()?.execute(
            "INSERT INTO conversations (id, name, created_at, last_used) VALUES (?1, ?2, ?3, ?4)",
            params![
                summary.id,
                summary.name,
                format_timestamp(&at),
                format_timestamp(&at)
            ],
        )?;
        Ok(summary)
    }

    fn list(&self) -> AppResult<Vec<ConversationSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, last_used FROM conversations
             ORDER BY last_used DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], conversation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(into_summary).collect()
    }

    fn get(&self, id: &str) -> AppResult<Option<ConversationSummary>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, created_at, last_used FROM conversations WHERE id = ?1",
                params![id],
                conversation_from_row,
            )
            .optional()?;
        row.map(into_summary).transpose()
    }

    fn rename(&self, id: &str, name: &str) -> AppResult<()> {
        let updated = self.conn()?.execute(
            "UPDATE conversations SET name = ?2 WHERE id = ?1",
            params![id, name],
        )?;
        if updated == 0 {
            return Err(AppError::Conversation(format!("Unknown conversation: {}", id)));
        }
        Ok(())
    }

    fn touch(&self, id: &str) -> AppResult<()> {
        let updated = self.conn()?.execute(
            "UPDATE conversations SET last_used = ?2 WHERE id = ?1",
            params![id, format_timestamp(&now())],
        )?;
        if updated == 0 {
            return Err(AppError::Conversation(format!("Unknown conversation: {}", id)));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM checkpoints WHERE conversation_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;
    use crate::state::TurnState;
    use std::time::Duration;
    use tempfile::TempDir;

    fn draft(turn: u32, next: ExecutorNode) -> CheckpointDraft {
        CheckpointDraft {
            turn,
            node: None,
            next,
            state: TurnState::new("what is rust", Vec::new(), SourceId::GeneralWeb),
        }
    }

    #[test]
    fn test_seq_is_per_conversation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a1 = store.save("a", draft(1, ExecutorNode::Routing)).unwrap();
        let a2 = store.save("a", draft(1, ExecutorNode::Searching)).unwrap();
        let b1 = store.save("b", draft(1, ExecutorNode::Routing)).unwrap();

        assert_eq!((a1.seq, a2.seq, b1.seq), (1, 2, 1));
        assert_eq!(store.load("a").unwrap().unwrap().next, ExecutorNode::Searching);
        assert_eq!(store.history("a").unwrap().len(), 2);
        assert_eq!(
            CheckpointStore::get(&store, "a", 1).unwrap().unwrap().next,
            ExecutorNode::Routing
        );
        assert!(CheckpointStore::get(&store, "a", 9).unwrap().is_none());
    }

    #[test]
    fn test_checkpoints_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".researchx/research.sqlite");

        let saved = {
            let store = SqliteStore::open(&path).unwrap();
            let mut draft = draft(2, ExecutorNode::Grading);
            draft.node = Some(ExecutorNode::Searching);
            draft.state.pending_passages = vec!["p".to_string()];
            store.save("conv", draft).unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load("conv").unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_conversation_lifecycle() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.create().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = store.create().unwrap();
        assert_eq!(first.name, DEFAULT_CONVERSATION_NAME);
        assert_ne!(first.id, second.id);

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

        std::thread::sleep(Duration::from_millis(5));
        store.touch(&first.id).unwrap();
        store.rename(&first.id, "Rust Memory Model").unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[0].name, "Rust Memory Model");

        assert!(store.rename("missing", "x").is_err());
        assert!(store.touch("missing").is_err());
    }

    #[test]
    fn test_delete_removes_row_and_checkpoints() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conv = store.create().unwrap();
        store.save(&conv.id, draft(1, ExecutorNode::Routing)).unwrap();

        assert!(ConversationStore::delete(&store, &conv.id).unwrap());
        assert!(store.load(&conv.id).unwrap().is_none());
        assert!(ConversationStore::get(&store, &conv.id).unwrap().is_none());
        assert!(!ConversationStore::delete(&store, &conv.id).unwrap());
    }
}
