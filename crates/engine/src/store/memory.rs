//! In-process store for tests and throwaway runs.

use super::{
    new_conversation_id, now, Checkpoint, CheckpointDraft, CheckpointStore, ConversationStore,
    ConversationSummary, DEFAULT_CONVERSATION_NAME,
};
use researchx_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    checkpoints: HashMap<String, Vec<Checkpoint>>,
    /// Conversations paired with their creation order.
    conversations: HashMap<String, (u64, ConversationSummary)>,
    created: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> AppResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Persistence("Memory store lock poisoned".to_string()))
    }
}

impl CheckpointStore for MemoryStore {
    fn save(&self, conversation_id: &str, draft: CheckpointDraft) -> AppResult<Checkpoint> {
        let mut inner = self.inner()?;
        let log = inner
            .checkpoints
            .entry(conversation_id.to_string())
            .or_default();
        let checkpoint = Checkpoint {
            conversation_id: conversation_id.to_string(),
            seq: log.last().map(|c| c.seq + 1).unwrap_or(1),
            turn: draft.turn,
            node: draft.node,
            next: draft.next,
            state: draft.state,
            created_at: now(),
        };
        log.push(checkpoint.clone());
        Ok(checkpoint)
    }

    fn load(&self, conversation_id: &str) -> AppResult<Option<Checkpoint>> {
        Ok(self
            .inner()?
            .checkpoints
            .get(conversation_id)
            .and_then(|log| log.last().cloned()))
    }

    fn history(&self, conversation_id: &str) -> AppResult<Vec<Checkpoint>> {
        Ok(self
            .inner()?
            .checkpoints
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    fn get(&self, conversation_id: &str, seq: u64) -> AppResult<Option<Checkpoint>> {
        Ok(self
            .inner()?
            .checkpoints
            .get(conversation_id)
            .and_then(|log| log.iter().find(|c| c.seq == seq).cloned()))
    }

    fn delete(&self, conversation_id: &str) -> AppResult<()> {
        self.inner()?.checkpoints.remove(conversation_id);
        Ok(())
    }
}

impl ConversationStore for MemoryStore {
    fn create(&self) -> AppResult<ConversationSummary> {
        let at = now();
        let summary = ConversationSummary {
            id: new_conversation_id(),
            name: DEFAULT_CONVERSATION_NAME.to_string(),
            created_at: at,
            last_used: at,
        };

        let mut inner = self.inner()?;
        inner.created += 1;
        let order = inner.created;
        inner
            .conversations
            .insert(summary.id.clone(), (order, summary.clone()));
        Ok(summary)
    }

    fn list(&self) -> AppResult<Vec<ConversationSummary>> {
        let inner = self.inner()?;
        let mut entries: Vec<&(u64, ConversationSummary)> = inner.conversations.values().collect();
        entries.sort_by(|a, b| {
            b.1.last_used
                .cmp(&a.1.last_used)
                .then_with(|| b.0.cmp(&a.0))
        });
        Ok(entries.into_iter().map(|(_, summary)| summary.clone()).collect())
    }

    fn get(&self, id: &str) -> AppResult<Option<ConversationSummary>> {
        Ok(self
            .inner()?
            .conversations
            .get(id)
            .map(|(_, summary)| summary.clone()))
    }

    fn rename(&self, id: &str, name: &str) -> AppResult<()> {
        let mut inner = self.inner()?;
        let (_, summary) = inner
            .conversations
            .get_mut(id)
            .ok_or_else(|| AppError::Conversation(format!("Unknown conversation: {}", id)))?;
        summary.name = name.to_string();
        Ok(())
    }

    fn touch(&self, id: &str) -> AppResult<()> {
        let mut inner = self.inner()?;
        let (_, summary) = inner
            .conversations
            .get_mut(id)
            .ok_or_else(|| AppError::Conversation(format!("Unknown conversation: {}", id)))?;
        summary.last_used = now();
        Ok(())
    }

    fn delete(&self, id: &str) -> AppResult<bool> {
        let mut inner = self.inner()?;
        inner.checkpoints.remove(id);
        Ok(inner.conversations.remove(id).is_some())
    }
}
