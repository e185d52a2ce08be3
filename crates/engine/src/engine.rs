//! Engine entry point: conversation lifecycle, submit, resume and fork.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::{ExecutorNode, GraphExecutor, TurnStream};
use crate::generator::Generator;
use crate::retrieval::RetrieverSet;
use crate::state::{Exchange, TurnState};
use crate::store::{
    conversation_name, Checkpoint, CheckpointDraft, CheckpointStore, ConversationStore,
    ConversationSummary,
};
use futures::StreamExt;
use researchx_prompt::PromptLibrary;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Marks a conversation as having a turn in flight until dropped.
struct TurnGuard {
    conversation_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TurnGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, conversation_id: &str) -> EngineResult<Self> {
        let mut active = in_flight
            .lock()
            .map_err(|_| EngineError::InvalidState("turn registry lock poisoned".to_string()))?;
        if !active.insert(conversation_id.to_string()) {
            return Err(EngineError::TurnInProgress(conversation_id.to_string()));
        }
        Ok(Self {
            conversation_id: conversation_id.to_string(),
            in_flight: Arc::clone(in_flight),
        })
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.in_flight.lock() {
            active.remove(&self.conversation_id);
        }
    }
}

/// Research engine over a checkpoint store and a conversation store.
pub struct ResearchEngine {
    executor: Arc<GraphExecutor>,
    checkpoints: Arc<dyn CheckpointStore>,
    conversations: Arc<dyn ConversationStore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    config: EngineConfig,
}

impl ResearchEngine {
    pub fn new(
        config: EngineConfig,
        generator: Arc<dyn Generator>,
        prompts: Arc<PromptLibrary>,
        retrievers: RetrieverSet,
        checkpoints: Arc<dyn CheckpointStore>,
        conversations: Arc<dyn ConversationStore>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let executor = GraphExecutor::new(&config, generator, prompts, retrievers, checkpoints.clone());
        Ok(Self {
            executor: Arc::new(executor),
            checkpoints,
            conversations,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Conversation lifecycle

    pub fn create_conversation(&self) -> EngineResult<ConversationSummary> {
        let summary = self.conversations.create()?;
        tracing::info!(conversation = %summary.id, "Created conversation");
        Ok(summary)
    }

    pub fn list_conversations(&self) -> EngineResult<Vec<ConversationSummary>> {
        Ok(self.conversations.list()?)
    }

    pub fn conversation(&self, id: &str) -> EngineResult<ConversationSummary> {
        self.conversations
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub fn rename_conversation(&self, id: &str, name: &str) -> EngineResult<()> {
        self.conversation(id)?;
        let name = conversation_name(name)
            .ok_or_else(|| EngineError::InvalidState("conversation name cannot be empty".to_string()))?;
        self.conversations.rename(id, name)?;
        Ok(())
    }

    pub fn touch_conversation(&self, id: &str) -> EngineResult<()> {
        self.conversation(id)?;
        self.conversations.touch(id)?;
        Ok(())
    }

    /// Delete a conversation and every checkpoint it owns.
    ///
    /// Rejected while a turn is running for it.
    pub fn delete_conversation(&self, id: &str) -> EngineResult<()> {
        let _guard = TurnGuard::acquire(&self.in_flight, id)?;
        self.checkpoints.delete(id)?;
        if !self.conversations.delete(id)? {
            return Err(EngineError::NotFound(id.to_string()));
        }
        tracing::info!(conversation = id, "Deleted conversation");
        Ok(())
    }

    // Checkpoints

    pub fn load(&self, id: &str) -> EngineResult<Option<Checkpoint>> {
        Ok(self.checkpoints.load(id)?)
    }

    pub fn history(&self, id: &str) -> EngineResult<Vec<Checkpoint>> {
        Ok(self.checkpoints.history(id)?)
    }

    /// Completed exchanges of the conversation, oldest first.
    pub fn transcript(&self, id: &str) -> EngineResult<Vec<Exchange>> {
        Ok(completed_turns(&self.checkpoints.history(id)?))
    }

    // Turns

    /// Start a new turn for `question`.
    ///
    /// The first checkpoint is written before this returns, so the turn can
    /// be resumed even if no event is ever polled.
    pub fn submit(&self, conversation_id: &str, question: &str) -> EngineResult<TurnStream> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EngineError::InvalidState("question cannot be empty".to_string()));
        }
        self.conversation(conversation_id)?;
        let guard = TurnGuard::acquire(&self.in_flight, conversation_id)?;

        let checkpoints = self
            .checkpoints
            .history(conversation_id)
            .map_err(|e| EngineError::persistence(ExecutorNode::Routing, e))?;
        if let Some(last) = checkpoints.last() {
            if !last.is_terminal() {
                tracing::warn!(
                    conversation = conversation_id,
                    turn = last.turn,
                    "Abandoning unfinished turn"
                );
            }
        }

        let turn = checkpoints.last().map(|c| c.turn + 1).unwrap_or(1);
        let state = TurnState::new(
            question,
            completed_turns(&checkpoints),
            self.config.first_source(),
        );

        let start = self
            .checkpoints
            .save(
                conversation_id,
                CheckpointDraft {
                    turn,
                    node: None,
                    next: ExecutorNode::Routing,
                    state,
                },
            )
            .map_err(|e| EngineError::persistence(ExecutorNode::Routing, e))?;
        self.conversations.touch(conversation_id)?;

        tracing::info!(conversation = conversation_id, turn, "Submitted question");
        Ok(self.start(start, guard))
    }

    /// Continue the latest unfinished turn from its last checkpoint.
    pub fn resume(&self, conversation_id: &str) -> EngineResult<TurnStream> {
        let guard = TurnGuard::acquire(&self.in_flight, conversation_id)?;
        let last = self
            .checkpoints
            .load(conversation_id)
            .map_err(|e| EngineError::persistence(ExecutorNode::Routing, e))?
            .ok_or_else(|| EngineError::NotFound(conversation_id.to_string()))?;

        if last.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "turn {} of {} already finished",
                last.turn, conversation_id
            )));
        }

        tracing::info!(
            conversation = conversation_id,
            seq = last.seq,
            next = %last.next,
            "Resuming turn"
        );
        Ok(self.start(last, guard))
    }

    /// Branch from checkpoint `seq`: its snapshot is appended as the start of
    /// a new turn and execution continues from there. Earlier snapshots are
    /// left untouched.
    pub fn fork(&self, conversation_id: &str, seq: u64) -> EngineResult<TurnStream> {
        let guard = TurnGuard::acquire(&self.in_flight, conversation_id)?;
        let source = self
            .checkpoints
            .get(conversation_id, seq)
            .map_err(|e| EngineError::persistence(ExecutorNode::Routing, e))?
            .ok_or_else(|| {
                EngineError::NotFound(format!("{} at checkpoint {}", conversation_id, seq))
            })?;
        if source.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "checkpoint {} is terminal, nothing to replay",
                seq
            )));
        }

        let turn = self
            .checkpoints
            .load(conversation_id)
            .map_err(|e| EngineError::persistence(source.next, e))?
            .map(|c| c.turn + 1)
            .unwrap_or(1);
        let start = self
            .checkpoints
            .save(
                conversation_id,
                CheckpointDraft {
                    turn,
                    node: source.node,
                    next: source.next,
                    state: source.state,
                },
            )
            .map_err(|e| EngineError::persistence(source.next, e))?;

        tracing::info!(conversation = conversation_id, from = seq, turn, "Forked turn");
        Ok(self.start(start, guard))
    }

    fn start(&self, start: Checkpoint, guard: TurnGuard) -> TurnStream {
        Arc::clone(&self.executor)
            .run(start)
            .map(move |item| {
                // held until the stream is dropped
                let _guard = &guard;
                item
            })
            .boxed()
    }
}

/// Question/answer pairs of finished turns, in order.
fn completed_turns(checkpoints: &[Checkpoint]) -> Vec<Exchange> {
    checkpoints
        .iter()
        .filter(|c| c.is_terminal())
        .filter_map(|c| {
            c.state.final_answer.as_ref().map(|answer| Exchange {
                question: c.state.original_query.clone(),
                answer: answer.clone(),
            })
        })
        .collect()
}
