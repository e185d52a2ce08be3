//! Graph Executor: drives one turn through the fixed node topology.
//!
//! ```text
//! Routing ──> Refining ──> Searching ──> Grading ──> Routing
//!    │                        ^
//!    ├────────────────────────┘
//!    └──> Synthesizing ──> Done
//! ```
//!
//! Each step runs exactly one node from the checkpoint it is handed, appends
//! the resulting snapshot and only then yields the event. A step that fails
//! persists nothing, so the previous checkpoint stays the resume point.

use crate::accumulator::accumulate;
use crate::config::{EngineConfig, GradingTarget};
use crate::error::{EngineError, EngineResult};
use crate::generator::Generator;
use crate::judge::RelevanceJudge;
use crate::refiner::QueryRefiner;
use crate::retrieval::RetrieverSet;
use crate::router::{Action, Router};
use crate::source::{SourceId, SourceState};
use crate::state::TurnState;
use crate::store::{Checkpoint, CheckpointDraft, CheckpointStore};
use crate::synthesizer::Synthesizer;
use futures::stream::{self, Stream, StreamExt};
use researchx_prompt::PromptLibrary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

/// Nodes of the turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorNode {
    Routing,
    Refining,
    Searching,
    Grading,
    Synthesizing,
    Done,
}

impl ExecutorNode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::Refining => "refining",
            Self::Searching => "searching",
            Self::Grading => "grading",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "routing" => Some(Self::Routing),
            "refining" => Some(Self::Refining),
            "searching" => Some(Self::Searching),
            "grading" => Some(Self::Grading),
            "synthesizing" => Some(Self::Synthesizing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observable transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorEvent {
    pub conversation_id: String,
    pub seq: u64,
    pub turn: u32,
    /// Node that just ran.
    pub node: ExecutorNode,
    /// Node that runs next.
    pub next: ExecutorNode,
    /// Router decision, for Routing events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub state: TurnState,
}

impl ExecutorEvent {
    fn from_checkpoint(checkpoint: &Checkpoint, action: Option<Action>) -> Self {
        Self {
            conversation_id: checkpoint.conversation_id.clone(),
            seq: checkpoint.seq,
            turn: checkpoint.turn,
            node: checkpoint.node.unwrap_or(ExecutorNode::Routing),
            next: checkpoint.next,
            action,
            state: checkpoint.state.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next == ExecutorNode::Done
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.state.final_answer.as_deref()
    }
}

/// Lazy, finite sequence of events for one turn.
pub type TurnStream = Pin<Box<dyn Stream<Item = EngineResult<ExecutorEvent>> + Send>>;

pub struct GraphExecutor {
    router: Router,
    refiner: QueryRefiner,
    judge: RelevanceJudge,
    synthesizer: Synthesizer,
    retrievers: RetrieverSet,
    store: Arc<dyn CheckpointStore>,
    grade_against: GradingTarget,
}

impl GraphExecutor {
    pub fn new(
        config: &EngineConfig,
        generator: Arc<dyn Generator>,
        prompts: Arc<PromptLibrary>,
        retrievers: RetrieverSet,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            router: Router::new(config.max_refinements, config.source_order.clone()),
            refiner: QueryRefiner::new(generator.clone(), prompts.clone()),
            judge: RelevanceJudge::new(generator.clone()),
            synthesizer: Synthesizer::new(generator, prompts, config.fallback_answer.clone()),
            retrievers,
            store,
            grade_against: config.grade_against,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run the node `checkpoint.next` and persist its result.
    pub async fn step(&self, checkpoint: &Checkpoint) -> EngineResult<ExecutorEvent> {
        let (saved, action) = self.advance(checkpoint).await?;
        Ok(ExecutorEvent::from_checkpoint(&saved, action))
    }

    async fn advance(&self, checkpoint: &Checkpoint) -> EngineResult<(Checkpoint, Option<Action>)> {
        let node = checkpoint.next;
        let (state, next, action) = match node {
            ExecutorNode::Routing => self.route(&checkpoint.state),
            ExecutorNode::Refining => {
                let source = active_source(&checkpoint.state, node)?;
                let state = self.refiner.refine_turn(&checkpoint.state, source).await?;
                (state, ExecutorNode::Searching, None)
            }
            ExecutorNode::Searching => {
                let source = active_source(&checkpoint.state, node)?;
                (self.search(&checkpoint.state, source).await, ExecutorNode::Grading, None)
            }
            ExecutorNode::Grading => (self.grade(&checkpoint.state).await?, ExecutorNode::Routing, None),
            ExecutorNode::Synthesizing => {
                let answer = self
                    .synthesizer
                    .synthesize(&checkpoint.state.original_query, &checkpoint.state.evidence)
                    .await?;
                let mut state = checkpoint.state.clone();
                state.final_answer = Some(answer);
                state.active_source = None;
                (state, ExecutorNode::Done, None)
            }
            ExecutorNode::Done => {
                return Err(EngineError::InvalidState(format!(
                    "turn {} of {} is already finished",
                    checkpoint.turn, checkpoint.conversation_id
                )))
            }
        };

        let saved = self
            .store
            .save(
                &checkpoint.conversation_id,
                CheckpointDraft {
                    turn: checkpoint.turn,
                    node: Some(node),
                    next,
                    state,
                },
            )
            .map_err(|e| EngineError::persistence(node, e))?;

        tracing::info!(
            conversation = %saved.conversation_id,
            seq = saved.seq,
            node = %node,
            next = %next,
            source = ?saved.state.active_source.map(|s| s.as_str()),
            "Executor step"
        );

        Ok((saved, action))
    }

    fn route(&self, state: &TurnState) -> (TurnState, ExecutorNode, Option<Action>) {
        let decision = self.router.decide(state);
        let mut next_state = state.clone();

        for source in &decision.exhausted {
            next_state.source_progress.get_mut(*source).state = SourceState::Exhausted;
            tracing::debug!(source = %source, "Source exhausted");
        }

        let next = match decision.action {
            Action::Search(source) => {
                next_state.active_source = Some(source);
                ExecutorNode::Searching
            }
            Action::RefineQuery(source) => {
                next_state.active_source = Some(source);
                ExecutorNode::Refining
            }
            Action::Synthesize => ExecutorNode::Synthesizing,
        };

        tracing::debug!(action = %decision.action, "Routed");
        (next_state, next, Some(decision.action))
    }

    /// Backend failures count as an empty result.
    async fn search(&self, state: &TurnState, source: SourceId) -> TurnState {
        let mut next = state.clone();
        let query = state.working_query.clone();

        let passages = match self.retrievers.get(source).search(&query).await {
            Ok(passages) => passages,
            Err(e) => {
                let failure = EngineError::Retrieval {
                    source_id: source,
                    message: e.to_string(),
                };
                tracing::warn!(error = %failure, "Search failed, treating as no results");
                next.source_progress.get_mut(source).errors += 1;
                Vec::new()
            }
        };

        next.source_progress.get_mut(source).queries.push(query);
        next.pending_passages = passages;
        next
    }

    async fn grade(&self, state: &TurnState) -> EngineResult<TurnState> {
        let question = match self.grade_against {
            GradingTarget::OriginalQuestion => &state.original_query,
            GradingTarget::WorkingQuery => &state.working_query,
        };
        let relevant = self.judge.filter(&state.pending_passages, question).await;
        accumulate(state, relevant)
    }

    /// Stream the turn from `start` until it reaches `Done` or fails.
    ///
    /// The stream ends after the terminal event or after the first error.
    pub fn run(self: Arc<Self>, start: Checkpoint) -> TurnStream {
        stream::unfold(Some(start), move |cursor| {
            let executor = Arc::clone(&self);
            async move {
                let current: Checkpoint = match cursor {
                    Some(checkpoint) if !checkpoint.is_terminal() => checkpoint,
                    _ => return None,
                };

                match executor.advance(&current).await {
                    Ok((saved, action)) => {
                        let event = ExecutorEvent::from_checkpoint(&saved, action);
                        Some((Ok(event), Some(saved)))
                    }
                    Err(e) => {
                        tracing::error!(
                            conversation = %current.conversation_id,
                            step = %current.next,
                            error = %e,
                            "Turn failed"
                        );
                        Some((Err(e), None))
                    }
                }
            }
        })
        .boxed()
    }
}

fn active_source(state: &TurnState, node: ExecutorNode) -> EngineResult<SourceId> {
    state
        .active_source
        .ok_or_else(|| EngineError::InvalidState(format!("{} requires an active source", node)))
}
