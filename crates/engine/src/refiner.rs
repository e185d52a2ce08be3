//! Query Refiner: rewrites the working query for one source.

use crate::error::{EngineError, EngineResult};
use crate::executor::ExecutorNode;
use crate::generator::{render, Generator, REFINE_PROMPT};
use crate::source::SourceId;
use crate::state::{Exchange, TurnState};
use researchx_prompt::PromptLibrary;
use serde_json::json;
use std::sync::Arc;

/// What the refiner sees of the conversation.
#[derive(Debug, Clone, Copy)]
pub struct RefineContext<'a> {
    pub question: &'a str,
    pub history: &'a [Exchange],
    pub previous_queries: &'a [String],
}

impl<'a> RefineContext<'a> {
    pub fn for_source(state: &'a TurnState, source: SourceId) -> Self {
        Self {
            question: &state.original_query,
            history: &state.history,
            previous_queries: state.queries_for(source),
        }
    }
}

pub struct QueryRefiner {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptLibrary>,
}

impl QueryRefiner {
    pub fn new(generator: Arc<dyn Generator>, prompts: Arc<PromptLibrary>) -> Self {
        Self { generator, prompts }
    }

    /// Produce a rewritten query for `target`.
    ///
    /// A failed or empty generation is a `Generation` error; the stale query
    /// is never reused.
    pub async fn refine(
        &self,
        context: RefineContext<'_>,
        target: SourceId,
        is_retry: bool,
    ) -> EngineResult<String> {
        let failure = |message: String| EngineError::Generation {
            step: ExecutorNode::Refining,
            source_id: target,
            message,
        };

        let history: Vec<_> = context
            .history
            .iter()
            .map(|exchange| json!({ "question": exchange.question, "answer": exchange.answer }))
            .collect();

        let prompt = render(
            &self.prompts,
            REFINE_PROMPT,
            &[
                ("source_label", json!(target.label())),
                ("source_conventions", json!(target.conventions())),
                ("is_retry", json!(is_retry)),
                ("previous_queries", json!(context.previous_queries)),
                ("history", json!(history)),
                ("question", json!(context.question)),
            ],
        )
        .map_err(|e| failure(e.to_string()))?;

        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| failure(e.to_string()))?;

        let query = clean_query(&raw);
        if query.is_empty() {
            return Err(failure("model returned an empty query".to_string()));
        }

        tracing::debug!(source = %target, is_retry, query = %query, "Refined query");
        Ok(query)
    }

    /// Refine the query for `target` and return the updated state.
    ///
    /// Increments `attempts_used` for `target` by exactly one.
    pub async fn refine_turn(&self, state: &TurnState, target: SourceId) -> EngineResult<TurnState> {
        let is_retry = state.source_progress.get(target).attempts_used > 0;
        let query = self
            .refine(RefineContext::for_source(state, target), target, is_retry)
            .await?;

        let mut next = state.clone();
        next.source_progress.get_mut(target).attempts_used += 1;
        next.working_query = query;
        next.active_source = Some(target);
        Ok(next)
    }
}

/// Trim, drop a leading label and strip wrapping quotes.
fn clean_query(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    let line = line
        .strip_prefix("Optimized query string:")
        .or_else(|| line.strip_prefix("Query:"))
        .unwrap_or(line)
        .trim();

    line.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}
