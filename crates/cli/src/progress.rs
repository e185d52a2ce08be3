//! Progress reporting for a running turn.
//!
//! Labels go to stderr so stdout only ever carries the answer.

use futures::StreamExt;
use researchx_core::{AppError, AppResult};
use researchx_engine::{Action, ExecutorEvent, ExecutorNode, TurnStream};

/// Human label for an event, if it is worth showing.
pub fn label(event: &ExecutorEvent) -> Option<String> {
    match (event.node, event.action) {
        (ExecutorNode::Routing, Some(Action::Search(source))) => {
            Some(format!("Searching {}...", source.label()))
        }
        (ExecutorNode::Routing, Some(Action::RefineQuery(source))) => {
            Some(format!("Rewriting the query for {}...", source.label()))
        }
        (ExecutorNode::Routing, Some(Action::Synthesize)) => {
            Some("Writing the answer...".to_string())
        }
        (ExecutorNode::Refining, _) => Some(format!("  query: {}", event.state.working_query)),
        (ExecutorNode::Grading, _) => event.state.active_source.map(|source| {
            let status = event.state.source_progress.get(source);
            format!("  {} relevant passage(s) from {}", status.relevant_found, source.label())
        }),
        _ => None,
    }
}

/// Drive `stream` to the end and return the terminal event.
pub async fn follow(mut stream: TurnStream, quiet: bool) -> AppResult<ExecutorEvent> {
    let mut last = None;
    while let Some(item) = stream.next().await {
        let event = item?;
        if !quiet {
            if let Some(text) = label(&event) {
                eprintln!("{}", text);
            }
        }
        last = Some(event);
    }

    match last {
        Some(event) if event.is_terminal() => Ok(event),
        Some(event) => Err(AppError::Other(format!(
            "turn stopped before finishing (next step: {})",
            event.next
        ))),
        None => Err(AppError::Other("turn produced no events".to_string())),
    }
}
