//! Ask command handler.
//!
//! Runs one research turn and prints the answer.

use crate::progress;
use crate::session::Session;
use clap::Args;
use researchx_core::{config::AppConfig, AppError, AppResult};
use researchx_engine::store::DEFAULT_CONVERSATION_NAME;
use researchx_engine::{suggest_title, ExecutorEvent};
use std::path::PathBuf;

/// Research a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to research
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Conversation to continue (a new one is created when omitted)
    #[arg(long)]
    pub chat: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.question()?;
        let session = Session::open(config)?;

        let conversation = match &self.chat {
            Some(id) => session.engine.conversation(id)?,
            None => session.engine.create_conversation()?,
        };

        if conversation.name == DEFAULT_CONVERSATION_NAME
            && session.engine.transcript(&conversation.id)?.is_empty()
        {
            let title = suggest_title(session.generator.as_ref(), &session.prompts, &question).await;
            if title != DEFAULT_CONVERSATION_NAME {
                session.engine.rename_conversation(&conversation.id, &title)?;
                tracing::debug!(conversation = %conversation.id, title = %title, "Named conversation");
            }
        }

        let stream = session.engine.submit(&conversation.id, &question)?;
        let event = progress::follow(stream, self.json).await?;
        print_answer(&event, self.json)
    }

    fn question(&self) -> AppResult<String> {
        let text = match (&self.question, &self.file) {
            (Some(question), _) => question.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(AppError::Config("No question provided".to_string()));
            }
        };
        Ok(text.trim().to_string())
    }
}

/// Print the outcome of a finished turn.
pub fn print_answer(event: &ExecutorEvent, json: bool) -> AppResult<()> {
    let answer = event
        .final_answer()
        .ok_or_else(|| AppError::Other("turn finished without an answer".to_string()))?;

    if json {
        let output = serde_json::json!({
            "conversationId": event.conversation_id,
            "turn": event.turn,
            "question": event.state.original_query,
            "answer": answer,
            "evidence": event.state.evidence,
            "sourceProgress": event.state.source_progress,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", answer);
        tracing::debug!(
            conversation = %event.conversation_id,
            evidence = event.state.evidence.len(),
            "Turn finished"
        );
    }

    Ok(())
}
