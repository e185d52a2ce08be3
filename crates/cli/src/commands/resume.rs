//! Resume command handler.

use super::ask::print_answer;
use crate::progress;
use crate::session::Session;
use clap::Args;
use researchx_core::{config::AppConfig, AppResult};

/// Continue an interrupted turn, or replay from an earlier checkpoint
#[derive(Args, Debug)]
pub struct ResumeCommand {
    /// Conversation id
    pub id: String,

    /// Start a new turn from this checkpoint instead of the latest one
    #[arg(long)]
    pub from: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ResumeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let session = Session::open(config)?;

        let stream = match self.from {
            Some(seq) => {
                tracing::info!(conversation = %self.id, seq, "Replaying from checkpoint");
                session.engine.fork(&self.id, seq)?
            }
            None => {
                tracing::info!(conversation = %self.id, "Resuming conversation");
                session.engine.resume(&self.id)?
            }
        };

        let event = progress::follow(stream, self.json).await?;
        print_answer(&event, self.json)
    }
}
