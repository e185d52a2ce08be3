//! History command handler.
//!
//! Prints finished exchanges, or with `--checkpoints` the raw snapshot log
//! (whose `seq` values are what `resume --from` accepts).

use crate::session::open_store;
use clap::Args;
use researchx_core::{config::AppConfig, AppError, AppResult};
use researchx_engine::{Checkpoint, CheckpointStore, ConversationStore};

/// Show a conversation's exchanges or checkpoints
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Conversation id
    pub id: String,

    /// List every checkpoint instead of the exchanges
    #[arg(long)]
    pub checkpoints: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = open_store(config)?;
        let conversation = ConversationStore::get(&store, &self.id)?
            .ok_or_else(|| AppError::Conversation(format!("Unknown conversation: {}", self.id)))?;
        let checkpoints = store.history(&self.id)?;

        if self.checkpoints {
            if self.json {
                println!("{}", serde_json::to_string_pretty(&checkpoints)?);
            } else {
                for checkpoint in &checkpoints {
                    println!("{}", describe(checkpoint));
                }
            }
            return Ok(());
        }

        let turns = turns(&checkpoints);
        if self.json {
            let output = serde_json::json!({
                "id": conversation.id,
                "name": conversation.name,
                "turns": turns,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("# {}", conversation.name);
        for turn in &turns {
            println!();
            println!("Q: {}", turn["question"].as_str().unwrap_or_default());
            match turn["answer"].as_str() {
                Some(answer) => println!("A: {}", answer),
                None => println!(
                    "(unfinished, next step: {}; run 'researchx resume {}')",
                    turn["next"].as_str().unwrap_or_default(),
                    conversation.id
                ),
            }
        }
        Ok(())
    }
}

/// Latest checkpoint of each turn, as JSON.
fn turns(checkpoints: &[Checkpoint]) -> Vec<serde_json::Value> {
    let mut out: Vec<serde_json::Value> = Vec::new();
    for (index, checkpoint) in checkpoints.iter().enumerate() {
        let last_of_turn = checkpoints
            .get(index + 1)
            .map(|following| following.turn != checkpoint.turn)
            .unwrap_or(true);
        if !last_of_turn {
            continue;
        }
        out.push(serde_json::json!({
            "turn": checkpoint.turn,
            "question": checkpoint.state.original_query,
            "answer": checkpoint.state.final_answer,
            "next": checkpoint.next,
            "seq": checkpoint.seq,
        }));
    }
    out
}

fn describe(checkpoint: &Checkpoint) -> String {
    let node = checkpoint
        .node
        .map(|n| n.to_string())
        .unwrap_or_else(|| "start".to_string());
    let source = checkpoint
        .state
        .active_source
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>4}  turn {:<3} {:<13} -> {:<13} {:<21} evidence={}",
        checkpoint.seq,
        checkpoint.turn,
        node,
        checkpoint.next.as_str(),
        source,
        checkpoint.state.evidence.len()
    )
}
