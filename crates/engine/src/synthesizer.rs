//! Synthesizer: turns accumulated evidence into the final answer.

use crate::error::{EngineError, EngineResult};
use crate::generator::{render, Generator, SYNTHESIZE_PROMPT};
use researchx_prompt::PromptLibrary;
use serde_json::json;
use std::sync::Arc;

/// Separator placed between evidence passages in the grounding context.
pub const EVIDENCE_SEPARATOR: &str = "\n\n---\n\n";

pub struct Synthesizer {
    generator: Arc<dyn Generator>,
    prompts: Arc<PromptLibrary>,
    fallback_answer: String,
}

impl Synthesizer {
    pub fn new(
        generator: Arc<dyn Generator>,
        prompts: Arc<PromptLibrary>,
        fallback_answer: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            prompts,
            fallback_answer: fallback_answer.into(),
        }
    }

    /// Answer `original_query` strictly from `evidence`.
    ///
    /// With no evidence the fallback answer is returned and the generator is
    /// not called.
    pub async fn synthesize(&self, original_query: &str, evidence: &[String]) -> EngineResult<String> {
        if evidence.is_empty() {
            tracing::info!("No evidence gathered, returning fallback answer");
            return Ok(self.fallback_answer.clone());
        }

        let failure = |message: String| EngineError::Synthesis { message };

        let prompt = render(
            &self.prompts,
            SYNTHESIZE_PROMPT,
            &[
                ("documents", json!(evidence.join(EVIDENCE_SEPARATOR))),
                ("question", json!(original_query)),
            ],
        )
        .map_err(|e| failure(e.to_string()))?;

        let answer = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| failure(e.to_string()))?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(failure("model returned an empty answer".to_string()));
        }
        Ok(answer.to_string())
    }
}
