//! Generation capability used by the refiner, the judge and the synthesizer.

use async_trait::async_trait;
use researchx_core::{AppError, AppResult};
use researchx_llm::{LlmClient, LlmRequest};
use researchx_prompt::{build_prompt, BuiltPrompt, PromptLibrary};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const GRADE_PROMPT: &str = "research.grade";
pub const REFINE_PROMPT: &str = "research.refine";
pub const SYNTHESIZE_PROMPT: &str = "research.synthesize";
pub const TITLE_PROMPT: &str = "conversation.title";

/// Title used until a better one is generated.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Text generation and classification.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce free text for a rendered prompt.
    async fn generate(&self, prompt: &BuiltPrompt) -> AppResult<String>;

    /// Decide whether `passage` is related to `question`.
    async fn classify(&self, passage: &str, question: &str) -> AppResult<bool>;
}

/// Render a prompt from the library with the given variables.
pub fn render(
    prompts: &PromptLibrary,
    prompt_id: &str,
    variables: &[(&str, Value)],
) -> AppResult<BuiltPrompt> {
    let definition = prompts.get(prompt_id)?;
    let variables: HashMap<String, Value> = variables
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    build_prompt(definition, &variables)
}

#[derive(Debug, Deserialize)]
struct Grade {
    related: bool,
}

/// Parse a `{"related": bool}` verdict, tolerating text around the object.
pub fn parse_grade(raw: &str) -> AppResult<bool> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let object = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(AppError::Llm(format!(
                "Grader returned no JSON object: {}",
                raw.trim()
            )))
        }
    };

    let grade: Grade = serde_json::from_str(object)
        .map_err(|e| AppError::Llm(format!("Unparseable grade '{}': {}", object, e)))?;
    Ok(grade.related)
}

/// `Generator` backed by an LLM provider.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptLibrary>,
    temperature: f32,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            client,
            model: model.into(),
            prompts,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request(&self, prompt: &BuiltPrompt) -> LlmRequest {
        let mut request =
            LlmRequest::new(prompt.user.clone(), self.model.clone()).with_temperature(self.temperature);
        if let Some(ref system) = prompt.system {
            request = request.with_system(system.clone());
        }
        if prompt.metadata.json_output {
            request = request.with_json_output();
        }
        request
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, prompt: &BuiltPrompt) -> AppResult<String> {
        tracing::debug!(
            prompt = %prompt.metadata.source_prompt_id,
            provider = self.client.provider_name(),
            "Generating"
        );
        let response = self.client.complete(&self.request(prompt)).await?;
        Ok(response.content)
    }

    async fn classify(&self, passage: &str, question: &str) -> AppResult<bool> {
        let prompt = render(
            &self.prompts,
            GRADE_PROMPT,
            &[("passage", json!(passage)), ("question", json!(question))],
        )?;
        let response = self.client.complete(&self.request(&prompt)).await?;
        parse_grade(&response.content)
    }
}

/// Ask for a short conversation title, falling back to [`DEFAULT_TITLE`].
pub async fn suggest_title(
    generator: &dyn Generator,
    prompts: &PromptLibrary,
    question: &str,
) -> String {
    let prompt = match render(prompts, TITLE_PROMPT, &[("question", json!(question))]) {
        Ok(prompt) => prompt,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to render title prompt");
            return DEFAULT_TITLE.to_string();
        }
    };

    match generator.generate(&prompt).await {
        Ok(raw) => {
            let title = raw
                .lines()
                .find(|line| !line.trim().is_empty())
                .unwrap_or_default()
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim();
            if title.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title.to_string()
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to generate conversation title");
            DEFAULT_TITLE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use researchx_llm::{LlmResponse, LlmUsage};
    use std::sync::Mutex;

    struct CannedClient {
        reply: String,
        seen: Mutex<Vec<LlmRequest>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        fn provider_name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl Generator for Failing {
        async fn generate(&self, _prompt: &BuiltPrompt) -> AppResult<String> {
            Err(AppError::Llm("offline".to_string()))
        }

        async fn classify(&self, _passage: &str, _question: &str) -> AppResult<bool> {
            Err(AppError::Llm("offline".to_string()))
        }
    }

    #[test]
    fn test_parse_grade() {
        assert!(parse_grade(r#"{"related": true}"#).unwrap());
        assert!(!parse_grade("Sure! {\"related\": false} hope that helps").unwrap());
        assert!(parse_grade("yes").is_err());
        assert!(parse_grade(r#"{"relevant": "maybe"}"#).is_err());
    }

    #[tokio::test]
    async fn test_classify_requests_json_output() {
        let client = Arc::new(CannedClient::new(r#"{"related": true}"#));
        let prompts = Arc::new(PromptLibrary::builtin().unwrap());
        let generator = LlmGenerator::new(client.clone(), "llama3.2", prompts);

        let related = generator
            .classify("Rust has ownership.", "How does Rust manage memory?")
            .await
            .unwrap();
        assert!(related);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].format, researchx_llm::ResponseFormat::Json);
        assert!(seen[0].prompt.contains("Rust has ownership."));
        assert!(seen[0].system.is_some());
    }

    #[tokio::test]
    async fn test_suggest_title_strips_quotes() {
        let client = Arc::new(CannedClient::new("\"Rust Memory Model\"\n"));
        let prompts = Arc::new(PromptLibrary::builtin().unwrap());
        let generator = LlmGenerator::new(client, "llama3.2", prompts.clone());

        let title = suggest_title(&generator, &prompts, "How does Rust manage memory?").await;
        assert_eq!(title, "Rust Memory Model");
    }

    #[tokio::test]
    async fn test_suggest_title_falls_back() {
        let prompts = PromptLibrary::builtin().unwrap();
        let title = suggest_title(&Failing, &prompts, "anything").await;
        assert_eq!(title, DEFAULT_TITLE);
    }
}
