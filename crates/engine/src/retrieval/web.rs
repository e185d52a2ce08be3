//! General web search through a Tavily-compatible API.

use crate::retrieval::Retriever;
use crate::source::SourceId;
use async_trait::async_trait;
use researchx_core::config::WebSourceConfig;
use researchx_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    content: String,
}

pub struct WebSearch {
    endpoint: String,
    api_key: Option<String>,
    max_results: u32,
    client: reqwest::Client,
}

impl WebSearch {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, max_results: u32) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            max_results,
            client: reqwest::Client::new(),
        }
    }

    /// The API key is read from the environment variable named in the config.
    /// A missing key only fails when a search is attempted.
    pub fn from_config(config: &WebSourceConfig) -> AppResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            tracing::debug!(env = %config.api_key_env, "No web search API key configured");
        }
        Ok(Self::new(&config.endpoint, api_key, config.max_results))
    }
}

fn passages(response: SearchResponse) -> Vec<String> {
    response
        .results
        .into_iter()
        .map(|result| result.content.trim().to_string())
        .filter(|content| !content.is_empty())
        .collect()
}

#[async_trait]
impl Retriever for WebSearch {
    fn source(&self) -> SourceId {
        SourceId::GeneralWeb
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Retrieval("Web search API key is not set".to_string()))?;

        let url = format!("{}/search", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&SearchRequest {
                api_key,
                query,
                max_results: self.max_results,
            })
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to reach web search: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Web search API error ({}): {}",
                status, error_text
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse web search response: {}", e)))?;

        let results = passages(body);
        tracing::debug!(query, results = results.len(), "Web search finished");
        Ok(results)
    }
}
