//! Academic paper search through the arXiv Atom API.

use crate::retrieval::Retriever;
use crate::source::SourceId;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use researchx_core::config::AcademicSourceConfig;
use researchx_core::{AppError, AppResult};

pub struct AcademicSearch {
    endpoint: String,
    max_results: u32,
    client: reqwest::Client,
}

impl AcademicSearch {
    pub fn new(endpoint: impl Into<String>, max_results: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_results,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AcademicSourceConfig) -> AppResult<Self> {
        Ok(Self::new(&config.endpoint, config.max_results))
    }
}

/// Extract entry summaries from an Atom feed, whitespace collapsed.
pub fn parse_feed(xml: &str) -> AppResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut summaries = Vec::new();
    let mut in_entry = false;
    let mut in_summary = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => match tag.local_name().as_ref() {
                b"entry" => in_entry = true,
                b"summary" if in_entry => {
                    in_summary = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(text)) if in_summary => {
                let text = text
                    .unescape()
                    .map_err(|e| AppError::Retrieval(format!("Malformed arXiv summary: {}", e)))?;
                current.push_str(&text);
                current.push(' ');
            }
            Ok(Event::CData(data)) if in_summary => {
                current.push_str(&String::from_utf8_lossy(&data));
                current.push(' ');
            }
            Ok(Event::End(tag)) => match tag.local_name().as_ref() {
                b"summary" if in_summary => {
                    in_summary = false;
                    let summary = current.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !summary.is_empty() {
                        summaries.push(summary);
                    }
                }
                b"entry" => in_entry = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::Retrieval(format!(
                    "Failed to parse arXiv feed at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(summaries)
}

#[async_trait]
impl Retriever for AcademicSearch {
    fn source(&self) -> SourceId {
        SourceId::AcademicIndex
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        let search_query = format!("all:{}", query);
        let max_results = self.max_results.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to reach arXiv: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Retrieval(format!(
                "arXiv API error ({})",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to read arXiv response: {}", e)))?;

        let mut results = parse_feed(&body)?;
        results.truncate(self.max_results as usize);
        tracing::debug!(query, results = results.len(), "arXiv search finished");
        Ok(results)
    }
}
