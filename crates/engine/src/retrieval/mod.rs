//! Retrieval adapters.
//!
//! Every backend implements the same [`Retriever`] contract: a query string
//! in, raw (ungraded) passages out, in the backend's own relevance order.

pub mod academic;
pub mod knowledge;
pub mod web;

pub use academic::AcademicSearch;
pub use knowledge::{KnowledgeBaseSearch, LearnStats};
pub use web::WebSearch;

use crate::source::SourceId;
use async_trait::async_trait;
use researchx_core::config::SourcesConfig;
use researchx_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Uniform search contract shared by all sources.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The source this adapter serves.
    fn source(&self) -> SourceId;

    /// Run `query` against the backend.
    async fn search(&self, query: &str) -> AppResult<Vec<String>>;
}

/// Exactly one adapter per source.
#[derive(Clone)]
pub struct RetrieverSet {
    web: Arc<dyn Retriever>,
    academic: Arc<dyn Retriever>,
    knowledge: Arc<dyn Retriever>,
}

impl RetrieverSet {
    pub fn new(
        web: Arc<dyn Retriever>,
        academic: Arc<dyn Retriever>,
        knowledge: Arc<dyn Retriever>,
    ) -> AppResult<Self> {
        for (slot, expected) in [
            (&web, SourceId::GeneralWeb),
            (&academic, SourceId::AcademicIndex),
            (&knowledge, SourceId::LocalKnowledgeBase),
        ] {
            if slot.source() != expected {
                return Err(AppError::Config(format!(
                    "Retriever for {} registered in the {} slot",
                    slot.source(),
                    expected
                )));
            }
        }

        Ok(Self {
            web,
            academic,
            knowledge,
        })
    }

    /// Build the production adapters from configuration.
    pub fn from_config(sources: &SourcesConfig, knowledge_path: &Path) -> AppResult<Self> {
        let web = WebSearch::from_config(&sources.web)?;
        let academic = AcademicSearch::from_config(&sources.academic)?;
        let knowledge = KnowledgeBaseSearch::open(knowledge_path, &sources.knowledge)?;
        Self::new(Arc::new(web), Arc::new(academic), Arc::new(knowledge))
    }

    pub fn get(&self, source: SourceId) -> &Arc<dyn Retriever> {
        match source {
            SourceId::GeneralWeb => &self.web,
            SourceId::AcademicIndex => &self.academic,
            SourceId::LocalKnowledgeBase => &self.knowledge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SourceId);

    #[async_trait]
    impl Retriever for Fixed {
        fn source(&self) -> SourceId {
            self.0
        }

        async fn search(&self, query: &str) -> AppResult<Vec<String>> {
            Ok(vec![format!("{}:{}", self.0, query)])
        }
    }

    #[tokio::test]
    async fn test_set_routes_by_source() {
        let set = RetrieverSet::new(
            Arc::new(Fixed(SourceId::GeneralWeb)),
            Arc::new(Fixed(SourceId::AcademicIndex)),
            Arc::new(Fixed(SourceId::LocalKnowledgeBase)),
        )
        .unwrap();

        for id in SourceId::ALL {
            let results = set.get(id).search("q").await.unwrap();
            assert_eq!(results, vec![format!("{}:q", id)]);
        }
    }

    #[test]
    fn test_set_rejects_misplaced_adapter() {
        let result = RetrieverSet::new(
            Arc::new(Fixed(SourceId::AcademicIndex)),
            Arc::new(Fixed(SourceId::AcademicIndex)),
            Arc::new(Fixed(SourceId::LocalKnowledgeBase)),
        );
        assert!(result.is_err());
    }
}
