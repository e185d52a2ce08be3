//! Relevance Judge.

use crate::generator::Generator;
use std::sync::Arc;

pub struct RelevanceJudge {
    generator: Arc<dyn Generator>,
}

impl RelevanceJudge {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Classify one passage. A failed classification counts as irrelevant.
    pub async fn judge(&self, passage: &str, question: &str) -> bool {
        match self.generator.classify(passage, question).await {
            Ok(related) => related,
            Err(e) => {
                tracing::warn!(error = %e, "Relevance check failed, treating passage as irrelevant");
                false
            }
        }
    }

    /// Judge every passage independently and keep the relevant ones in order.
    pub async fn filter(&self, passages: &[String], question: &str) -> Vec<String> {
        let mut relevant = Vec::new();
        for passage in passages {
            if self.judge(passage, question).await {
                relevant.push(passage.clone());
            }
        }

        tracing::debug!(
            graded = passages.len(),
            relevant = relevant.len(),
            "Graded passages"
        );
        relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use researchx_core::{AppError, AppResult};
    use researchx_prompt::BuiltPrompt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Relevant when the passage mentions "rust"; errors on "boom".
    struct KeywordGrader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for KeywordGrader {
        async fn generate(&self, _prompt: &BuiltPrompt) -> AppResult<String> {
            Ok(String::new())
        }

        async fn classify(&self, passage: &str, _question: &str) -> AppResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if passage.contains("boom") {
                return Err(AppError::Llm("grader crashed".to_string()));
            }
            Ok(passage.contains("rust"))
        }
    }

    #[tokio::test]
    async fn test_filter_keeps_order_and_survives_failures() {
        let grader = Arc::new(KeywordGrader {
            calls: AtomicUsize::new(0),
        });
        let judge = RelevanceJudge::new(grader.clone());

        let passages = vec![
            "rust ownership".to_string(),
            "boom rust".to_string(),
            "python gil".to_string(),
            "rust lifetimes".to_string(),
        ];
        let relevant = judge.filter(&passages, "rust memory").await;

        assert_eq!(relevant, vec!["rust ownership", "rust lifetimes"]);
        assert_eq!(grader.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let judge = RelevanceJudge::new(Arc::new(KeywordGrader {
            calls: AtomicUsize::new(0),
        }));
        assert!(judge.filter(&[], "q").await.is_empty());
    }
}
