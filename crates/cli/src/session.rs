//! Wiring from `AppConfig` to a ready research engine.

use researchx_core::{config::AppConfig, AppResult};
use researchx_engine::{EngineConfig, Generator, LlmGenerator, ResearchEngine, RetrieverSet, SqliteStore};
use researchx_llm::create_client;
use researchx_prompt::PromptLibrary;
use std::sync::Arc;

pub struct Session {
    pub engine: ResearchEngine,
    pub generator: Arc<dyn Generator>,
    pub prompts: Arc<PromptLibrary>,
}

impl Session {
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let provider_config = config.get_provider_config(&config.provider);
        let api_key = config.resolve_api_key(&config.provider);
        let client = create_client(
            &config.provider,
            provider_config.and_then(|pc| pc.endpoint()),
            api_key.as_deref(),
            provider_config.and_then(|pc| pc.timeout()),
        )?;

        let prompts = Arc::new(PromptLibrary::load(&config.workspace)?);
        let generator: Arc<dyn Generator> =
            Arc::new(LlmGenerator::new(client, config.model.clone(), prompts.clone()));

        let retrievers = RetrieverSet::from_config(&config.sources, &config.knowledge_path())?;
        let store = Arc::new(open_store(config)?);
        let engine = ResearchEngine::new(
            EngineConfig::from_research(&config.research)?,
            generator.clone(),
            prompts.clone(),
            retrievers,
            store.clone(),
            store,
        )?;

        tracing::debug!(database = %config.database_path().display(), "Research session ready");
        Ok(Self {
            engine,
            generator,
            prompts,
        })
    }
}

/// The conversation database alone, for commands that never run a turn.
pub fn open_store(config: &AppConfig) -> AppResult<SqliteStore> {
    SqliteStore::open(&config.database_path())
}
