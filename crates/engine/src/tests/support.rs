//! Scripted collaborators for driving whole turns in tests.

use crate::config::EngineConfig;
use crate::engine::ResearchEngine;
use crate::error::EngineResult;
use crate::executor::{ExecutorEvent, TurnStream};
use crate::generator::{Generator, REFINE_PROMPT, SYNTHESIZE_PROMPT};
use crate::retrieval::{Retriever, RetrieverSet};
use crate::source::SourceId;
use crate::store::{
    Checkpoint, CheckpointDraft, CheckpointStore, ConversationStore, ConversationSummary,
    MemoryStore,
};
use crate::synthesizer::EVIDENCE_SEPARATOR;
use async_trait::async_trait;
use futures::StreamExt;
use researchx_core::{AppError, AppResult};
use researchx_prompt::{BuiltPrompt, PromptLibrary};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Passages the scripted judge accepts start with this marker.
pub const RELEVANT: &str = "good:";

/// Passages containing this make the scripted judge fail.
pub const JUDGE_ERROR: &str = "judge-error";

/// Retriever answering from a query -> passages table (empty by default).
pub struct ScriptedRetriever {
    source: SourceId,
    responses: Mutex<HashMap<String, Vec<String>>>,
    fail: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRetriever {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            responses: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, query: &str, passages: &[&str]) {
        self.responses.lock().unwrap().insert(
            query.to_string(),
            passages.iter().map(|p| p.to_string()).collect(),
        );
    }

    pub fn fail_always(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    fn source(&self) -> SourceId {
        self.source
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        self.calls.lock().unwrap().push(query.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Retrieval(format!("{} is unreachable", self.source)));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }
}

/// Generator whose output is a pure function of the prompt.
///
/// - refine: `"<source label> refined <n>"`, `n` = previously tried queries listed
/// - synthesize: `"answer from <k> passages"`
/// - classify: relevant iff the passage starts with [`RELEVANT`]
#[derive(Default)]
pub struct ScriptedGenerator {
    pub fail_refine: AtomicBool,
    pub fail_synthesize: AtomicBool,
    pub refine_calls: AtomicUsize,
    pub synthesize_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    /// Question each passage was judged against.
    pub graded_against: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn refined_query(source: SourceId, previous: usize) -> String {
        format!("{} refined {}", source.label(), previous)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &BuiltPrompt) -> AppResult<String> {
        match prompt.metadata.source_prompt_id.as_str() {
            REFINE_PROMPT => {
                self.refine_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_refine.load(Ordering::SeqCst) {
                    return Err(AppError::Llm("refiner offline".to_string()));
                }
                let label = prompt
                    .user
                    .lines()
                    .find_map(|line| line.strip_prefix("Target source: "))
                    .unwrap_or("unknown")
                    .trim();
                let previous = prompt
                    .user
                    .lines()
                    .filter(|line| line.trim_start().starts_with("- "))
                    .count();
                Ok(format!("{} refined {}", label, previous))
            }
            SYNTHESIZE_PROMPT => {
                self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_synthesize.load(Ordering::SeqCst) {
                    return Err(AppError::Llm("synthesizer offline".to_string()));
                }
                let passages = prompt.user.matches(EVIDENCE_SEPARATOR).count() + 1;
                Ok(format!("answer from {} passages", passages))
            }
            _ => Ok("Scripted Title".to_string()),
        }
    }

    async fn classify(&self, passage: &str, question: &str) -> AppResult<bool> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.graded_against.lock().unwrap().push(question.to_string());
        if passage.contains(JUDGE_ERROR) {
            return Err(AppError::Llm("judge crashed".to_string()));
        }
        Ok(passage.starts_with(RELEVANT))
    }
}

/// Memory store whose checkpoint reads and writes can be switched off.
///
/// Conversation bookkeeping always succeeds.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("read io".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("disk full".to_string()));
        }
        Ok(())
    }
}

impl CheckpointStore for FaultyStore {
    fn save(&self, conversation_id: &str, draft: CheckpointDraft) -> AppResult<Checkpoint> {
        self.check_write()?;
        self.inner.save(conversation_id, draft)
    }

    fn load(&self, conversation_id: &str) -> AppResult<Option<Checkpoint>> {
        self.check_read()?;
        self.inner.load(conversation_id)
    }

    fn history(&self, conversation_id: &str) -> AppResult<Vec<Checkpoint>> {
        self.check_read()?;
        self.inner.history(conversation_id)
    }

    fn get(&self, conversation_id: &str, seq: u64) -> AppResult<Option<Checkpoint>> {
        self.check_read()?;
        CheckpointStore::get(&self.inner, conversation_id, seq)
    }

    fn delete(&self, conversation_id: &str) -> AppResult<()> {
        self.check_write()?;
        CheckpointStore::delete(&self.inner, conversation_id)
    }
}

impl ConversationStore for FaultyStore {
    fn create(&self) -> AppResult<ConversationSummary> {
        self.inner.create()
    }

    fn list(&self) -> AppResult<Vec<ConversationSummary>> {
        self.inner.list()
    }

    fn get(&self, id: &str) -> AppResult<Option<ConversationSummary>> {
        ConversationStore::get(&self.inner, id)
    }

    fn rename(&self, id: &str, name: &str) -> AppResult<()> {
        self.inner.rename(id, name)
    }

    fn touch(&self, id: &str) -> AppResult<()> {
        self.inner.touch(id)
    }

    fn delete(&self, id: &str) -> AppResult<bool> {
        ConversationStore::delete(&self.inner, id)
    }
}

/// An engine wired to scripted collaborators.
pub struct Harness<S> {
    pub engine: ResearchEngine,
    pub web: Arc<ScriptedRetriever>,
    pub academic: Arc<ScriptedRetriever>,
    pub knowledge: Arc<ScriptedRetriever>,
    pub generator: Arc<ScriptedGenerator>,
    _store: PhantomData<S>,
}

impl Harness<MemoryStore> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }
}

impl<S> Harness<S>
where
    S: CheckpointStore + ConversationStore + 'static,
{
    pub fn with_store(config: EngineConfig, store: Arc<S>) -> Self {
        let web = Arc::new(ScriptedRetriever::new(SourceId::GeneralWeb));
        let academic = Arc::new(ScriptedRetriever::new(SourceId::AcademicIndex));
        let knowledge = Arc::new(ScriptedRetriever::new(SourceId::LocalKnowledgeBase));
        let generator = Arc::new(ScriptedGenerator::default());

        let retrievers = RetrieverSet::new(web.clone(), academic.clone(), knowledge.clone()).unwrap();
        let engine = ResearchEngine::new(
            config,
            generator.clone(),
            Arc::new(PromptLibrary::builtin().unwrap()),
            retrievers,
            store.clone(),
            store.clone(),
        )
        .unwrap();

        Self {
            engine,
            web,
            academic,
            knowledge,
            generator,
            _store: PhantomData,
        }
    }

    /// Create a conversation and run one question to completion.
    pub async fn ask(&self, question: &str) -> (String, Vec<ExecutorEvent>) {
        let conversation = self.engine.create_conversation().unwrap();
        let events = self.ask_in(&conversation.id, question).await;
        (conversation.id, events)
    }

    pub async fn ask_in(&self, conversation_id: &str, question: &str) -> Vec<ExecutorEvent> {
        let stream = self.engine.submit(conversation_id, question).unwrap();
        collect_ok(stream).await
    }
}

/// Drain a stream, keeping errors.
pub async fn drain(stream: TurnStream) -> Vec<EngineResult<ExecutorEvent>> {
    stream.collect().await
}

/// Drain a stream that must not fail.
pub async fn collect_ok(stream: TurnStream) -> Vec<ExecutorEvent> {
    drain(stream)
        .await
        .into_iter()
        .map(|item| item.unwrap())
        .collect()
}

pub fn config(max_refinements: u32) -> EngineConfig {
    EngineConfig {
        max_refinements,
        ..EngineConfig::default()
    }
}
