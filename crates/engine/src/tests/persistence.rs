use super::support::*;
use crate::executor::ExecutorNode;
use crate::source::SourceId;
use crate::store::{CheckpointStore, ConversationStore, SqliteStore};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const QUESTION: &str = "what is a borrow checker";

fn open(path: &Path) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open(path).unwrap())
}

fn script(harness: &Harness<SqliteStore>) {
    harness.web.respond(QUESTION, &["good: it enforces aliasing rules"]);
    harness
        .academic
        .respond(&ScriptedGenerator::refined_query(SourceId::AcademicIndex, 0), &["good: paper"]);
}

#[tokio::test]
async fn test_finished_turn_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".researchx").join("research.sqlite");

    let (id, events) = {
        let harness = Harness::with_store(config(1), open(&path));
        script(&harness);
        harness.ask(QUESTION).await
    };

    let store = open(&path);
    let history = store.history(&id).unwrap();
    assert_eq!(history.len(), events.len() + 1);
    assert_eq!(history[0].node, None);
    assert_eq!(history[0].next, ExecutorNode::Routing);

    let last = store.load(&id).unwrap().unwrap();
    assert!(last.is_terminal());
    assert_eq!(last.state, events.last().unwrap().state);
    assert_eq!(last.state.evidence, vec!["good: it enforces aliasing rules", "good: paper"]);

    let summary = ConversationStore::get(store.as_ref(), &id).unwrap().unwrap();
    assert!(summary.last_used >= summary.created_at);
}

#[tokio::test]
async fn test_interrupted_turn_resumes_in_new_process() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.sqlite");

    let expected = {
        let harness = Harness::new(config(1));
        harness.web.respond(QUESTION, &["good: it enforces aliasing rules"]);
        harness
            .academic
            .respond(&ScriptedGenerator::refined_query(SourceId::AcademicIndex, 0), &["good: paper"]);
        let (_, events) = harness.ask(QUESTION).await;
        events.last().unwrap().state.clone()
    };

    let id = {
        let harness = Harness::with_store(config(1), open(&path));
        script(&harness);
        let conversation = harness.engine.create_conversation().unwrap();
        let partial: Vec<_> = harness
            .engine
            .submit(&conversation.id, QUESTION)
            .unwrap()
            .take(5)
            .collect()
            .await;
        assert!(partial.iter().all(|item| item.is_ok()));
        conversation.id
    };

    let harness = Harness::with_store(config(1), open(&path));
    script(&harness);
    let pending = harness.engine.load(&id).unwrap().unwrap();
    assert_eq!(pending.seq, 6);
    assert!(!pending.is_terminal());

    let rest = collect_ok(harness.engine.resume(&id).unwrap()).await;
    assert_eq!(rest[0].seq, 7);
    assert_eq!(rest.last().unwrap().state, expected);

    // the web search happened before the interruption and is not repeated
    assert!(harness.web.calls().is_empty());
}

#[tokio::test]
async fn test_conversations_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.sqlite");

    let (kept, dropped) = {
        let harness = Harness::with_store(config(0), open(&path));
        let kept = harness.engine.create_conversation().unwrap();
        let dropped = harness.engine.create_conversation().unwrap();
        harness.engine.rename_conversation(&kept.id, "Borrowing").unwrap();
        harness.ask_in(&dropped.id, QUESTION).await;
        harness.engine.delete_conversation(&dropped.id).unwrap();
        (kept.id, dropped.id)
    };

    let store = open(&path);
    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept);
    assert_eq!(listed[0].name, "Borrowing");
    assert!(store.history(&dropped).unwrap().is_empty());
}
