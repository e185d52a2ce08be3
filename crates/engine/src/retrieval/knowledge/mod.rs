//! Local knowledge base: similarity search over ingested documents.

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod parser;

use crate::retrieval::Retriever;
use crate::source::SourceId;
use async_trait::async_trait;
use chrono::Utc;
use embedder::TrigramEmbedder;
use researchx_core::config::KnowledgeSourceConfig;
use researchx_core::{AppError, AppResult};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use walkdir::WalkDir;

/// Result of an ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LearnStats {
    pub documents: u32,
    pub chunks: u32,
    pub skipped: u32,
    pub bytes_processed: u64,
    pub duration_secs: f64,
}

/// Totals of what is currently indexed.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub path: PathBuf,
    pub documents: u32,
    pub chunks: u32,
}

pub struct KnowledgeBaseSearch {
    path: PathBuf,
    conn: Mutex<Connection>,
    embedder: TrigramEmbedder,
    top_k: usize,
    min_score: f32,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl KnowledgeBaseSearch {
    pub fn open(path: &Path, config: &KnowledgeSourceConfig) -> AppResult<Self> {
        let conn = index::open_index(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            embedder: TrigramEmbedder::default(),
            top_k: config.top_k as usize,
            min_score: config.min_score,
            chunk_size: config.chunk_size as usize,
            chunk_overlap: config.chunk_overlap as usize,
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Retrieval("Knowledge index lock poisoned".to_string()))
    }

    /// Ingest files and directories into the index.
    ///
    /// Unreadable and binary files are skipped and counted.
    pub fn learn(&self, paths: &[PathBuf], reset: bool) -> AppResult<LearnStats> {
        let start = Instant::now();
        let conn = self.conn()?;

        if reset {
            index::reset(&conn)?;
        }

        let mut stats = LearnStats::default();
        for root in paths {
            if !root.exists() {
                return Err(AppError::Retrieval(format!(
                    "Path does not exist: {}",
                    root.display()
                )));
            }

            for entry in WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !is_hidden(e.path(), root))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                match self.ingest_file(&conn, entry.path()) {
                    Ok((chunks, bytes)) => {
                        stats.documents += 1;
                        stats.chunks += chunks;
                        stats.bytes_processed += bytes;
                    }
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "Skipping file");
                        stats.skipped += 1;
                    }
                }
            }
        }

        stats.duration_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            documents = stats.documents,
            chunks = stats.chunks,
            skipped = stats.skipped,
            "Knowledge base updated in {:.2}s",
            stats.duration_secs
        );
        Ok(stats)
    }

    fn ingest_file(&self, conn: &Connection, path: &Path) -> AppResult<(u32, u64)> {
        let text = parser::parse_file(path)?;
        if text.is_empty() {
            return Err(AppError::Retrieval("No text content".to_string()));
        }

        let document_id = uuid::Uuid::new_v4().to_string();
        let path_str = path.to_string_lossy();
        let size_bytes = text.len() as u64;

        let tx = conn.unchecked_transaction()?;
        index::insert_document(
            &tx,
            &document_id,
            &path_str,
            parser::ContentType::from_path(path).as_str(),
            &Utc::now().to_rfc3339(),
            size_bytes,
        )?;

        let chunks = chunker::chunk_text(&text, self.chunk_size, self.chunk_overlap);
        for chunk in &chunks {
            let embedding = self.embedder.embed(&chunk.text);
            index::insert_chunk(&tx, &document_id, chunk.position, &chunk.text, &embedding)?;
        }
        tx.commit()?;

        tracing::debug!(path = %path.display(), chunks = chunks.len(), "Ingested document");
        Ok((chunks.len() as u32, size_bytes))
    }

    pub fn stats(&self) -> AppResult<IndexStats> {
        let (documents, chunks) = index::stats(&*self.conn()?)?;
        Ok(IndexStats {
            path: self.path.clone(),
            documents,
            chunks,
        })
    }
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path != root
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

#[async_trait]
impl Retriever for KnowledgeBaseSearch {
    fn source(&self) -> SourceId {
        SourceId::LocalKnowledgeBase
    }

    async fn search(&self, query: &str) -> AppResult<Vec<String>> {
        let embedding = self.embedder.embed(query);
        let scored = index::query_chunks(&*self.conn()?, &embedding, self.top_k)?;

        let results: Vec<String> = scored
            .into_iter()
            .filter(|chunk| chunk.score >= self.min_score)
            .map(|chunk| chunk.text)
            .collect();

        tracing::debug!(query, results = results.len(), min_score = self.min_score, "Knowledge base search finished");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> KnowledgeBaseSearch {
        let config = KnowledgeSourceConfig {
            min_score: 0.3,
            ..KnowledgeSourceConfig::default()
        };
        KnowledgeBaseSearch::open(&dir.path().join("kb/default.sqlite"), &config).unwrap()
    }

    #[tokio::test]
    async fn test_learn_and_search() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(docs.join(".git")).unwrap();
        fs::write(
            docs.join("borrow.md"),
            "# Borrowing\n\nThe borrow checker enforces ownership rules for references.",
        )
        .unwrap();
        fs::write(docs.join("bread.txt"), "Sourdough bread needs a long fermentation.").unwrap();
        fs::write(docs.join(".git/config"), "hidden ownership borrow checker").unwrap();
        fs::write(docs.join("blob.bin"), b"\0\0\0").unwrap();

        let kb = open(&dir);
        let stats = kb.learn(&[docs], false).unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.skipped, 1);

        let results = kb.search("borrow checker ownership").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("borrow checker"));

        assert!(kb.search("quantum chromodynamics").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_index() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "Tokio runtimes schedule asynchronous tasks.").unwrap();

        let kb = open(&dir);
        kb.learn(&[file.clone()], false).unwrap();
        kb.learn(&[file.clone()], false).unwrap();
        assert_eq!(kb.stats().unwrap().documents, 1);

        let stats = kb.learn(&[], true).unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(kb.stats().unwrap().chunks, 0);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let kb = open(&dir);
        assert!(kb.learn(&[dir.path().join("nope")], false).is_err());
    }
}
