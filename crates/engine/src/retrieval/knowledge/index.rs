//! SQLite-backed chunk index for the local knowledge base.

use super::embedder::cosine_similarity;
use researchx_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;

/// A stored chunk together with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub document: String,
    pub position: u32,
    pub text: String,
    pub score: f32,
}

/// Open (and create if needed) the index database.
pub fn open_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path).map_err(|e| {
        AppError::Retrieval(format!(
            "Failed to open knowledge index {}: {}",
            db_path.display(),
            e
        ))
    })?;
    init_schema(&conn)?;

    tracing::debug!(path = %db_path.display(), "Opened knowledge index");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            content_type TEXT NOT NULL,
            learned_at TEXT NOT NULL,
            size_bytes INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
        "#,
    )?;
    Ok(())
}

/// Register a document, replacing any earlier ingestion of the same path.
pub fn insert_document(
    conn: &Connection,
    id: &str,
    path: &str,
    content_type: &str,
    learned_at: &str,
    size_bytes: u64,
) -> AppResult<()> {
    conn.execute(
        "DELETE FROM chunks WHERE document_id IN (SELECT id FROM documents WHERE path = ?1)",
        params![path],
    )?;
    conn.execute("DELETE FROM documents WHERE path = ?1", params![path])?;
    conn.execute(
        "INSERT INTO documents (id, path, content_type, learned_at, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, path, content_type, learned_at, size_bytes as i64],
    )?;
    Ok(())
}

pub fn insert_chunk(
    conn: &Connection,
    document_id: &str,
    position: u32,
    text: &str,
    embedding: &[f32],
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO chunks (document_id, position, text, embedding) VALUES (?1, ?2, ?3, ?4)",
        params![document_id, position as i64, text, embedding_to_bytes(embedding)],
    )?;
    Ok(())
}

/// Score every chunk against `query` and return the best `top_k`.
pub fn query_chunks(conn: &Connection, query: &[f32], top_k: usize) -> AppResult<Vec<ScoredChunk>> {
    let mut stmt = conn.prepare(
        "SELECT d.path, c.position, c.text, c.embedding
         FROM chunks c JOIN documents d ON d.id = c.document_id
         ORDER BY c.id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Vec<u8>>(3)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (document, position, text, bytes) = row?;
        let embedding = bytes_to_embedding(&bytes)?;
        results.push(ScoredChunk {
            document,
            position: position as u32,
            text,
            score: cosine_similarity(query, &embedding),
        });
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    Ok(results)
}

/// `(documents, chunks)` currently indexed.
pub fn stats(conn: &Connection) -> AppResult<(u32, u32)> {
    let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
    let chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
    Ok((documents as u32, chunks as u32))
}

pub fn reset(conn: &Connection) -> AppResult<()> {
    conn.execute_batch("DELETE FROM chunks; DELETE FROM documents;")?;
    tracing::info!("Reset knowledge index");
    Ok(())
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Retrieval(
            "Corrupt embedding in knowledge index".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
