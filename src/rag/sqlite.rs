//! SQLite-backed vector index.
//!
//! In-process index using SQLite for entries and brute-force cosine
//! similarity for search. Meant for local runs and tests; production
//! deployments point at Pinecone.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::VectorIndex;
use super::types::{EntryMetadata, IndexEntry, IndexMatch};
use crate::core::errors::RagError;

const FINGERPRINT_KEY: &str = "embedding_fingerprint";

pub struct SqliteIndex {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteIndex {
    pub async fn with_path(db_path: impl AsRef<Path>) -> Result<Self, RagError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::provider)?;

        let index = Self { pool, db_path };
        index.init_schema().await?;
        Ok(index)
    }

    fn space_mismatch(&self, stored: &str, configured: &str) -> RagError {
        RagError::Provider(format!(
            "index {} was built with embeddings from {}, but {} is configured; \
             re-ingest into a fresh index",
            self.db_path.display(),
            stored,
            configured
        ))
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_entries (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                title TEXT,
                sequence_index INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                content_hash TEXT NOT NULL DEFAULT '',
                fingerprint TEXT NOT NULL DEFAULT '',
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::provider)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON index_entries(source)")
            .execute(&self.pool)
            .await
            .map_err(RagError::provider)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::provider)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_metadata(row: &sqlx::sqlite::SqliteRow) -> EntryMetadata {
        let created_at: String = row.get("created_at");
        let sequence_index: i64 = row.get("sequence_index");

        EntryMetadata {
            text: row.get("text"),
            source: row.get("source"),
            title: row.get("title"),
            sequence_index: sequence_index.max(0) as usize,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            content_hash: row.get("content_hash"),
            embedding_fingerprint: row.get("fingerprint"),
        }
    }

    async fn stored_fingerprint(&self) -> Result<Option<String>, RagError> {
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?1")
            .bind(FINGERPRINT_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(RagError::provider)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), RagError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RagError::provider)?;

        for entry in &entries {
            let blob = Self::serialize_embedding(&entry.vector);
            let meta = &entry.metadata;

            sqlx::query(
                "INSERT OR REPLACE INTO index_entries
                    (id, text, source, title, sequence_index, created_at, content_hash, fingerprint, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(&entry.id)
            .bind(&meta.text)
            .bind(&meta.source)
            .bind(&meta.title)
            .bind(meta.sequence_index as i64)
            .bind(meta.created_at.to_rfc3339())
            .bind(&meta.content_hash)
            .bind(&meta.embedding_fingerprint)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(RagError::provider)?;
        }

        tx.commit().await.map_err(RagError::provider)?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>, RagError> {
        let rows = sqlx::query(
            "SELECT id, text, source, title, sequence_index, created_at, content_hash, fingerprint, embedding
             FROM index_entries",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::provider)?;

        let mut scored: Vec<IndexMatch> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);

                Some(IndexMatch {
                    id: row.get("id"),
                    score: Self::cosine_similarity(vector, &stored),
                    metadata: Self::row_to_metadata(row),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn count(&self) -> Result<Option<usize>, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::provider)?;

        Ok(Some(count as usize))
    }

    async fn check_embedding_space(&self, fingerprint: &str) -> Result<(), RagError> {
        match self.stored_fingerprint().await? {
            Some(stored) if stored != fingerprint => Err(self.space_mismatch(&stored, fingerprint)),
            _ => Ok(()),
        }
    }

    async fn ensure_embedding_space(&self, fingerprint: &str) -> Result<(), RagError> {
        match self.stored_fingerprint().await? {
            Some(stored) if stored == fingerprint => Ok(()),
            Some(stored) => Err(self.space_mismatch(&stored, fingerprint)),
            None => {
                sqlx::query(
                    "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
                     VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                )
                .bind(FINGERPRINT_KEY)
                .bind(fingerprint)
                .execute(&self.pool)
                .await
                .map_err(RagError::provider)?;
                Ok(())
            }
        }
    }
}
