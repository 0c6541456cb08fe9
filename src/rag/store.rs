//! Abstract interface for vector index backends.
//!
//! Ingestion writes through `upsert`; retrieval reads through `query`.
//! Implementations: `PineconeIndex` (remote) and `SqliteIndex` (local).

use async_trait::async_trait;

use super::types::{IndexEntry, IndexMatch};
use crate::core::errors::RagError;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Insert or overwrite entries by id.
    ///
    /// A batch is applied as a whole: on error no entry of the batch is
    /// assumed stored.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), RagError>;

    /// Nearest neighbours of `vector`, best match first, at most `top_k`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>, RagError>;

    /// Number of stored entries, when the backend can report it cheaply.
    async fn count(&self) -> Result<Option<usize>, RagError> {
        Ok(None)
    }

    /// Fails when the index was built with a different embedding space.
    /// Never writes; an index with no recorded space passes.
    async fn check_embedding_space(&self, _fingerprint: &str) -> Result<(), RagError> {
        Ok(())
    }

    /// Like `check_embedding_space`, but records `fingerprint` when the index
    /// has none yet. Only ingestion calls this.
    async fn ensure_embedding_space(&self, _fingerprint: &str) -> Result<(), RagError> {
        Ok(())
    }
}
