//! Retrieval-augmented answering over the support knowledge base.
//!
//! Ingestion: [`Chunker`] → [`EmbeddingClient`] → [`VectorIndex::upsert`],
//! driven by [`IngestionPipeline`].
//! Query: [`QueryOrchestrator`] → [`Retriever`] → [`Generator`].

pub mod chunker;
pub mod documents;
pub mod embedding;
pub mod generator;
pub mod ingest;
pub mod orchestrator;
pub mod pinecone;
pub mod retriever;
pub mod sqlite;
pub mod store;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use chunker::Chunker;
pub use documents::load_documents;
pub use embedding::EmbeddingClient;
pub use generator::{Generator, FALLBACK_ANSWER, UNAVAILABLE_ANSWER};
pub use ingest::{IngestReport, IngestionPipeline, RetryPolicy};
pub use orchestrator::QueryOrchestrator;
pub use pinecone::PineconeIndex;
pub use retriever::Retriever;
pub use sqlite::SqliteIndex;
pub use store::VectorIndex;
pub use types::{
    AnswerResult, Chunk, ChunkMetadata, EmbeddedChunk, EntryMetadata, IndexEntry, IndexMatch,
    RawDocument, RetrievedContext,
};

use crate::core::config::{IndexKind, IndexSettings};
use crate::core::errors::RagError;

/// Opens the configured vector index.
pub async fn build_index(settings: &IndexSettings) -> Result<Arc<dyn VectorIndex>, RagError> {
    let index: Arc<dyn VectorIndex> = match settings.kind {
        IndexKind::Pinecone => Arc::new(PineconeIndex::new(
            settings.api_key.as_deref().unwrap_or_default(),
            settings.host.as_deref().unwrap_or_default(),
            settings.namespace.as_deref(),
            Duration::from_secs(settings.timeout_secs),
        )?),
        IndexKind::Sqlite => {
            let path = settings
                .sqlite_path
                .as_ref()
                .ok_or_else(|| RagError::InvalidInput("index.sqlite_path is not set".into()))?;
            Arc::new(SqliteIndex::with_path(path).await?)
        }
    };
    tracing::info!("Vector index: {}", index.name());
    Ok(index)
}
