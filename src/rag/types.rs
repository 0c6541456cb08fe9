//! Data carried through ingestion and query time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A scraped source page, as handed over by the acquisition side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source URL of the document the chunk came from.
    pub source: String,
    pub title: Option<String>,
    /// Position of the chunk in its document's chunk sequence.
    pub sequence_index: usize,
    pub created_at: DateTime<Utc>,
}

/// A bounded-size retrievable slice of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{url}#{sequence_index}`; stable across re-ingestion.
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn chunk_id(url: &str, sequence_index: usize) -> String {
        format!("{}#{}", url, sequence_index)
    }
}

/// A chunk paired with its vector, on its way to the index.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn into_entry(self, embedding_fingerprint: &str) -> IndexEntry {
        let content_hash = content_hash(&self.chunk.text);
        let Chunk { id, text, metadata } = self.chunk;
        IndexEntry {
            id,
            vector: self.vector,
            metadata: EntryMetadata {
                text,
                source: metadata.source,
                title: metadata.title,
                sequence_index: metadata.sequence_index,
                created_at: metadata.created_at,
                content_hash,
                embedding_fingerprint: embedding_fingerprint.to_string(),
            },
        }
    }
}

/// Metadata persisted next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub sequence_index: usize,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub embedding_fingerprint: String,
}

impl EntryMetadata {
    /// Reads metadata written by this crate or by older ingestion runs,
    /// which stored the passage under `chunk` or `raw` and used `timestamp`.
    pub fn from_value(value: &Value) -> Self {
        let str_field = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
        };

        let text = str_field(&["text", "chunk", "raw"]).unwrap_or_default();
        let created_at = str_field(&["created_at", "timestamp"])
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default();
        let sequence_index = value
            .get("sequence_index")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        Self {
            content_hash: str_field(&["content_hash"]).unwrap_or_else(|| content_hash(&text)),
            text,
            source: str_field(&["source"]).unwrap_or_else(|| "Unknown".to_string()),
            title: str_field(&["title"]).filter(|t| !t.is_empty()),
            sequence_index,
            created_at,
            embedding_fingerprint: str_field(&["embedding_fingerprint"]).unwrap_or_default(),
        }
    }
}

/// The persisted form inside the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// One nearest-neighbour hit. `score` is provider-defined; higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: EntryMetadata,
}

/// A passage that cleared the relevance threshold for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// What the HTTP layer hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub query: String,
    pub answer: String,
    pub sources: Vec<String>,
}

/// Hex SHA-256 of a chunk's text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
