//! Offline ingestion: documents → chunks → embeddings → index.
//!
//! Batches run one after another. Inside a batch every chunk is embedded
//! concurrently, and the batch is upserted with a single call only once
//! all of its embeddings succeeded, so a failure never leaves half a batch
//! in the index.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use super::chunker::Chunker;
use super::embedding::EmbeddingClient;
use super::store::VectorIndex;
use super::types::{Chunk, EmbeddedChunk, IndexEntry, RawDocument};
use crate::core::errors::RagError;

/// How a failed batch is retried. The pipeline itself never retries unless
/// the caller passes a policy with `max_retries > 0`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn exponential(max_retries: usize) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(500),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.base_delay * (1 << capped)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    /// Documents that produced no chunk at all.
    pub empty_documents: usize,
    pub chunks_total: usize,
    pub chunks_stored: usize,
    pub batches: usize,
}

pub struct IngestionPipeline {
    chunker: Chunker,
    embeddings: EmbeddingClient,
    index: Arc<dyn VectorIndex>,
    max_chunk_size: usize,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl IngestionPipeline {
    pub fn new(
        chunker: Chunker,
        embeddings: EmbeddingClient,
        index: Arc<dyn VectorIndex>,
        max_chunk_size: usize,
    ) -> Self {
        Self {
            chunker,
            embeddings,
            index,
            max_chunk_size,
            limiter: None,
        }
    }

    /// Paces embedding calls to at most `requests_per_minute`.
    pub fn with_rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.limiter = requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));
        self
    }

    /// Chunks every document, preserving document order.
    pub fn prepare(&self, documents: &[RawDocument]) -> (Vec<Chunk>, usize) {
        let mut chunks = Vec::new();
        let mut empty_documents = 0;

        for document in documents {
            let produced = self.chunker.chunk(document, self.max_chunk_size);
            if produced.is_empty() {
                empty_documents += 1;
                tracing::warn!("Document {} produced no chunks", document.url);
                continue;
            }
            tracing::debug!("Document {} produced {} chunks", document.url, produced.len());
            chunks.extend(produced);
        }

        (chunks, empty_documents)
    }

    /// Stores `documents` and returns the number of chunks written.
    pub async fn ingest(
        &self,
        documents: &[RawDocument],
        batch_size: usize,
    ) -> Result<usize, RagError> {
        let report = self.run(documents, batch_size, &RetryPolicy::none()).await?;
        Ok(report.chunks_stored)
    }

    pub async fn run(
        &self,
        documents: &[RawDocument],
        batch_size: usize,
        retry: &RetryPolicy,
    ) -> Result<IngestReport, RagError> {
        if batch_size == 0 {
            return Err(RagError::InvalidInput("batch size must be at least 1".into()));
        }

        let (chunks, empty_documents) = self.prepare(documents);
        let mut report = IngestReport {
            documents: documents.len(),
            empty_documents,
            chunks_total: chunks.len(),
            ..IngestReport::default()
        };
        if chunks.is_empty() {
            return Ok(report);
        }

        self.index
            .ensure_embedding_space(self.embeddings.fingerprint())
            .await?;

        let total = chunks.len();
        for batch in chunks.chunks(batch_size) {
            let stored = self.store_batch_with_retry(batch, retry).await?;
            report.chunks_stored += stored;
            report.batches += 1;
            tracing::info!("uploaded {} of {} chunks", report.chunks_stored, total);
        }

        Ok(report)
    }

    async fn store_batch_with_retry(
        &self,
        batch: &[Chunk],
        retry: &RetryPolicy,
    ) -> Result<usize, RagError> {
        let mut attempt = 0usize;
        loop {
            match self.store_batch(batch).await {
                Ok(stored) => return Ok(stored),
                Err(RagError::Provider(msg)) if attempt < retry.max_retries => {
                    attempt += 1;
                    let delay = retry.backoff(attempt);
                    tracing::warn!(
                        "Batch starting at {} failed (attempt {}/{}), retrying in {:?}: {}",
                        batch.first().map(|c| c.id.as_str()).unwrap_or_default(),
                        attempt,
                        retry.max_retries + 1,
                        delay,
                        msg
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Embeds one batch concurrently, then upserts it in a single call.
    pub async fn store_batch(&self, batch: &[Chunk]) -> Result<usize, RagError> {
        let fingerprint = self.embeddings.fingerprint();
        let entries: Vec<IndexEntry> = try_join_all(batch.iter().map(|chunk| async move {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            let vector = self.embeddings.embed(&chunk.text).await.map_err(|err| {
                RagError::Provider(format!("embedding {} failed: {}", chunk.id, err))
            })?;
            Ok::<_, RagError>(
                EmbeddedChunk {
                    chunk: chunk.clone(),
                    vector,
                }
                .into_entry(fingerprint),
            )
        }))
        .await?;

        let count = entries.len();
        self.index.upsert(entries).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EmbeddingSettings;
    use crate::llm::EmbeddingProvider;
    use crate::rag::types::IndexMatch;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails every call whose text contains `poison`, and the first
    /// `fail_first` calls overall.
    struct ScriptedEmbedder {
        poison: Option<&'static str>,
        fail_first: usize,
        calls: AtomicUsize,
    }

    impl ScriptedEmbedder {
        fn ok() -> Self {
            Self {
                poison: None,
                fail_first: 0,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedEmbedder {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(RagError::Provider("quota exceeded".into()));
            }
            if self.poison.map(|p| text.contains(p)).unwrap_or(false) {
                return Err(RagError::Provider("bad input".into()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        upserts: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        fn name(&self) -> &str {
            "recording"
        }

        async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), RagError> {
            let ids = entries.into_iter().map(|e| e.id).collect();
            self.upserts.lock().unwrap().push(ids);
            Ok(())
        }

        async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<IndexMatch>, RagError> {
            Ok(Vec::new())
        }
    }

    fn documents(count: usize) -> Vec<RawDocument> {
        (0..count)
            .map(|i| RawDocument {
                url: format!("https://help.example/{}", i),
                title: format!("Article {}", i),
                content: format!(
                    "Article {} explains how to manage your card and account settings.",
                    i
                ),
            })
            .collect()
    }

    fn pipeline(embedder: ScriptedEmbedder, index: Arc<RecordingIndex>) -> IngestionPipeline {
        let embeddings = EmbeddingClient::new(Arc::new(embedder), &EmbeddingSettings::default());
        IngestionPipeline::new(Chunker::default(), embeddings, index, 1200)
    }

    #[tokio::test]
    async fn upserts_once_per_batch_in_order() {
        let index = Arc::new(RecordingIndex::default());
        let pipeline = pipeline(ScriptedEmbedder::ok(), index.clone());

        let stored = pipeline.ingest(&documents(25), 10).await.unwrap();

        assert_eq!(stored, 25);
        let upserts = index.upserts.lock().unwrap();
        let sizes: Vec<usize> = upserts.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(upserts[0][0], "https://help.example/0#0");
        assert_eq!(upserts[2][4], "https://help.example/24#0");
    }

    #[tokio::test]
    async fn embedding_failure_aborts_the_whole_batch() {
        let index = Arc::new(RecordingIndex::default());
        let embedder = ScriptedEmbedder {
            poison: Some("Article 13 "),
            ..ScriptedEmbedder::ok()
        };
        let pipeline = pipeline(embedder, index.clone());

        let err = pipeline.ingest(&documents(25), 10).await.unwrap_err();

        assert!(
            matches!(err, RagError::Provider(ref m) if m.contains("https://help.example/13#0"))
        );
        let upserts = index.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1, "only the first batch may be stored");
        assert_eq!(upserts[0].len(), 10);
    }

    #[tokio::test]
    async fn failed_batch_is_retried_with_backoff() {
        tokio::time::pause();
        let index = Arc::new(RecordingIndex::default());
        let embedder = ScriptedEmbedder {
            fail_first: 1,
            ..ScriptedEmbedder::ok()
        };
        let pipeline = pipeline(embedder, index.clone());

        let report = pipeline
            .run(&documents(3), 10, &RetryPolicy::exponential(2))
            .await
            .unwrap();

        assert_eq!(report.chunks_stored, 3);
        assert_eq!(report.batches, 1);
        assert_eq!(index.upserts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_retry_policy_surfaces_the_failure() {
        let index = Arc::new(RecordingIndex::default());
        let embedder = ScriptedEmbedder {
            fail_first: 1,
            ..ScriptedEmbedder::ok()
        };
        let pipeline = pipeline(embedder, index.clone());

        assert!(pipeline.ingest(&documents(3), 10).await.is_err());
        assert!(index.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn documents_without_chunks_are_reported_not_failed() {
        let index = Arc::new(RecordingIndex::default());
        let pipeline = pipeline(ScriptedEmbedder::ok(), index.clone());
        let mut docs = documents(2);
        docs.push(RawDocument {
            url: "https://help.example/empty".to_string(),
            title: String::new(),
            content: "Too short.".to_string(),
        });

        let report = pipeline.run(&docs, 10, &RetryPolicy::none()).await.unwrap();

        assert_eq!(report.documents, 3);
        assert_eq!(report.empty_documents, 1);
        assert_eq!(report.chunks_stored, 2);
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let index = Arc::new(RecordingIndex::default());
        let pipeline = pipeline(ScriptedEmbedder::ok(), index);
        let err = pipeline.ingest(&documents(1), 0).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::exponential(10);
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(9), Duration::from_millis(16000));
    }
}
