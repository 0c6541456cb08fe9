use std::sync::Arc;

use super::embedding::EmbeddingClient;
use super::store::VectorIndex;
use super::types::RetrievedContext;
use crate::core::errors::RagError;

/// Embeds a question and pulls the passages that clear the score threshold.
#[derive(Clone)]
pub struct Retriever {
    embeddings: EmbeddingClient,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embeddings: EmbeddingClient, index: Arc<dyn VectorIndex>) -> Self {
        Self { embeddings, index }
    }

    /// Returns matches with `score >= min_score`, best first.
    ///
    /// An empty result means nothing relevant was found; provider and index
    /// failures come back as [`RagError::Provider`] instead.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedContext>, RagError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embeddings.embed(query).await?;
        let matches = self.index.query(&vector, top_k).await?;
        let total = matches.len();

        let contexts: Vec<RetrievedContext> = matches
            .into_iter()
            .filter(|m| m.score >= min_score)
            .map(|m| RetrievedContext {
                text: m.metadata.text,
                source: m.metadata.source,
                score: m.score,
            })
            .collect();

        tracing::debug!(
            "{} of {} matches from {} cleared min_score {}",
            contexts.len(),
            total,
            self.index.name(),
            min_score
        );
        Ok(contexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EmbeddingSettings;
    use crate::llm::EmbeddingProvider;
    use crate::rag::types::{EntryMetadata, IndexEntry, IndexMatch};
    use async_trait::async_trait;
    use chrono::Utc;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        fn name(&self) -> &str {
            "unit"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![1.0])
        }
    }

    struct CannedIndex {
        scores: Vec<f32>,
        fail: bool,
    }

    #[async_trait]
    impl VectorIndex for CannedIndex {
        fn name(&self) -> &str {
            "canned"
        }

        async fn upsert(&self, _entries: Vec<IndexEntry>) -> Result<(), RagError> {
            Ok(())
        }

        async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>, RagError> {
            if self.fail {
                return Err(RagError::Provider("index unreachable".into()));
            }
            Ok(self
                .scores
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(i, score)| IndexMatch {
                    id: format!("https://x/{}#0", i),
                    score: *score,
                    metadata: EntryMetadata {
                        text: format!("passage {}", i),
                        source: format!("https://x/{}", i),
                        title: None,
                        sequence_index: 0,
                        created_at: Utc::now(),
                        content_hash: String::new(),
                        embedding_fingerprint: String::new(),
                    },
                })
                .collect())
        }
    }

    fn retriever(scores: Vec<f32>, fail: bool) -> Retriever {
        let embeddings =
            EmbeddingClient::new(Arc::new(UnitEmbedder), &EmbeddingSettings::default());
        Retriever::new(embeddings, Arc::new(CannedIndex { scores, fail }))
    }

    #[tokio::test]
    async fn keeps_matches_at_or_above_threshold_in_order() {
        let retriever = retriever(vec![0.93, 0.81, 0.7, 0.69, 0.2], false);
        let contexts = retriever.retrieve("reset password", 8, 0.7).await.unwrap();

        let scores: Vec<f32> = contexts.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.93, 0.81, 0.7]);
        assert_eq!(contexts[0].source, "https://x/0");
        assert_eq!(contexts[0].text, "passage 0");
    }

    #[tokio::test]
    async fn raising_threshold_never_grows_the_result() {
        let retriever = retriever(vec![0.95, 0.9, 0.85, 0.75, 0.6, 0.4], false);
        let mut previous = usize::MAX;
        for min_score in [0.0, 0.5, 0.7, 0.8, 0.9, 0.99] {
            let len = retriever.retrieve("q", 8, min_score).await.unwrap().len();
            assert!(len <= previous);
            previous = len;
        }
    }

    #[tokio::test]
    async fn nothing_relevant_is_empty_not_an_error() {
        let retriever = retriever(vec![0.4, 0.3], false);
        assert!(retriever.retrieve("q", 8, 0.7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn index_failure_is_a_provider_error() {
        let retriever = retriever(vec![0.9], true);
        let err = retriever.retrieve("q", 8, 0.7).await.unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
    }

    #[tokio::test]
    async fn top_k_limits_breadth() {
        let retriever = retriever(vec![0.99, 0.98, 0.97, 0.96], false);
        assert_eq!(retriever.retrieve("q", 2, 0.7).await.unwrap().len(), 2);
        assert!(retriever.retrieve("q", 0, 0.7).await.unwrap().is_empty());
    }
}
