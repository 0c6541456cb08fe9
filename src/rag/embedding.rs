//! Embedding client shared by ingestion and retrieval.
//!
//! Both paths must embed with the same provider configuration; the
//! client carries that configuration's fingerprint so the index can refuse
//! vectors from a different embedding space.

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::EmbeddingSettings;
use crate::core::errors::RagError;
use crate::llm::EmbeddingProvider;

#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    fingerprint: String,
    dimensions: Option<usize>,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, settings: &EmbeddingSettings) -> Self {
        Self {
            provider,
            fingerprint: settings.fingerprint(),
            dimensions: settings.dimensions,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Maps text to a vector. Empty text, timeouts, provider failures and
    /// malformed vectors all surface as [`RagError::Provider`].
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::Provider("cannot embed empty text".into()));
        }

        let vector = tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| {
                RagError::Provider(format!(
                    "{} embedding timed out after {:?}",
                    self.provider.name(),
                    self.timeout
                ))
            })??;

        if vector.is_empty() {
            return Err(RagError::Provider(format!(
                "{} returned an empty embedding",
                self.provider.name()
            )));
        }
        if let Some(expected) = self.dimensions {
            if vector.len() != expected {
                return Err(RagError::Provider(format!(
                    "{} returned {} dimensions, expected {}",
                    self.provider.name(),
                    vector.len(),
                    expected
                )));
            }
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::Provider(format!(
                "{} returned a non-finite embedding value",
                self.provider.name()
            )));
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        vector: Vec<f32>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.vector.clone())
        }
    }

    fn client(
        vector: Vec<f32>,
        delay: Duration,
        settings: EmbeddingSettings,
    ) -> (EmbeddingClient, Arc<FixedProvider>) {
        let provider = Arc::new(FixedProvider {
            vector,
            delay,
            calls: AtomicUsize::new(0),
        });
        (EmbeddingClient::new(provider.clone(), &settings), provider)
    }

    #[tokio::test]
    async fn empty_text_fails_without_calling_provider() {
        let (client, provider) = client(vec![1.0], Duration::ZERO, EmbeddingSettings::default());
        let err = client.embed("   ").await.unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_provider_error() {
        let settings = EmbeddingSettings {
            dimensions: Some(3),
            ..EmbeddingSettings::default()
        };
        let (client, _) = client(vec![1.0, 0.0], Duration::ZERO, settings);
        let err = client.embed("reset password").await.unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }

    #[tokio::test]
    async fn hung_provider_times_out() {
        let settings = EmbeddingSettings {
            timeout_secs: 1,
            ..EmbeddingSettings::default()
        };
        let (client, _) = client(vec![1.0], Duration::from_secs(30), settings);

        tokio::time::pause();
        let err = client.embed("reset password").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn returns_vector_and_fingerprint() {
        let (client, _) = client(vec![0.5, 0.5], Duration::ZERO, EmbeddingSettings::default());
        assert_eq!(client.embed("hello").await.unwrap(), vec![0.5, 0.5]);
        assert_eq!(client.fingerprint(), "gemini:embedding-001");
    }
}
