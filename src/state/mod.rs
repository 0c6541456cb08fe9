use std::sync::Arc;

use crate::core::config::Settings;
use crate::llm::{build_completion_provider, build_embedding_provider};
use crate::rag::{build_index, EmbeddingClient, Generator, QueryOrchestrator, Retriever};

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Provider clients are built once here and injected into the query path;
/// nothing in it is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orchestrator: QueryOrchestrator,
}

impl AppState {
    /// Builds the providers and the vector index described by `settings`.
    ///
    /// Fails when a provider cannot be constructed, the index cannot be
    /// opened, or the index holds vectors from a different embedding
    /// configuration. The index is only read here; an empty index stays
    /// unpinned until the first ingestion.
    pub async fn initialize(settings: Settings) -> Result<Arc<Self>, InitializationError> {
        let embedder =
            build_embedding_provider(&settings.embedding).map_err(InitializationError::Embedding)?;
        let completion = build_completion_provider(&settings.completion)
            .map_err(InitializationError::Completion)?;
        let index = build_index(&settings.index)
            .await
            .map_err(InitializationError::Index)?;

        let embeddings = EmbeddingClient::new(embedder, &settings.embedding);
        index
            .check_embedding_space(embeddings.fingerprint())
            .await
            .map_err(InitializationError::Index)?;

        tracing::info!(
            "Query path ready: embeddings {}, completions {}:{}, index {}",
            embeddings.fingerprint(),
            settings.completion.provider.as_str(),
            settings.completion.model,
            index.name()
        );

        let retriever = Retriever::new(embeddings, index);
        let generator = Generator::new(completion, &settings.completion);
        let orchestrator = QueryOrchestrator::new(retriever, generator, &settings.retrieval);

        Ok(Self::from_parts(settings, orchestrator))
    }

    /// Wraps an already assembled orchestrator.
    pub fn from_parts(settings: Settings, orchestrator: QueryOrchestrator) -> Arc<Self> {
        Arc::new(Self {
            settings: Arc::new(settings),
            orchestrator,
        })
    }
}
