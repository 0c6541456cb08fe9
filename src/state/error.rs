use thiserror::Error;

use crate::core::errors::RagError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize embedding provider: {0}")]
    Embedding(#[source] RagError),

    #[error("Failed to initialize completion provider: {0}")]
    Completion(#[source] RagError),

    #[error("Failed to open vector index: {0}")]
    Index(#[source] RagError),
}
