use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::RagError;

/// Text in, fixed-length vector out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// return the provider name (e.g. "gemini", "openai")
    fn name(&self) -> &str;

    /// embed a single piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Prompt in, generated text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest) -> Result<String, RagError>;
}
