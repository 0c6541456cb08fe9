pub mod gemini;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use provider::{CompletionProvider, EmbeddingProvider};
pub use types::{ChatMessage, ChatRequest};

use crate::core::config::{CompletionSettings, EmbeddingSettings, ProviderKind};
use crate::core::errors::RagError;

pub(crate) const DEFAULT_GEMINI_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta";
pub(crate) const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const MAX_ERROR_BODY_CHARS: usize = 500;

pub fn build_embedding_provider(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let base_url = settings.base_url.as_deref();
    let provider: Arc<dyn EmbeddingProvider> = match settings.provider {
        ProviderKind::Gemini => Arc::new(
            GeminiClient::new(
                settings.api_key.as_deref().unwrap_or_default(),
                base_url,
                &settings.model,
                timeout,
            )?
            .with_dimensions(settings.dimensions),
        ),
        ProviderKind::OpenAi => Arc::new(
            OpenAiClient::new(settings.api_key.as_deref(), base_url, &settings.model, timeout)?
                .with_dimensions(settings.dimensions),
        ),
    };
    Ok(provider)
}

pub fn build_completion_provider(
    settings: &CompletionSettings,
) -> Result<Arc<dyn CompletionProvider>, RagError> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let base_url = settings.base_url.as_deref();
    let provider: Arc<dyn CompletionProvider> = match settings.provider {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(
            settings.api_key.as_deref().unwrap_or_default(),
            base_url,
            &settings.model,
            timeout,
        )?),
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(
            settings.api_key.as_deref(),
            base_url,
            &settings.model,
            timeout,
        )?),
    };
    Ok(provider)
}

/// Truncates provider error bodies before they reach error messages.
pub(crate) fn error_body(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.trim().to_string();
    }
    let truncated: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{}...", truncated.trim_end())
}
