//! Google Gemini (Generative Language API) client.
//!
//! Embeddings use `models/{model}:embedContent`, answers use
//! `models/{model}:generateContent`. The key travels in the
//! `x-goog-api-key` header so it never appears in request URLs or logs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::{CompletionProvider, EmbeddingProvider};
use super::types::ChatRequest;
use super::{error_body, DEFAULT_GEMINI_BASE_URL};
use crate::core::errors::RagError;

#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    dimensions: Option<usize>,
    client: Client,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(RagError::Provider("missing Gemini API key".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| RagError::Provider("invalid Gemini API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.trim_start_matches("models/").to_string(),
            dimensions: None,
            client,
        })
    }

    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.base_url,
            urlencoding::encode(&self.model),
            method
        )
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, RagError> {
        let res = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(RagError::provider)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!(
                "Gemini {} failed ({}): {}",
                method,
                status,
                error_body(&text)
            )));
        }

        res.json::<T>().await.map_err(RagError::provider)
    }
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    fn into_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

/// Builds the `generateContent` payload. System messages become the
/// system instruction; the rest map onto `user`/`model` turns.
fn generate_body(request: &ChatRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    let Some(obj) = body.as_object_mut() else {
        return body;
    };

    if let Some(system) = request.system_text() {
        obj.insert(
            "systemInstruction".to_string(),
            json!({ "parts": [{ "text": system }] }),
        );
    }

    let mut generation = serde_json::Map::new();
    if let Some(t) = request.temperature {
        generation.insert("temperature".to_string(), json!(t));
    }
    if let Some(t) = request.max_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(t));
    }
    if !generation.is_empty() {
        obj.insert("generationConfig".to_string(), Value::Object(generation));
    }

    body
}

#[async_trait]
impl EmbeddingProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });
        if let (Some(dims), Some(obj)) = (self.dimensions, body.as_object_mut()) {
            obj.insert("outputDimensionality".to_string(), json!(dims));
        }

        let response: EmbedContentResponse = self.post("embedContent", &body).await?;
        Ok(response.embedding.values)
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        let body = generate_body(&request);
        let response: GenerateContentResponse = self.post("generateContent", &body).await?;
        Ok(response.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[test]
    fn generate_body_splits_system_instruction() {
        let mut request = ChatRequest::new(vec![
            ChatMessage::system("Answer from context only."),
            ChatMessage::user("How do I reset my password?"),
        ]);
        request.temperature = Some(0.2);

        let body = generate_body(&request);

        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            json!("Answer from context only.")
        );
        assert_eq!(body["contents"].as_array().map(|c| c.len()), Some(1));
        assert_eq!(body["contents"][0]["role"], json!("user"));
        assert!(body["generationConfig"]["temperature"].is_number());
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "Go to " }, { "text": "Settings." }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.into_text(), "Go to Settings.");

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.into_text(), "");
    }

    #[test]
    fn model_prefix_is_normalized() {
        let client = GeminiClient::new(
            "key",
            Some("https://example.test/v1beta/"),
            "models/embedding-001",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.method_url("embedContent"),
            "https://example.test/v1beta/models/embedding-001:embedContent"
        );
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(GeminiClient::new("  ", None, "embedding-001", Duration::from_secs(5)).is_err());
    }
}
