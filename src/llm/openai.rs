use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{CompletionProvider, EmbeddingProvider};
use super::types::ChatRequest;
use super::{error_body, DEFAULT_OPENAI_BASE_URL};
use crate::core::errors::RagError;

/// Client for OpenAI-compatible `/v1` servers (OpenAI, LM Studio, vLLM, ...).
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    model: String,
    dimensions: Option<usize>,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: Option<&str>,
        base_url: Option<&str>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let auth = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|_| RagError::Provider("invalid OpenAI API key".into()))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            dimensions: None,
            client,
        })
    }

    pub fn with_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.dimensions = dimensions;
        self
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RagError> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(RagError::provider)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!(
                "OpenAI-compatible {} failed ({}): {}",
                path,
                status,
                error_body(&text)
            )));
        }

        res.json().await.map_err(RagError::provider)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut body = json!({
            "model": self.model,
            "input": [text],
        });
        if let (Some(dims), Some(obj)) = (self.dimensions, body.as_object_mut()) {
            obj.insert("dimensions".to_string(), json!(dims));
        }

        let payload = self.post("/embeddings", &body).await?;
        parse_embedding(&payload)
    }
}

fn parse_embedding(payload: &Value) -> Result<Vec<f32>, RagError> {
    let values = payload["data"][0]["embedding"].as_array().ok_or_else(|| {
        RagError::Provider("embedding response missing data[0].embedding".into())
    })?;

    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                RagError::Provider(format!("embedding element {} is not a number: {}", i, v))
            })
        })
        .collect()
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }

        let payload = self.post("/chat/completions", &body).await?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }
}
