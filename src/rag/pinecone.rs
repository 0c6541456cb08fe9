//! Pinecone data-plane client.
//!
//! Talks to an index host (`https://<index>-<project>.svc.<env>.pinecone.io`)
//! through `/vectors/upsert` and `/query`. Pinecone caps upsert requests,
//! so large batches are sent in slices of [`MAX_VECTORS_PER_REQUEST`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::VectorIndex;
use super::types::{EntryMetadata, IndexEntry, IndexMatch};
use crate::core::errors::RagError;
use crate::llm::error_body;

const MAX_VECTORS_PER_REQUEST: usize = 100;

#[derive(Clone)]
pub struct PineconeIndex {
    host: String,
    namespace: Option<String>,
    client: Client,
}

impl PineconeIndex {
    pub fn new(
        api_key: &str,
        host: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(RagError::Provider("missing Pinecone API key".into()));
        }
        let host = host.trim().trim_end_matches('/');
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(RagError::Provider(
                "Pinecone index host must be an http(s) URL".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(api_key)
                .map_err(|_| RagError::Provider("invalid Pinecone API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            host: host.to_string(),
            namespace: namespace
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            client,
        })
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RagError> {
        let url = format!("{}{}", self.host, path);
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
                "Pinecone {} failed ({}): {}",
                path,
                status,
                error_body(&text)
            )));
        }

        res.json::<T>().await.map_err(RagError::provider)
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a EntryMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Value,
}

impl From<QueryMatch> for IndexMatch {
    fn from(m: QueryMatch) -> Self {
        IndexMatch {
            metadata: EntryMetadata::from_value(&m.metadata),
            id: m.id,
            score: m.score,
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), RagError> {
        for slice in entries.chunks(MAX_VECTORS_PER_REQUEST) {
            let request = UpsertRequest {
                vectors: slice
                    .iter()
                    .map(|entry| PineconeVector {
                        id: &entry.id,
                        values: &entry.vector,
                        metadata: &entry.metadata,
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };

            let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
            if response.upserted_count != slice.len() {
                tracing::warn!(
                    "Pinecone reported {} upserted vectors for a slice of {}",
                    response.upserted_count,
                    slice.len()
                );
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>, RagError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };

        let response: QueryResponse = self.post("/query", &request).await?;
        let mut matches: Vec<IndexMatch> = response.matches.into_iter().map(Into::into).collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}
