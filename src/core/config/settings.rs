//! Typed process configuration.
//!
//! Values come from `config.yml`, `secrets.yaml` and environment overrides
//! (see [`super::ConfigService`]) and are immutable once the process starts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    #[serde(alias = "openai_compatible", alias = "lmstudio")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Environment variable consulted when a section has no explicit key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// OpenAI-compatible servers (LM Studio and friends) may run without a key.
    pub fn requires_api_key(&self, base_url: Option<&str>) -> bool {
        match self {
            ProviderKind::Gemini => true,
            ProviderKind::OpenAi => base_url.is_none(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Expected vector length. Responses of any other length are rejected.
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: "embedding-001".to_string(),
            base_url: None,
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    /// Identifies the embedding space. Ingestion and query time must agree on it.
    pub fn fingerprint(&self) -> String {
        match self.dimensions {
            Some(dims) => format!("{}:{}:{}", self.provider.as_str(), self.model, dims),
            None => format!("{}:{}", self.provider.as_str(), self.model),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            api_key: None,
            temperature: Some(0.2),
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Pinecone,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub kind: IndexKind,
    /// Pinecone index data-plane host, e.g. `https://support-abc123.svc.pinecone.io`.
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub namespace: Option<String>,
    pub sqlite_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            kind: IndexKind::Pinecone,
            host: None,
            api_key: None,
            namespace: None,
            sqlite_path: None,
            timeout_secs: 30,
        }
    }
}

/// Query-time retrieval knobs.
///
/// `min_score` discards weak matches; `top_k` trades result breadth against
/// prompt length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub batch_size: usize,
    pub max_retries: usize,
    pub requests_per_minute: Option<u32>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_chunk_size: 1200,
            min_chunk_size: 50,
            batch_size: 10,
            max_retries: 3,
            requests_per_minute: None,
        }
    }
}
