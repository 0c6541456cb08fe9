#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use support_rag::core::config::{CompletionSettings, EmbeddingSettings, RetrievalSettings};
use support_rag::core::errors::RagError;
use support_rag::llm::{ChatRequest, CompletionProvider, EmbeddingProvider};
use support_rag::rag::{
    Chunker, EmbeddingClient, Generator, IngestionPipeline, QueryOrchestrator, RawDocument,
    Retriever, SqliteIndex, VectorIndex,
};

const VOCABULARY: [&str; 6] = ["reset", "password", "card", "limit", "fee", "refund"];

/// Bag-of-words embedder over a tiny support vocabulary.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        Ok(VOCABULARY
            .iter()
            .map(|term| words.iter().filter(|w| w.starts_with(term)).count() as f32)
            .collect())
    }
}

/// Answers with the first passage it was given and cites it.
pub struct ExtractiveChat {
    pub calls: AtomicUsize,
}

impl ExtractiveChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionProvider for ExtractiveChat {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let mut lines = prompt.lines().skip_while(|l| !l.starts_with("[1] (Source: "));
        let citation = lines.next().unwrap_or_default().to_string();
        let passage = lines.next().unwrap_or_default().to_string();
        let source = citation
            .trim_start_matches("[1] (Source: ")
            .trim_end_matches(')');
        Ok(format!("{}\n\nSources:\n[1] {}", passage, source))
    }
}

pub fn reset_password_document() -> RawDocument {
    RawDocument {
        url: "https://x/a".to_string(),
        title: String::new(),
        content: "Reset your password from Settings > Security. Contact support for help."
            .to_string(),
    }
}

pub async fn sqlite_index(dir: &Path) -> Arc<SqliteIndex> {
    Arc::new(SqliteIndex::with_path(dir.join("index.db")).await.unwrap())
}

pub fn pipeline(embedder: Arc<KeywordEmbedder>, index: Arc<dyn VectorIndex>) -> IngestionPipeline {
    let embeddings = EmbeddingClient::new(embedder, &EmbeddingSettings::default());
    IngestionPipeline::new(Chunker::default(), embeddings, index, 1200)
}

pub fn orchestrator(
    embedder: Arc<KeywordEmbedder>,
    chat: Arc<ExtractiveChat>,
    index: Arc<dyn VectorIndex>,
) -> QueryOrchestrator {
    let embeddings = EmbeddingClient::new(embedder, &EmbeddingSettings::default());
    QueryOrchestrator::new(
        Retriever::new(embeddings, index),
        Generator::new(chat, &CompletionSettings::default()),
        &RetrievalSettings::default(),
    )
}
