use super::generator::{Generator, UNAVAILABLE_ANSWER};
use super::retriever::Retriever;
use super::types::{AnswerResult, RetrievedContext};
use crate::core::config::RetrievalSettings;
use crate::core::errors::RagError;

/// The single entry point of the query path: question in, grounded answer out.
#[derive(Clone)]
pub struct QueryOrchestrator {
    retriever: Retriever,
    generator: Generator,
    top_k: usize,
    min_score: f32,
}

impl QueryOrchestrator {
    pub fn new(retriever: Retriever, generator: Generator, settings: &RetrievalSettings) -> Self {
        Self {
            retriever,
            generator,
            top_k: settings.top_k,
            min_score: settings.min_score,
        }
    }

    /// Answers `query`. Only an empty query is an error; provider trouble
    /// anywhere on the path degrades to a fallback answer.
    pub async fn answer(&self, query: &str) -> Result<AnswerResult, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidInput("Query cannot be empty".into()));
        }

        tracing::info!("Query received: {}", query);

        let context = match self.retriever.retrieve(query, self.top_k, self.min_score).await {
            Ok(context) => context,
            Err(RagError::Provider(msg)) => {
                tracing::warn!("Retrieval failed; returning fallback: {}", msg);
                return Ok(AnswerResult {
                    query: query.to_string(),
                    answer: UNAVAILABLE_ANSWER.to_string(),
                    sources: Vec::new(),
                });
            }
            Err(err) => return Err(err),
        };

        tracing::info!("Retrieved {} context passages", context.len());
        for item in &context {
            tracing::debug!("  {:.3} {}", item.score, item.source);
        }

        let answer = self.generator.generate(query, &context).await;

        Ok(AnswerResult {
            query: query.to_string(),
            answer,
            sources: unique_sources(&context),
        })
    }
}

fn unique_sources(context: &[RetrievedContext]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for item in context {
        if !sources.contains(&item.source) {
            sources.push(item.source.clone());
        }
    }
    sources
}
