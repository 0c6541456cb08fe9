//! Grounded answer generation.
//!
//! The model only ever sees the retrieved passages. An empty context never
//! reaches the provider, and provider failures turn into a fixed apology
//! instead of an error.

use std::sync::Arc;
use std::time::Duration;

use super::types::RetrievedContext;
use crate::core::config::CompletionSettings;
use crate::llm::{ChatMessage, ChatRequest, CompletionProvider};

/// Returned when no passage supports an answer. The prompt tells the model
/// to reply with exactly this sentence in the same situation.
pub const FALLBACK_ANSWER: &str = "I'm not sure, please check with a human support agent.";

/// Returned when the completion provider fails or times out.
pub const UNAVAILABLE_ANSWER: &str =
    "Sorry, I'm temporarily unable to answer right now. Please try again in a moment.";

#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn CompletionProvider>,
    settings: CompletionSettings,
}

impl Generator {
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: &CompletionSettings) -> Self {
        Self {
            provider,
            settings: settings.clone(),
        }
    }

    pub async fn generate(&self, query: &str, context: &[RetrievedContext]) -> String {
        if context.is_empty() {
            return FALLBACK_ANSWER.to_string();
        }

        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(user_prompt(query, context)),
        ])
        .with_settings(&self.settings);

        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let result = match tokio::time::timeout(timeout, self.provider.chat(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "{} completion timed out after {:?}; returning fallback",
                    self.provider.name(),
                    timeout
                );
                return UNAVAILABLE_ANSWER.to_string();
            }
        };

        match result {
            Ok(answer) if answer.trim().is_empty() => FALLBACK_ANSWER.to_string(),
            Ok(answer) => answer.trim().to_string(),
            Err(err) => {
                tracing::warn!(
                    "{} completion failed; returning fallback: {}",
                    self.provider.name(),
                    err
                );
                UNAVAILABLE_ANSWER.to_string()
            }
        }
    }
}

fn system_prompt() -> String {
    format!(
        "You are a customer support assistant. Answer using ONLY the numbered context passages \
         supplied with the question.\n\
         Rules:\n\
         1. Do not use outside knowledge and do not guess.\n\
         2. If the context answers only part of the question, answer that part and say clearly \
         what information is missing.\n\
         3. If the context is not relevant to the question, reply exactly: \"{}\"\n\
         4. End every answer with a \"Sources:\" list naming the passage numbers and URLs you used.\n\
         Keep answers short and factual.",
        FALLBACK_ANSWER
    )
}

fn user_prompt(query: &str, context: &[RetrievedContext]) -> String {
    let mut prompt = String::from("Context:\n\n");
    for (i, item) in context.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] (Source: {})\n{}\n\n",
            i + 1,
            item.source,
            item.text.trim()
        ));
    }
    prompt.push_str(&format!("Question: {}", query));
    prompt
}
