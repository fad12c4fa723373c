//! Article generation with ordered model fallback.
//!
//! Each candidate model gets its own retry budget. The first model to
//! answer wins; later candidates are never consulted once one succeeds.

use crate::config::{ChatPrompt, Prompts};
use crate::error::{DigestError, Result};
use crate::llm::ChatModel;
use crate::retry::Retrier;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Turns a transcript into a Markdown article.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str, language: &str) -> Result<String>;
}

/// Translates a finished article.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, article: &str, language: &str) -> Result<String>;
}

/// Runs a prompt against candidate models in order.
pub struct ModelFallback {
    chat: Arc<dyn ChatModel>,
    retrier: Retrier,
    models: Vec<String>,
}

impl ModelFallback {
    /// `retrier`'s `max_retries` is the per-model attempt budget.
    pub fn new(chat: Arc<dyn ChatModel>, retrier: Retrier, models: Vec<String>) -> Self {
        Self {
            chat,
            retrier,
            models,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Try each model until one produces non-empty output.
    pub async fn complete(&self, prompt: &ChatPrompt) -> Result<String> {
        let chat = &self.chat;
        let mut last_error: Option<DigestError> = None;

        for (index, model) in self.models.iter().enumerate() {
            let model = model.as_str();
            info!(model, candidate = index + 1, of = self.models.len(), "Trying model");

            let outcome = self
                .retrier
                .execute(|| async move {
                    let raw = chat.complete(model, prompt).await?;
                    let text = clean_output(&raw);
                    if text.is_empty() {
                        return Err(DigestError::Llm(format!("{} returned an empty answer", model)));
                    }
                    Ok(text)
                })
                .await;

            match outcome {
                Ok(text) => {
                    info!(model, chars = text.len(), "Model succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model, category = e.category(), error = %e, "Model exhausted its retries");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last) => Err(DigestError::AllModelsExhausted {
                attempts: self.models.len(),
                last: Box::new(last),
            }),
            None => Err(DigestError::NoModelsConfigured),
        }
    }
}

/// Trim the answer and unwrap it if the model fenced the whole thing.
pub fn clean_output(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed.to_string();
    };
    if inner.contains("```") {
        return trimmed.to_string();
    }

    let body = match inner.find('\n') {
        Some(nl) if inner[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &inner[nl + 1..],
        _ => inner,
    };
    body.trim().to_string()
}

/// Editorial rewrite of transcripts.
pub struct ArticleSummarizer {
    fallback: ModelFallback,
    prompts: Arc<Prompts>,
}

impl ArticleSummarizer {
    pub fn new(fallback: ModelFallback, prompts: Arc<Prompts>) -> Self {
        Self { fallback, prompts }
    }
}

#[async_trait]
impl Summarizer for ArticleSummarizer {
    #[instrument(skip_all, fields(transcript_chars = transcript.len(), language = %language))]
    async fn summarize(&self, transcript: &str, language: &str) -> Result<String> {
        let prompt = self.prompts.article_prompt(transcript, language);
        self.fallback.complete(&prompt).await
    }
}

/// Article translation through the same fallback machinery.
pub struct LlmTranslator {
    fallback: ModelFallback,
    prompts: Arc<Prompts>,
}

impl LlmTranslator {
    pub fn new(fallback: ModelFallback, prompts: Arc<Prompts>) -> Self {
        Self { fallback, prompts }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    #[instrument(skip_all, fields(language = %language))]
    async fn translate(&self, article: &str, language: &str) -> Result<String> {
        let prompt = self.prompts.translation_prompt(article, language);
        self.fallback.complete(&prompt).await
    }
}
