//! Chat completion client for OpenAI-compatible providers.
//!
//! One client covers OpenAI, Groq and a local Ollama server; only the base
//! URL and key differ. The client performs a single request per call and
//! leaves retrying to [`crate::retry::Retrier`].

use crate::config::ChatPrompt;
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const TEMPERATURE: f32 = 0.1;

/// A language model reachable by name.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, model: &str, prompt: &ChatPrompt) -> Result<String>;
}

/// `POST {base_url}/chat/completions` over reqwest.
pub struct OpenAiCompatibleChat {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ApiError {
    fn is_rate_limit(&self) -> bool {
        let code = self.code.as_ref().map(|c| match c {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let hit = [self.kind.as_deref(), code.as_deref()]
            .into_iter()
            .flatten()
            .any(|v| v.to_ascii_lowercase().replace(['_', '-', ' '], "").contains("ratelimit"));
        hit
    }
}

impl OpenAiCompatibleChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn map_error(status: u16, body: &str) -> DigestError {
        let api_error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
        let message = api_error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        if status == 429 || api_error.as_ref().is_some_and(ApiError::is_rate_limit) {
            DigestError::RateLimited(format!("{} - {}", status, message))
        } else {
            DigestError::Llm(format!("{} - {}", status, message))
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleChat {
    #[instrument(skip(self, prompt))]
    async fn complete(&self, model: &str, prompt: &ChatPrompt) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "temperature": TEMPERATURE,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ]
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Chat completion request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::map_error(status.as_u16(), &text));
        }

        let completion: CompletionResponse = resp.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DigestError::Llm("response contained no choices".to_string()))?;

        debug!(chars = content.len(), "Chat completion received");
        Ok(content)
    }
}
