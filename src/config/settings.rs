//! Configuration settings for tubedigest.

use crate::error::{DigestError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest accepted look-back window.
pub const MAX_DAYS_BACK: u32 = 3650;

/// Largest accepted cooldown between videos.
pub const MAX_INTER_ITEM_DELAY_SECONDS: f64 = 86_400.0;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Channels to scan, in processing order.
    pub youtube_channel_ids: Vec<String>,
    pub general: GeneralSettings,
    pub video_retrieval: VideoRetrievalSettings,
    pub transcript: TranscriptSettings,
    pub llm: LlmSettings,
    pub translation: TranslationSettings,
    pub retry: RetryPolicy,
    pub pipeline: PipelineSettings,
    pub email: EmailSettings,
    pub model_server: ModelServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory where digests are written.
    pub output_dir: String,
    /// Log level used when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: "summarized_articles".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Video discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoRetrievalSettings {
    /// Only videos published within this many days are picked up.
    pub published_after_days: u32,
    /// YouTube Data API base URL.
    pub api_base_url: String,
}

impl Default for VideoRetrievalSettings {
    fn default() -> Self {
        Self {
            published_after_days: 1,
            api_base_url: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }
}

/// Transcript acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Caption language to request.
    pub language: String,
    /// Optional HTTP relay used by the proxied strategy.
    pub relay_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            relay_url: None,
            timeout_seconds: 30,
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Candidate models, tried left to right.
    pub models: Vec<String>,
    /// OpenAI-compatible API base URL.
    ///
    /// With `model_server.managed` this must point at the managed server,
    /// e.g. `http://localhost:11434/v1` for Ollama.
    pub base_url: String,
    /// Hard timeout on a single completion call.
    pub timeout_seconds: u64,
    /// Language the articles are written in.
    pub source_language: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            models: vec!["gpt-4o-mini".to_string()],
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 300,
            source_language: "en-US".to_string(),
        }
    }
}

/// Translation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Target language. No translation happens when it matches the source language.
    pub language: String,
    /// Models used for translation. Empty means reuse `llm.models`.
    pub models: Vec<String>,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            models: Vec::new(),
        }
    }
}

/// Orchestrator pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Cooldown between consecutive videos.
    pub inter_item_delay_seconds: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            inter_item_delay_seconds: 10.0,
        }
    }
}

/// SMTP delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp_host: String,
    /// Implicit-TLS port.
    pub smtp_port: u16,
    pub subject: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            subject: "TLDR News Daily Summary".to_string(),
        }
    }
}

/// Locally managed model server (e.g. `ollama serve`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelServerSettings {
    /// Start and stop the server around the pipeline run.
    pub managed: bool,
    pub command: String,
    pub args: Vec<String>,
    /// Polled until it answers 2xx.
    pub health_url: String,
    pub startup_timeout_seconds: u64,
    pub shutdown_grace_seconds: u64,
}

impl Default for ModelServerSettings {
    fn default() -> Self {
        Self {
            managed: false,
            command: "ollama".to_string(),
            args: vec!["serve".to_string()],
            health_url: "http://localhost:11434".to_string(),
            startup_timeout_seconds: 30,
            shutdown_grace_seconds: 10,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory holding `article.toml` / `translation.toml` overrides.
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Settings::default())
        }
    }

    /// Parse settings from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DigestError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubedigest")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded output directory path.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Models used for translation, falling back to the article models.
    pub fn translation_models(&self) -> &[String] {
        if self.translation.models.is_empty() {
            &self.llm.models
        } else {
            &self.translation.models
        }
    }

    /// Whether articles need translating after they are written.
    pub fn needs_translation(&self) -> bool {
        !self
            .translation
            .language
            .eq_ignore_ascii_case(&self.llm.source_language)
    }

    /// Check the settings a pipeline run depends on.
    ///
    /// Called before any network traffic so misconfiguration aborts early.
    pub fn validate(&self) -> Result<()> {
        if self.youtube_channel_ids.iter().all(|c| c.trim().is_empty()) {
            return Err(DigestError::NoChannelsConfigured);
        }
        if self.llm.models.is_empty() {
            return Err(DigestError::NoModelsConfigured);
        }
        self.retry.validate()?;
        if self.video_retrieval.published_after_days > MAX_DAYS_BACK {
            return Err(DigestError::Config(format!(
                "video_retrieval.published_after_days must be at most {}",
                MAX_DAYS_BACK
            )));
        }
        let delay = self.pipeline.inter_item_delay_seconds;
        if !(delay.is_finite() && (0.0..=MAX_INTER_ITEM_DELAY_SECONDS).contains(&delay)) {
            return Err(DigestError::Config(format!(
                "pipeline.inter_item_delay_seconds must be between 0 and {}",
                MAX_INTER_ITEM_DELAY_SECONDS
            )));
        }
        if self.transcript.language.trim().is_empty() {
            return Err(DigestError::Config(
                "transcript.language must not be empty".to_string(),
            ));
        }
        if self.model_server.managed {
            self.check_llm_targets_managed_server()?;
        }
        Ok(())
    }

    /// A managed server is pointless unless completions go to it.
    fn check_llm_targets_managed_server(&self) -> Result<()> {
        let parse = |field: &str, raw: &str| {
            url::Url::parse(raw)
                .map_err(|e| DigestError::Config(format!("{} '{}': {}", field, raw, e)))
        };
        let llm = parse("llm.base_url", &self.llm.base_url)?;
        let health = parse("model_server.health_url", &self.model_server.health_url)?;

        if llm.host_str() != health.host_str()
            || llm.port_or_known_default() != health.port_or_known_default()
        {
            return Err(DigestError::Config(format!(
                "model_server.managed is set but llm.base_url ({}) does not point at the managed server ({})",
                self.llm.base_url, self.model_server.health_url
            )));
        }
        Ok(())
    }
}
