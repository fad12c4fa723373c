//! Pipeline orchestrator for tubedigest.
//!
//! Sequences discovery, transcript fetching, article generation and
//! optional translation for every recent video on the configured channels.
//! Individual failures are recorded and skipped; only configuration
//! problems stop a run.

use crate::config::{Credentials, Prompts, Settings};
use crate::discovery::{VideoDiscovery, YoutubeSearch};
use crate::error::{DigestError, Result};
use crate::llm::{ChatModel, OpenAiCompatibleChat};
use crate::retry::{Retrier, Sleeper};
use crate::summarizer::{ArticleSummarizer, LlmTranslator, ModelFallback, Summarizer, Translator};
use crate::transcript::{StrategyFetcher, TranscriptFailure, TranscriptFetcher, TranscriptResult};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Per-run knobs that are not owned by any single component.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Language articles are written in.
    pub source_language: String,
    /// Translate into this language when set.
    pub translation_language: Option<String>,
    /// Caption language requested from YouTube.
    pub transcript_language: String,
    /// Pause between consecutive videos.
    pub inter_item_delay: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            source_language: "en-US".to_string(),
            translation_language: None,
            transcript_language: "en".to_string(),
            inter_item_delay: Duration::from_secs(10),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let delay_seconds = settings.pipeline.inter_item_delay_seconds;
        let inter_item_delay = Duration::try_from_secs_f64(delay_seconds).map_err(|e| {
            DigestError::Config(format!(
                "pipeline.inter_item_delay_seconds = {}: {}",
                delay_seconds, e
            ))
        })?;

        Ok(Self {
            source_language: settings.llm.source_language.clone(),
            translation_language: settings
                .needs_translation()
                .then(|| settings.translation.language.clone()),
            transcript_language: settings.transcript.language.clone(),
            inter_item_delay,
        })
    }
}

/// A video whose transcript could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFailureRecord {
    pub video_id: String,
    pub reason: TranscriptFailure,
}

/// A video that failed at the summarization or translation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub video_id: String,
    pub category: String,
    pub message: String,
}

impl FailureRecord {
    fn new(video_id: &str, error: &DigestError) -> Self {
        Self {
            video_id: video_id.to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything that went wrong during a run, without aborting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    pub zero_yield_channels: Vec<String>,
    pub transcripts: Vec<TranscriptFailureRecord>,
    pub summaries: Vec<FailureRecord>,
    /// The untranslated article was kept for these.
    pub translations: Vec<FailureRecord>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty() && self.summaries.is_empty() && self.translations.is_empty()
    }

    /// Number of videos that produced no article.
    pub fn lost_videos(&self) -> usize {
        self.transcripts.len() + self.summaries.len()
    }

    /// Markdown rendering used in notices and digest appendices.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        if !self.transcripts.is_empty() {
            out.push_str("### Transcript failures\n\n");
            for record in &self.transcripts {
                let _ = writeln!(out, "- `{}`: {}", record.video_id, record.reason);
            }
            out.push('\n');
        }
        if !self.summaries.is_empty() {
            out.push_str("### Summarization failures\n\n");
            for record in &self.summaries {
                let _ = writeln!(out, "- `{}`: {}", record.video_id, record.message);
            }
            out.push('\n');
        }
        if !self.translations.is_empty() {
            out.push_str("### Translation failures (original kept)\n\n");
            for record in &self.translations {
                let _ = writeln!(out, "- `{}`: {}", record.video_id, record.message);
            }
            out.push('\n');
        }
        if !self.zero_yield_channels.is_empty() {
            out.push_str("### Channels without new videos\n\n");
            for channel in &self.zero_yield_channels {
                let _ = writeln!(out, "- `{}`", channel);
            }
            out.push('\n');
        }

        out.trim_end().to_string()
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Cutoff passed to discovery.
    pub published_after: String,
    pub channels: usize,
    pub videos_discovered: usize,
    /// Articles in discovery order.
    pub articles: Vec<String>,
    pub failures: FailureReport,
}

/// Cutoff `days` before `now`, formatted for the search API.
pub fn cutoff_timestamp(now: DateTime<Utc>, days: u32) -> Result<String> {
    let cutoff = TimeDelta::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| DigestError::Config(format!("days back {} is out of range", days)))?;
    Ok(cutoff.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// The main orchestrator for the tubedigest pipeline.
pub struct Orchestrator {
    discovery: Arc<dyn VideoDiscovery>,
    fetcher: Arc<dyn TranscriptFetcher>,
    summarizer: Arc<dyn Summarizer>,
    translator: Option<Arc<dyn Translator>>,
    sleeper: Arc<dyn Sleeper>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Wire the production components from settings and credentials.
    pub fn new(settings: &Settings, credentials: &Credentials, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        let prompts = Arc::new(Prompts::load(settings.prompts.custom_dir.as_deref())?);
        let youtube_timeout = Duration::from_secs(settings.transcript.timeout_seconds);

        let discovery: Arc<dyn VideoDiscovery> = Arc::new(
            YoutubeSearch::new(credentials.youtube_api_key.clone(), youtube_timeout)?
                .with_base_url(settings.video_retrieval.api_base_url.clone()),
        );

        let fetcher: Arc<dyn TranscriptFetcher> = Arc::new(StrategyFetcher::from_settings(
            &settings.transcript,
            credentials.transcript_relay_url.as_deref(),
        )?);

        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiCompatibleChat::new(
            settings.llm.base_url.clone(),
            credentials.llm_api_key.clone(),
            Duration::from_secs(settings.llm.timeout_seconds),
        )?);
        let retrier = Retrier::new(settings.retry.clone(), sleeper.clone());

        info!(models = ?settings.llm.models, "Article models configured");
        let summarizer: Arc<dyn Summarizer> = Arc::new(ArticleSummarizer::new(
            ModelFallback::new(chat.clone(), retrier.clone(), settings.llm.models.clone()),
            prompts.clone(),
        ));

        let translator: Option<Arc<dyn Translator>> = if settings.needs_translation() {
            info!(language = %settings.translation.language, "Translation enabled");
            Some(Arc::new(LlmTranslator::new(
                ModelFallback::new(chat, retrier, settings.translation_models().to_vec()),
                prompts,
            )))
        } else {
            None
        };

        Ok(Self::with_components(
            discovery,
            fetcher,
            summarizer,
            translator,
            sleeper,
            OrchestratorOptions::from_settings(settings)?,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        discovery: Arc<dyn VideoDiscovery>,
        fetcher: Arc<dyn TranscriptFetcher>,
        summarizer: Arc<dyn Summarizer>,
        translator: Option<Arc<dyn Translator>>,
        sleeper: Arc<dyn Sleeper>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            discovery,
            fetcher,
            summarizer,
            translator,
            sleeper,
            options,
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run the pipeline for videos published in the last `days_back` days.
    pub async fn run(&self, channel_ids: &[String], days_back: u32) -> Result<PipelineReport> {
        self.run_at(channel_ids, days_back, Utc::now()).await
    }

    /// [`Orchestrator::run`] with an explicit clock.
    #[instrument(skip(self, channel_ids, now), fields(channels = channel_ids.len()))]
    pub async fn run_at(
        &self,
        channel_ids: &[String],
        days_back: u32,
        now: DateTime<Utc>,
    ) -> Result<PipelineReport> {
        let channels: Vec<&str> = channel_ids
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if channels.is_empty() {
            return Err(DigestError::NoChannelsConfigured);
        }

        let published_after = cutoff_timestamp(now, days_back)?;
        info!(%published_after, "Discovering videos");

        let mut report = PipelineReport {
            published_after: published_after.clone(),
            channels: channels.len(),
            ..Default::default()
        };

        let video_ids = self.discover(&channels, &published_after, &mut report.failures).await;
        report.videos_discovered = video_ids.len();
        info!(videos = video_ids.len(), "Discovery finished");

        for (index, video_id) in video_ids.iter().enumerate() {
            if index > 0 && !self.options.inter_item_delay.is_zero() {
                self.sleeper.sleep(self.options.inter_item_delay).await;
            }
            if let Some(article) = self.process_video(video_id, &mut report.failures).await {
                report.articles.push(article);
            }
        }

        info!(
            articles = report.articles.len(),
            transcript_failures = report.failures.transcripts.len(),
            summary_failures = report.failures.summaries.len(),
            "Pipeline run finished"
        );
        Ok(report)
    }

    /// Union of every channel's videos, first occurrence wins.
    async fn discover(
        &self,
        channels: &[&str],
        published_after: &str,
        failures: &mut FailureReport,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut video_ids = Vec::new();

        for channel in channels {
            let found = self.discovery.list_recent_videos(channel, published_after).await;
            if found.is_empty() {
                warn!(channel_id = %channel, "Channel yielded no videos");
                failures.zero_yield_channels.push(channel.to_string());
                continue;
            }
            for id in found {
                if seen.insert(id.clone()) {
                    video_ids.push(id);
                }
            }
        }

        video_ids
    }

    #[instrument(skip(self, failures))]
    async fn process_video(&self, video_id: &str, failures: &mut FailureReport) -> Option<String> {
        let transcript = match self
            .fetcher
            .fetch(video_id, &self.options.transcript_language)
            .await
        {
            TranscriptResult::Ok(text) => text,
            TranscriptResult::Failed(reason) => {
                warn!(reason = %reason, "Skipping video without transcript");
                failures.transcripts.push(TranscriptFailureRecord {
                    video_id: video_id.to_string(),
                    reason,
                });
                return None;
            }
        };

        let article = match self
            .summarizer
            .summarize(&transcript, &self.options.source_language)
            .await
        {
            Ok(article) => article,
            Err(e) => {
                warn!(category = e.category(), error = %e, "Summarization failed");
                failures.summaries.push(FailureRecord::new(video_id, &e));
                return None;
            }
        };

        let (Some(translator), Some(language)) =
            (&self.translator, &self.options.translation_language)
        else {
            return Some(article);
        };

        match translator.translate(&article, language).await {
            Ok(translated) => Some(translated),
            Err(e) => {
                warn!(category = e.category(), error = %e, "Translation failed, keeping original");
                failures.translations.push(FailureRecord::new(video_id, &e));
                Some(article)
            }
        }
    }
}
