//! Best-effort transcript acquisition.
//!
//! A [`StrategyFetcher`] runs a fixed, ordered list of acquisition
//! strategies and folds their outcomes into a single [`TranscriptResult`]:
//!
//! 1. the structured player API ([`InnertubeStrategy`]),
//! 2. the same API routed through an HTTP relay, when one is configured,
//! 3. a watch-page scrape with timed-text XML parsing ([`PageScrapeStrategy`]).
//!
//! Each strategy runs at most once per fetch. A video with transcripts
//! disabled ends the chain immediately; "not found" and fetch errors fall
//! through to the next strategy.

mod innertube;
mod scrape;
mod timedtext;

pub use innertube::InnertubeStrategy;
pub use scrape::PageScrapeStrategy;
pub use timedtext::{join_segments, parse_json3, parse_timedtext_xml, TranscriptSegment};

use crate::config::TranscriptSettings;
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Why no transcript could be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptFailure {
    /// The uploader turned captions off for this video.
    Disabled,
    /// No caption track in the requested language.
    NotFound,
    /// Anything else: network, parsing, blocking. Carries `"<category>: <message>"`.
    FetchError(String),
}

impl TranscriptFailure {
    /// Capture an error's category and message.
    pub fn from_error(error: &DigestError) -> Self {
        TranscriptFailure::FetchError(format!("{}: {}", error.category(), error))
    }

    /// Short reason label.
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptFailure::Disabled => "Disabled",
            TranscriptFailure::NotFound => "NotFound",
            TranscriptFailure::FetchError(_) => "FetchError",
        }
    }
}

impl std::fmt::Display for TranscriptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptFailure::FetchError(detail) => write!(f, "FetchError({})", detail),
            other => f.write_str(other.kind()),
        }
    }
}

/// Outcome of a transcript fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptResult {
    Ok(String),
    Failed(TranscriptFailure),
}

impl TranscriptResult {
    fn from_segments(segments: &[TranscriptSegment]) -> Self {
        if segments.is_empty() {
            return TranscriptResult::Failed(TranscriptFailure::from_error(
                &DigestError::TranscriptParse("caption track contained no text".to_string()),
            ));
        }
        TranscriptResult::Ok(join_segments(segments))
    }
}

/// A single way of getting a transcript.
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn fetch(&self, video_id: &str, language: &str) -> TranscriptResult;
}

/// Anything that can produce a transcript for a video.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str, language: &str) -> TranscriptResult;
}

/// Runs strategies in priority order.
pub struct StrategyFetcher {
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl StrategyFetcher {
    pub fn new(strategies: Vec<Box<dyn TranscriptStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the standard chain: direct API, relayed API (if configured), page scrape.
    pub fn from_settings(settings: &TranscriptSettings, relay_url: Option<&str>) -> Result<Self> {
        let timeout = Duration::from_secs(settings.timeout_seconds);
        let mut strategies: Vec<Box<dyn TranscriptStrategy>> =
            vec![Box::new(InnertubeStrategy::new(timeout)?)];

        if let Some(relay) = relay_url.or(settings.relay_url.as_deref()) {
            strategies.push(Box::new(InnertubeStrategy::via_relay(relay, timeout)?));
        }

        strategies.push(Box::new(PageScrapeStrategy::new(timeout)?));
        Ok(Self::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TranscriptFetcher for StrategyFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, video_id: &str, language: &str) -> TranscriptResult {
        if video_id.trim().is_empty() {
            return TranscriptResult::Failed(TranscriptFailure::from_error(
                &DigestError::InvalidInput("empty video id".to_string()),
            ));
        }

        let mut last = TranscriptFailure::FetchError("no transcript strategies configured".into());

        for strategy in &self.strategies {
            debug!(strategy = strategy.name(), "Trying transcript strategy");
            match strategy.fetch(video_id, language).await {
                TranscriptResult::Ok(text) => {
                    info!(strategy = strategy.name(), chars = text.len(), "Transcript fetched");
                    return TranscriptResult::Ok(text);
                }
                TranscriptResult::Failed(TranscriptFailure::Disabled) => {
                    warn!(strategy = strategy.name(), "Transcripts are disabled for this video");
                    return TranscriptResult::Failed(TranscriptFailure::Disabled);
                }
                TranscriptResult::Failed(failure) => {
                    warn!(strategy = strategy.name(), reason = %failure, "Transcript strategy failed, falling through");
                    last = failure;
                }
            }
        }

        TranscriptResult::Failed(last)
    }
}

/// Caption track entry as it appears in player responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `"asr"` for auto-generated tracks.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Pick the best track for `language`.
///
/// Exact language-code matches win over primary-subtag matches (`en` vs
/// `en-GB`), and manual tracks win over auto-generated ones.
pub(crate) fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let primary = |code: &str| code.split(['-', '_']).next().unwrap_or(code).to_ascii_lowercase();
    let wanted = primary(language);

    let exact = |t: &&CaptionTrack| t.language_code.eq_ignore_ascii_case(language);
    let loose = |t: &&CaptionTrack| primary(&t.language_code) == wanted;

    tracks
        .iter()
        .filter(exact)
        .min_by_key(|t| t.is_generated())
        .or_else(|| tracks.iter().filter(loose).min_by_key(|t| t.is_generated()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedStrategy {
        name: &'static str,
        result: TranscriptResult,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedStrategy {
        fn boxed(name: &'static str, result: TranscriptResult) -> (Box<dyn TranscriptStrategy>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Box::new(Self {
                name,
                result,
                calls: calls.clone(),
            });
            (strategy, calls)
        }
    }

    #[async_trait]
    impl TranscriptStrategy for ScriptedStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _video_id: &str, _language: &str) -> TranscriptResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn failed(f: TranscriptFailure) -> TranscriptResult {
        TranscriptResult::Failed(f)
    }

    #[tokio::test]
    async fn test_disabled_stops_the_chain() {
        let (first, first_calls) = ScriptedStrategy::boxed("api", failed(TranscriptFailure::Disabled));
        let (second, second_calls) =
            ScriptedStrategy::boxed("scrape", TranscriptResult::Ok("text".into()));
        let fetcher = StrategyFetcher::new(vec![first, second]);

        let result = fetcher.fetch("v1", "en").await;

        assert_eq!(result, failed(TranscriptFailure::Disabled));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_found_and_errors_fall_through() {
        let (first, _) = ScriptedStrategy::boxed("api", failed(TranscriptFailure::NotFound));
        let (second, _) = ScriptedStrategy::boxed(
            "relay",
            failed(TranscriptFailure::FetchError("HttpError: timeout".into())),
        );
        let (third, third_calls) =
            ScriptedStrategy::boxed("scrape", TranscriptResult::Ok("hello world".into()));
        let fetcher = StrategyFetcher::new(vec![first, second, third]);

        assert_eq!(
            fetcher.fetch("v1", "en").await,
            TranscriptResult::Ok("hello world".into())
        );
        assert_eq!(third_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_failure() {
        let (first, _) = ScriptedStrategy::boxed(
            "api",
            failed(TranscriptFailure::FetchError("HttpError: 403".into())),
        );
        let (second, _) = ScriptedStrategy::boxed("scrape", failed(TranscriptFailure::NotFound));
        let fetcher = StrategyFetcher::new(vec![first, second]);

        assert_eq!(
            fetcher.fetch("v1", "en").await,
            failed(TranscriptFailure::NotFound)
        );
    }

    #[tokio::test]
    async fn test_empty_video_id_makes_no_calls() {
        let (only, calls) = ScriptedStrategy::boxed("api", TranscriptResult::Ok("x".into()));
        let fetcher = StrategyFetcher::new(vec![only]);

        let result = fetcher.fetch("  ", "en").await;
        assert!(matches!(
            result,
            TranscriptResult::Failed(TranscriptFailure::FetchError(ref d)) if d.starts_with("InvalidInput")
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_settings_includes_relay_only_when_configured() {
        let settings = TranscriptSettings::default();
        let plain = StrategyFetcher::from_settings(&settings, None).unwrap();
        assert_eq!(plain.strategy_names(), vec!["innertube", "page-scrape"]);

        let relayed =
            StrategyFetcher::from_settings(&settings, Some("http://relay.example:8080")).unwrap();
        assert_eq!(
            relayed.strategy_names(),
            vec!["innertube", "innertube-relay", "page-scrape"]
        );
    }

    #[test]
    fn test_select_track_prefers_exact_manual_tracks() {
        let track = |code: &str, kind: Option<&str>| CaptionTrack {
            base_url: format!("https://example.com/{}/{}", code, kind.unwrap_or("manual")),
            language_code: code.to_string(),
            kind: kind.map(str::to_string),
        };
        let tracks = vec![
            track("en", Some("asr")),
            track("en-GB", None),
            track("en", None),
            track("de", None),
        ];

        assert_eq!(select_track(&tracks, "en").unwrap().base_url, "https://example.com/en/manual");
        assert_eq!(select_track(&tracks, "en-GB").unwrap().language_code, "en-GB");
        assert_eq!(select_track(&tracks, "de-AT").unwrap().language_code, "de");
        assert!(select_track(&tracks, "fr").is_none());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(TranscriptFailure::Disabled.to_string(), "Disabled");
        assert_eq!(
            TranscriptFailure::from_error(&DigestError::Llm("x".into())).to_string(),
            "FetchError(LlmError: LLM provider error: x)"
        );
    }
}
