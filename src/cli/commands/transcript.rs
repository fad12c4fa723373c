//! Transcript command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::transcript::{StrategyFetcher, TranscriptFetcher, TranscriptResult};
use anyhow::{bail, Result};

/// Run the transcript command.
pub async fn run_transcript(video_id: &str, language: Option<String>, settings: Settings) -> Result<()> {
    let credentials = preflight::check(Operation::Transcript, &settings)?;
    let language = language.unwrap_or_else(|| settings.transcript.language.clone());

    let fetcher = StrategyFetcher::from_settings(
        &settings.transcript,
        credentials.transcript_relay_url.as_deref(),
    )?;
    Output::info(&format!(
        "Fetching '{}' transcript for {} via {}",
        language,
        video_id,
        fetcher.strategy_names().join(" -> ")
    ));

    match fetcher.fetch(video_id, &language).await {
        TranscriptResult::Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        TranscriptResult::Failed(reason) => {
            Output::error(&format!("No transcript for {}: {}", video_id, reason));
            bail!("transcript unavailable: {}", reason)
        }
    }
}
