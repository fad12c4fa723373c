//! Discover command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::discovery::YoutubeSearch;
use crate::orchestrator::cutoff_timestamp;
use anyhow::Result;
use chrono::Utc;
use std::time::Duration;

/// Run the discover command.
pub async fn run_discover(channel_id: &str, days_back: Option<u32>, settings: Settings) -> Result<()> {
    let credentials = preflight::check(Operation::Discover, &settings)?;
    let days = days_back.unwrap_or(settings.video_retrieval.published_after_days);
    let published_after = cutoff_timestamp(Utc::now(), days)?;

    let search = YoutubeSearch::new(
        credentials.youtube_api_key,
        Duration::from_secs(settings.transcript.timeout_seconds),
    )?
    .with_base_url(settings.video_retrieval.api_base_url.clone());

    // Errors are surfaced here, unlike the fail-soft pipeline path
    let video_ids = search.search(channel_id, &published_after).await?;

    if video_ids.is_empty() {
        Output::warning(&format!(
            "No videos on {} published after {}",
            channel_id, published_after
        ));
        return Ok(());
    }

    Output::header(&format!("{} video(s) since {}", video_ids.len(), published_after));
    for id in &video_ids {
        Output::list_item(&format!("{}  https://www.youtube.com/watch?v={}", id, id));
    }
    Ok(())
}
