//! Recent-video discovery through the YouTube Data API search endpoint.

use crate::error::{DigestError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE: &str = "50";

/// Source of recently published video ids for a channel.
#[async_trait]
pub trait VideoDiscovery: Send + Sync {
    /// Video ids published after `published_after` (ISO-8601, `Z` suffix).
    ///
    /// Fail-soft: any error yields an empty list.
    async fn list_recent_videos(&self, channel_id: &str, published_after: &str) -> Vec<String>;
}

/// Client for the `search` endpoint.
pub struct YoutubeSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

impl YoutubeSearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Follow continuation tokens until the last page.
    pub async fn search(&self, channel_id: &str, published_after: &str) -> Result<Vec<String>> {
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self
                .client
                .get(format!("{}/search", self.base_url))
                .query(&[
                    ("part", "id"),
                    ("channelId", channel_id),
                    ("publishedAfter", published_after),
                    ("type", "video"),
                    ("order", "date"),
                    ("maxResults", PAGE_SIZE),
                    ("key", self.api_key.as_str()),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let resp = request.send().await?;
            let status = resp.status();
            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(DigestError::YouTubeApi {
                    status: status.as_u16(),
                    message,
                });
            }

            let page: SearchPage = resp.json().await?;
            pages += 1;
            video_ids.extend(page.items.into_iter().filter_map(|item| item.id.video_id));
            debug!(page = pages, total = video_ids.len(), "Fetched search page");

            match page.next_page_token {
                Some(next) if !next.is_empty() && page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next);
                }
                _ => break,
            }
        }

        Ok(video_ids)
    }
}

#[async_trait]
impl VideoDiscovery for YoutubeSearch {
    #[instrument(skip(self))]
    async fn list_recent_videos(&self, channel_id: &str, published_after: &str) -> Vec<String> {
        match self.search(channel_id, published_after).await {
            Ok(ids) => {
                info!(count = ids.len(), "Discovered recent videos");
                ids
            }
            Err(e) => {
                warn!(category = e.category(), error = %e, "Video discovery failed for channel");
                Vec::new()
            }
        }
    }
}
