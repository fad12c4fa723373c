//! Watch-page scraping fallback.
//!
//! Downloads the HTML watch page, pulls the embedded caption track list
//! out of the player bootstrap JSON and fetches the chosen track as
//! timed-text XML.

use super::timedtext::parse_timedtext_xml;
use super::{select_track, CaptionTrack, TranscriptFailure, TranscriptResult, TranscriptStrategy};
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, instrument};

const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

/// Scrapes caption tracks from the public watch page.
pub struct PageScrapeStrategy {
    client: reqwest::Client,
    base_url: String,
    playability_regex: Regex,
}

impl PageScrapeStrategy {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)")
            .build()?;

        let playability_regex = Regex::new(
            r#""playabilityStatus":\{"status":"([A-Z_]+)"(?:,"reason":"((?:[^"\\]|\\.)*)")?"#,
        )
        .expect("Invalid regex");

        Ok(Self {
            client,
            base_url: YOUTUBE_BASE_URL.to_string(),
            playability_regex,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn watch_page(&self, video_id: &str, language: &str) -> Result<String> {
        let resp = self
            .client
            .get(format!("{}/watch", self.base_url))
            .query(&[("v", video_id)])
            .header(reqwest::header::ACCEPT_LANGUAGE, language)
            .send()
            .await?;

        if resp.status().as_u16() == 429 {
            return Err(DigestError::RateLimited(
                "YouTube is rate limiting watch page requests".to_string(),
            ));
        }
        let html = resp.error_for_status()?.text().await?;

        if html.contains("g-recaptcha") {
            return Err(DigestError::RateLimited(
                "watch page answered with a captcha".to_string(),
            ));
        }
        Ok(html)
    }

    /// Status and optional reason from the embedded player response.
    fn playability(&self, html: &str) -> Option<(String, Option<String>)> {
        let caps = self.playability_regex.captures(html)?;
        let status = caps.get(1)?.as_str().to_string();
        let reason = caps.get(2).map(|m| m.as_str().replace("\\\"", "\""));
        Some((status, reason))
    }

    async fn try_fetch(&self, video_id: &str, language: &str) -> Result<TranscriptResult> {
        let html = self.watch_page(video_id, language).await?;

        match self.playability(&html) {
            None => {
                return Err(DigestError::TranscriptParse(
                    "watch page carried no player data".to_string(),
                ))
            }
            Some((status, reason)) if status != "OK" => {
                return Ok(TranscriptResult::Failed(TranscriptFailure::FetchError(
                    format!(
                        "VideoUnplayable: {} ({})",
                        status,
                        reason.as_deref().unwrap_or("no reason given")
                    ),
                )));
            }
            Some(_) => {}
        }

        let Some(raw) = extract_json_array(&html, "\"captionTracks\":") else {
            return Ok(TranscriptResult::Failed(TranscriptFailure::Disabled));
        };
        let tracks: Vec<CaptionTrack> = serde_json::from_str(raw)
            .map_err(|e| DigestError::TranscriptParse(format!("caption track list: {}", e)))?;
        if tracks.is_empty() {
            return Ok(TranscriptResult::Failed(TranscriptFailure::Disabled));
        }

        let Some(track) = select_track(&tracks, language) else {
            return Ok(TranscriptResult::Failed(TranscriptFailure::NotFound));
        };
        debug!(language = %track.language_code, generated = track.is_generated(), "Downloading caption track");

        let xml = self
            .client
            .get(&track.base_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let segments = parse_timedtext_xml(&xml)?;
        Ok(TranscriptResult::from_segments(&segments))
    }
}

#[async_trait]
impl TranscriptStrategy for PageScrapeStrategy {
    fn name(&self) -> &str {
        "page-scrape"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, video_id: &str, language: &str) -> TranscriptResult {
        self.try_fetch(video_id, language)
            .await
            .unwrap_or_else(|e| TranscriptResult::Failed(TranscriptFailure::from_error(&e)))
    }
}

/// Slice out the JSON array that follows `key`, matching brackets and
/// skipping over string literals.
fn extract_json_array<'a>(html: &'a str, key: &str) -> Option<&'a str> {
    let after_key = html.find(key)? + key.len();
    let start = after_key + html[after_key..].find('[')?;
    if !html[after_key..start].trim().is_empty() {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in html[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy(server: &MockServer) -> PageScrapeStrategy {
        PageScrapeStrategy::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    fn watch_html(player_json: &str) -> String {
        format!(
            "<html><script>var ytInitialPlayerResponse = {};</script></html>",
            player_json
        )
    }

    #[test]
    fn test_extract_json_array_respects_strings() {
        let html = r#"x "captionTracks":[{"name":"a ] tricky [ \" one"},{"n":[1,2]}],"other":1"#;
        let raw = extract_json_array(html, "\"captionTracks\":").unwrap();
        assert_eq!(raw, r#"[{"name":"a ] tricky [ \" one"},{"n":[1,2]}]"#);
        assert!(extract_json_array("nothing here", "\"captionTracks\":").is_none());
        assert!(extract_json_array(r#""captionTracks":[{"unterminated"#, "\"captionTracks\":").is_none());
    }

    #[tokio::test]
    async fn test_scrapes_xml_track() {
        let server = MockServer::start().await;
        let player = format!(
            r#"{{"playabilityStatus":{{"status":"OK"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":[{{"baseUrl":"{}/api/timedtext?v=abc&lang=en","languageCode":"en","kind":"asr"}}]}}}}}}"#,
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "abc"))
            .and(header("accept-language", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_string(watch_html(&player)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<transcript><text start="0" dur="1">one</text><text start="1" dur="1">two &amp;amp; three</text></transcript>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server).fetch("abc", "en").await;
        assert_eq!(result, TranscriptResult::Ok("one two & three".to_string()));
    }

    #[tokio::test]
    async fn test_page_without_tracks_is_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(watch_html(
                r#"{"playabilityStatus":{"status":"OK"},"videoDetails":{}}"#,
            )))
            .mount(&server)
            .await;

        let result = strategy(&server).fetch("abc", "en").await;
        assert_eq!(result, TranscriptResult::Failed(TranscriptFailure::Disabled));
    }

    #[tokio::test]
    async fn test_captcha_page_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><form><div class="g-recaptcha" data-sitekey="x"></div></form></html>"#,
            ))
            .mount(&server)
            .await;

        match strategy(&server).fetch("abc", "en").await {
            TranscriptResult::Failed(TranscriptFailure::FetchError(detail)) => {
                assert!(detail.starts_with("RateLimitError"), "got: {detail}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unplayable_reason_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(watch_html(
                r#"{"playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}}"#,
            )))
            .mount(&server)
            .await;

        assert_eq!(
            strategy(&server).fetch("gone", "en").await,
            TranscriptResult::Failed(TranscriptFailure::FetchError(
                "VideoUnplayable: ERROR (Video unavailable)".to_string()
            ))
        );
    }
}
