//! Structured-transcript strategy over YouTube's player API.

use super::timedtext::parse_json3;
use super::{select_track, CaptionTrack, TranscriptFailure, TranscriptResult, TranscriptStrategy};
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";
const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "20.10.38";

/// Player API strategy, optionally routed through a relay.
pub struct InnertubeStrategy {
    client: reqwest::Client,
    base_url: String,
    name: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

impl InnertubeStrategy {
    /// Direct connection.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: YOUTUBE_BASE_URL.to_string(),
            name: "innertube",
        })
    }

    /// All traffic goes through the given HTTP(S) relay.
    pub fn via_relay(relay_url: &str, timeout: Duration) -> Result<Self> {
        let proxy = reqwest::Proxy::all(relay_url).map_err(|e| {
            DigestError::Config(format!("Invalid transcript relay URL '{}': {}", relay_url, e))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .proxy(proxy)
            .build()?;
        Ok(Self {
            client,
            base_url: YOUTUBE_BASE_URL.to_string(),
            name: "innertube-relay",
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn player_response(&self, video_id: &str) -> Result<PlayerResponse> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": CLIENT_NAME,
                    "clientVersion": CLIENT_VERSION,
                    "hl": "en"
                }
            },
            "videoId": video_id
        });

        let resp = self
            .client
            .post(format!("{}/youtubei/v1/player", self.base_url))
            .query(&[("prettyPrint", "false")])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DigestError::RateLimited(
                "YouTube is rate limiting player requests".to_string(),
            ));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(DigestError::YouTubeApi {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<PlayerResponse>().await?)
    }

    async fn download_track(&self, track: &CaptionTrack) -> Result<String> {
        let mut url = Url::parse(&track.base_url)
            .map_err(|e| DigestError::TranscriptParse(format!("bad caption URL: {}", e)))?;
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "fmt")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("fmt", "json3");

        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }

    async fn try_fetch(&self, video_id: &str, language: &str) -> Result<TranscriptResult> {
        let player = self.player_response(video_id).await?;

        if let Some(status) = &player.playability_status {
            if status.status != "OK" {
                let reason = status.reason.as_deref().unwrap_or("no reason given");
                return Ok(TranscriptResult::Failed(TranscriptFailure::FetchError(
                    format!("VideoUnplayable: {} ({})", status.status, reason),
                )));
            }
        }

        let tracks = match player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .map(|r| r.caption_tracks)
        {
            Some(tracks) if !tracks.is_empty() => tracks,
            _ => return Ok(TranscriptResult::Failed(TranscriptFailure::Disabled)),
        };

        let Some(track) = select_track(&tracks, language) else {
            debug!(
                available = ?tracks.iter().map(|t| t.language_code.as_str()).collect::<Vec<_>>(),
                "No caption track in requested language"
            );
            return Ok(TranscriptResult::Failed(TranscriptFailure::NotFound));
        };

        let body = self.download_track(track).await?;
        let segments = parse_json3(&body)?;
        Ok(TranscriptResult::from_segments(&segments))
    }
}

#[async_trait]
impl TranscriptStrategy for InnertubeStrategy {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(skip(self))]
    async fn fetch(&self, video_id: &str, language: &str) -> TranscriptResult {
        self.try_fetch(video_id, language)
            .await
            .unwrap_or_else(|e| TranscriptResult::Failed(TranscriptFailure::from_error(&e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy(server: &MockServer) -> InnertubeStrategy {
        InnertubeStrategy::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    fn player_body(tracks: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {
                "playerCaptionsTracklistRenderer": {"captionTracks": tracks}
            }
        })
    }

    #[tokio::test]
    async fn test_fetches_and_joins_json3_track() {
        let server = MockServer::start().await;
        let tracks = serde_json::json!([
            {"baseUrl": format!("{}/api/timedtext?v=abc&lang=en&fmt=srv3", server.uri()), "languageCode": "en"}
        ]);

        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .and(body_partial_json(serde_json::json!({"videoId": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_body(tracks)))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .and(query_param("fmt", "json3"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [
                    {"tStartMs": 0, "dDurationMs": 900, "segs": [{"utf8": "Hello"}]},
                    {"tStartMs": 900, "dDurationMs": 900, "segs": [{"utf8": "from"}, {"utf8": " Rust"}]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = strategy(&server).fetch("abc", "en").await;
        assert_eq!(result, TranscriptResult::Ok("Hello from Rust".to_string()));
    }

    #[tokio::test]
    async fn test_missing_captions_means_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playabilityStatus": {"status": "OK"}
            })))
            .mount(&server)
            .await;

        let result = strategy(&server).fetch("abc", "en").await;
        assert_eq!(result, TranscriptResult::Failed(TranscriptFailure::Disabled));
    }

    #[tokio::test]
    async fn test_other_language_only_means_not_found() {
        let server = MockServer::start().await;
        let tracks = serde_json::json!([
            {"baseUrl": format!("{}/api/timedtext?lang=ja", server.uri()), "languageCode": "ja"}
        ]);
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_body(tracks)))
            .mount(&server)
            .await;

        let result = strategy(&server).fetch("abc", "en").await;
        assert_eq!(result, TranscriptResult::Failed(TranscriptFailure::NotFound));
    }

    #[tokio::test]
    async fn test_http_errors_become_fetch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(429))
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
    async fn test_unplayable_video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "playabilityStatus": {"status": "LOGIN_REQUIRED", "reason": "Sign in to confirm you're not a bot"}
            })))
            .mount(&server)
            .await;

        match strategy(&server).fetch("abc", "en").await {
            TranscriptResult::Failed(TranscriptFailure::FetchError(detail)) => {
                assert!(detail.contains("LOGIN_REQUIRED"), "got: {detail}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_relay_url_is_a_config_error() {
        let err = InnertubeStrategy::via_relay("not a url", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }
}
