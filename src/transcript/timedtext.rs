//! Caption track payload parsing.
//!
//! Two wire formats are handled: the `json3` event stream returned when a
//! track URL is requested with `fmt=json3`, and the default timed-text XML
//! (`<transcript><text start=".." dur="..">..</text></transcript>`).

use crate::error::{DigestError, Result};
use serde::Deserialize;

/// One timed piece of caption text.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub text: String,
}

/// Join segment texts with single spaces, in original order.
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a `fmt=json3` caption payload.
pub fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>> {
    let doc: Json3Document = serde_json::from_str(body)
        .map_err(|e| DigestError::TranscriptParse(format!("invalid json3 payload: {}", e)))?;

    Ok(doc
        .events
        .into_iter()
        .filter_map(|event| {
            let raw: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = normalize_whitespace(&raw);
            (!text.is_empty()).then(|| TranscriptSegment {
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
                text,
            })
        })
        .collect())
}

/// Parse a timed-text XML caption payload.
pub fn parse_timedtext_xml(xml: &str) -> Result<Vec<TranscriptSegment>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| DigestError::TranscriptParse(format!("XML parse error: {}", e)))?;

    let segments = doc
        .descendants()
        .filter(|n| n.has_tag_name("text"))
        .filter_map(|node| {
            let raw: String = node
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect();
            // Timed-text bodies are escaped twice (`&amp;#39;`); XML parsing undid one layer.
            let text = normalize_whitespace(&decode_entities(&raw));
            if text.is_empty() {
                return None;
            }
            let attr = |name: &str| {
                node.attribute(name)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.0)
            };
            Some(TranscriptSegment {
                start: attr("start"),
                duration: attr("dur"),
                text,
            })
        })
        .collect();

    Ok(segments)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the HTML entities YouTube leaves in caption text.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
