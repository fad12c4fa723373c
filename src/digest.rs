//! Digest composition and persistence.

use crate::error::Result;
use crate::orchestrator::PipelineReport;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

/// Separator between articles in a digest.
pub const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

/// What a delivery carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Digest,
    FailureNotice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestPayload {
    pub kind: PayloadKind,
    pub markdown: String,
}

/// Join articles in order, separated by horizontal rules.
pub fn concatenate(articles: &[String]) -> String {
    articles
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(ARTICLE_SEPARATOR)
}

/// Notice sent in place of an empty digest.
pub fn failure_notice(report: &PipelineReport) -> String {
    let mut out = String::from("# No articles were produced\n\n");
    out.push_str(&format!(
        "The pipeline checked {} channel(s) for videos published after {} and found {} video(s), \
         but no article could be written.\n",
        report.channels, report.published_after, report.videos_discovered
    ));

    let details = report.failures.to_markdown();
    if !details.is_empty() {
        out.push('\n');
        out.push_str(&details);
        out.push('\n');
    }
    out
}

/// Pick the digest or a failure notice for a finished run.
pub fn compose(report: &PipelineReport) -> DigestPayload {
    let body = concatenate(&report.articles);
    if body.is_empty() {
        return DigestPayload {
            kind: PayloadKind::FailureNotice,
            markdown: failure_notice(report),
        };
    }

    let mut markdown = body;
    if !report.failures.is_empty() {
        markdown.push_str(ARTICLE_SEPARATOR);
        markdown.push_str("## Pipeline report\n\n");
        markdown.push_str(&report.failures.to_markdown());
        markdown.push('\n');
    }
    DigestPayload {
        kind: PayloadKind::Digest,
        markdown,
    }
}

/// File name for a digest written at `at`.
pub fn digest_file_name(at: DateTime<Local>) -> String {
    format!("articles_{}.md", at.format("%Y%m%d_%H%M%S"))
}

/// Write `markdown` into `dir` under a timestamped name.
pub fn save_to_file(markdown: &str, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(digest_file_name(Local::now()));
    std::fs::write(&path, markdown)?;
    info!(path = %path.display(), "Digest saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{FailureReport, TranscriptFailureRecord};
    use crate::transcript::TranscriptFailure;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn report(articles: &[&str]) -> PipelineReport {
        PipelineReport {
            published_after: "2024-05-01T00:00:00Z".into(),
            channels: 2,
            videos_discovered: 3,
            articles: articles.iter().map(|a| a.to_string()).collect(),
            failures: FailureReport::default(),
        }
    }

    #[test]
    fn test_concatenate() {
        let articles = vec!["# A\n\nbody a\n".to_string(), "  ".to_string(), "# B".to_string()];
        assert_eq!(concatenate(&articles), "# A\n\nbody a\n\n---\n\n# B");
        assert_eq!(concatenate(&[]), "");
    }

    #[test]
    fn test_zero_articles_produce_non_empty_notice() {
        let mut run = report(&[]);
        run.failures.transcripts.push(TranscriptFailureRecord {
            video_id: "v3".into(),
            reason: TranscriptFailure::Disabled,
        });

        let payload = compose(&run);

        assert_eq!(payload.kind, PayloadKind::FailureNotice);
        assert!(!payload.markdown.trim().is_empty());
        assert!(payload.markdown.contains("2024-05-01T00:00:00Z"));
        assert!(payload.markdown.contains("- `v3`: Disabled"));
    }

    #[test]
    fn test_notice_without_any_failures_is_still_non_empty() {
        let payload = compose(&report(&[]));
        assert_eq!(payload.kind, PayloadKind::FailureNotice);
        assert!(payload.markdown.starts_with("# No articles were produced"));
    }

    #[test]
    fn test_digest_with_failures_gets_appendix() {
        let clean = compose(&report(&["# One"]));
        assert_eq!(clean.kind, PayloadKind::Digest);
        assert_eq!(clean.markdown, "# One");

        let mut run = report(&["# One", "# Two"]);
        run.failures.transcripts.push(TranscriptFailureRecord {
            video_id: "v9".into(),
            reason: TranscriptFailure::NotFound,
        });
        let payload = compose(&run);
        assert!(payload.markdown.starts_with("# One\n\n---\n\n# Two\n\n---\n\n## Pipeline report"));
        assert!(payload.markdown.contains("`v9`: NotFound"));
    }

    #[test]
    fn test_file_name_and_save() {
        let at = Local.with_ymd_and_hms(2024, 5, 2, 7, 5, 9).unwrap();
        assert_eq!(digest_file_name(at), "articles_20240502_070509.md");

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("out");
        let path = save_to_file("# Digest", &dir).unwrap();
        assert!(path.starts_with(&dir));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Digest");
    }
}
