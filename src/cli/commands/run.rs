//! Run command: the full daily pipeline.

use crate::cli::preflight::{self, Operation};
use crate::cli::{headline, Output};
use crate::config::Settings;
use crate::delivery::{Delivery, EmailAddresses, EmailDelivery};
use crate::digest::{self, PayloadKind};
use crate::orchestrator::{Orchestrator, PipelineReport};
use crate::retry::TokioSleeper;
use crate::server::ModelServerGuard;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Run the run command.
pub async fn run_pipeline(
    days_back: Option<u32>,
    no_email: bool,
    no_save: bool,
    settings: Settings,
) -> Result<()> {
    let credentials = match preflight::check(Operation::Run { email: !no_email }, &settings) {
        Ok(credentials) => credentials,
        Err(e) => {
            Output::error(&e.to_string());
            Output::info("Check your config file ('tubedigest config path') and .env file.");
            return Err(e.into());
        }
    };
    let days = days_back.unwrap_or(settings.video_retrieval.published_after_days);

    // Held until the end of this function, so the server stops on every exit path
    let server = if settings.model_server.managed {
        Output::info(&format!("Starting {}...", settings.model_server.command));
        Some(ModelServerGuard::start(&settings.model_server).await?)
    } else {
        None
    };

    let orchestrator = Orchestrator::new(&settings, &credentials, Arc::new(TokioSleeper))?;

    Output::info(&format!(
        "Checking {} channel(s) for videos from the last {} day(s)",
        settings.youtube_channel_ids.len(),
        days
    ));
    let report = orchestrator.run(&settings.youtube_channel_ids, days).await?;
    print_report(&report);

    let payload = digest::compose(&report);
    if payload.kind == PayloadKind::FailureNotice {
        Output::warning("No articles were produced; delivering a failure notice instead");
    }

    if !no_save {
        let path = digest::save_to_file(&payload.markdown, &settings.output_dir())?;
        Output::success(&format!("Saved digest to {}", path.display()));
    }

    if !no_email {
        let email = credentials
            .email
            .as_ref()
            .context("email credentials missing after preflight")?;
        let delivery = EmailDelivery::new(&settings.email, email)?;
        delivery
            .send(&payload.markdown, &EmailAddresses::from(email))
            .await?;
        Output::success(&format!("Emailed digest to {}", email.recipient));
    }

    if let Some(server) = server {
        server.shutdown();
    }

    Output::success("Done.");
    Ok(())
}

fn print_report(report: &PipelineReport) {
    Output::header("Pipeline report");
    Output::kv("Published after", &report.published_after);
    Output::kv("Videos discovered", &report.videos_discovered.to_string());
    Output::kv("Articles written", &report.articles.len().to_string());

    for article in &report.articles {
        Output::list_item(&headline(article, 70));
    }

    let failures = &report.failures;
    if !failures.zero_yield_channels.is_empty() {
        Output::kv("Channels without videos", &failures.zero_yield_channels.join(", "));
    }
    for record in &failures.transcripts {
        Output::warning(&format!("{}: no transcript ({})", record.video_id, record.reason));
    }
    for record in &failures.summaries {
        Output::warning(&format!("{}: not summarized ({})", record.video_id, record.message));
    }
    for record in &failures.translations {
        Output::warning(&format!("{}: kept untranslated ({})", record.video_id, record.message));
    }
    if failures.lost_videos() > 0 {
        Output::kv("Videos skipped", &failures.lost_videos().to_string());
    }
}
