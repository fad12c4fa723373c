//! tubedigest CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tubedigest::cli::{commands, Cli, Commands};
use tubedigest::config::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Credentials may live in a .env file next to the working directory
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .as_deref()
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tubedigest={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Run {
            days_back,
            no_email,
            no_save,
        } => {
            commands::run_pipeline(*days_back, *no_email, *no_save, settings).await?;
        }

        Commands::Discover {
            channel_id,
            days_back,
        } => {
            commands::run_discover(channel_id, *days_back, settings).await?;
        }

        Commands::Transcript { video_id, language } => {
            commands::run_transcript(video_id, language.clone(), settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &config_path, settings)?;
        }
    }

    Ok(())
}
