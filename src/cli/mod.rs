//! CLI module for tubedigest.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{headline, Output};

use clap::{Parser, Subcommand};

/// tubedigest - daily YouTube digests
///
/// Finds new videos on your channels, rewrites their transcripts into
/// articles and emails you the result.
#[derive(Parser, Debug)]
#[command(name = "tubedigest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TUBEDIGEST_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: discover, transcribe, write, save and email
    Run {
        /// Look back this many days instead of the configured value
        #[arg(short, long)]
        days_back: Option<u32>,

        /// Do not send the digest by email
        #[arg(long)]
        no_email: bool,

        /// Do not write the digest to the output directory
        #[arg(long)]
        no_save: bool,
    },

    /// List recent video ids for one channel
    Discover {
        /// YouTube channel id (UC...)
        channel_id: String,

        /// Look back this many days instead of the configured value
        #[arg(short, long)]
        days_back: Option<u32>,
    },

    /// Fetch and print the transcript of one video
    Transcript {
        /// YouTube video id
        video_id: String,

        /// Caption language (defaults to the configured one)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from(["tubedigest", "-vv", "run", "--days-back", "3", "--no-email"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                days_back,
                no_email,
                no_save,
            } => {
                assert_eq!(days_back, Some(3));
                assert!(no_email);
                assert!(!no_save);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_init() {
        let cli = Cli::try_parse_from(["tubedigest", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }
}
