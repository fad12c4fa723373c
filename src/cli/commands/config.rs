//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: &PathBuf, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                Output::warning(&format!(
                    "{} already exists. Use --force to overwrite.",
                    config_path.display()
                ));
                return Ok(());
            }

            Settings::default().save_to(config_path)?;
            Output::success(&format!("Wrote default config to {}", config_path.display()));
            Output::info("Add your channel ids under youtube_channel_ids, then run 'tubedigest run'.");
        }
    }

    Ok(())
}
