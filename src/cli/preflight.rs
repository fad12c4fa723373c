//! Pre-flight checks before any network traffic.
//!
//! Validates configuration, credentials and external tools so a run fails
//! on startup rather than halfway through a batch.

use crate::config::{CredentialRequirements, Credentials, Settings};
use crate::error::{DigestError, Result};
use std::process::Command;

/// What is about to run.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Full pipeline; `email` is false with `--no-email`.
    Run { email: bool },
    /// Channel discovery only.
    Discover,
    /// Transcript fetch only; no keys needed.
    Transcript,
}

/// Credentials each operation cannot do without.
pub fn requirements(operation: Operation, settings: &Settings) -> CredentialRequirements {
    match operation {
        Operation::Run { email } => CredentialRequirements {
            youtube_key: true,
            llm_key: !settings.model_server.managed,
            email,
        },
        Operation::Discover => CredentialRequirements {
            youtube_key: true,
            llm_key: false,
            email: false,
        },
        Operation::Transcript => CredentialRequirements {
            youtube_key: false,
            llm_key: false,
            email: false,
        },
    }
}

/// Run pre-flight checks and collect credentials from the environment.
pub fn check(operation: Operation, settings: &Settings) -> Result<Credentials> {
    check_with(operation, settings, |name| std::env::var(name).ok())
}

/// [`check`] with an injectable environment.
pub fn check_with<F>(operation: Operation, settings: &Settings, lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    if let Operation::Run { .. } = operation {
        settings.validate()?;
        if settings.model_server.managed {
            check_tool(&settings.model_server.command)?;
        }
    }
    Credentials::from_lookup(lookup, requirements(operation, settings))
}

/// Check that an external tool can be found.
fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DigestError::Config(format!(
            "model_server.command '{}' was not found in PATH",
            name
        ))),
        Err(e) => Err(DigestError::Config(format!("{}: {}", name, e))),
    }
}
