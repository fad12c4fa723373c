//! tubedigest - daily digests of new YouTube videos
//!
//! Discovers recently published videos on a set of channels, fetches their
//! transcripts, rewrites each one into a Markdown article with a language
//! model, optionally translates it, and delivers the collected articles as
//! a single digest.
//!
//! # Architecture
//!
//! - `config` - Settings, prompt templates and environment credentials
//! - `discovery` - Paginated channel search
//! - `transcript` - Transcript acquisition with ordered fallback strategies
//! - `retry` - Bounded retry with rate-limit aware backoff
//! - `llm` - OpenAI-compatible chat completions
//! - `summarizer` - Per-model retry with ordered model fallback
//! - `orchestrator` - Pipeline coordination and failure reporting
//! - `digest` - Digest composition and persistence
//! - `delivery` - Email delivery
//! - `server` - Managed local model server
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tubedigest::config::{CredentialRequirements, Credentials, Settings};
//! use tubedigest::orchestrator::Orchestrator;
//! use tubedigest::retry::TokioSleeper;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     settings.validate()?;
//!     let credentials = Credentials::from_env(CredentialRequirements {
//!         youtube_key: true,
//!         llm_key: true,
//!         email: false,
//!     })?;
//!
//!     let orchestrator = Orchestrator::new(&settings, &credentials, Arc::new(TokioSleeper))?;
//!     let report = orchestrator.run(&settings.youtube_channel_ids, 1).await?;
//!     println!("{}", tubedigest::digest::compose(&report).markdown);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod delivery;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod retry;
pub mod server;
pub mod summarizer;
pub mod transcript;

pub use error::{DigestError, Result};
