//! CLI command implementations.

mod config;
mod discover;
mod run;
mod transcript;

pub use config::run_config;
pub use discover::run_discover;
pub use run::run_pipeline;
pub use transcript::run_transcript;
