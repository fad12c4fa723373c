//! Error types for tubedigest.

use thiserror::Error;

/// Library-level error type for tubedigest operations.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),

    #[error("No YouTube channel IDs configured")]
    NoChannelsConfigured,

    #[error("No candidate models configured (llm.models is empty)")]
    NoModelsConfigured,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YouTube API error: {status} - {message}")]
    YouTubeApi { status: u16, message: String },

    #[error("Transcript parse error: {0}")]
    TranscriptParse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("LLM provider error: {0}")]
    Llm(String),

    #[error("All {attempts} candidate models exhausted; last error: {last}")]
    AllModelsExhausted {
        attempts: usize,
        last: Box<DigestError>,
    },

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Model server error: {0}")]
    ModelServer(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DigestError {
    /// Stable category name of the error, used for retry classification
    /// and for failure records.
    pub fn category(&self) -> &'static str {
        match self {
            DigestError::Config(_) => "ConfigError",
            DigestError::MissingCredential(_) => "MissingCredential",
            DigestError::NoChannelsConfigured => "NoChannelsConfigured",
            DigestError::NoModelsConfigured => "NoModelsConfigured",
            DigestError::Io(_) => "IoError",
            DigestError::Json(_) => "JsonError",
            DigestError::TomlParse(_) => "TomlParseError",
            DigestError::Http(_) => "HttpError",
            DigestError::YouTubeApi { .. } => "YouTubeApiError",
            DigestError::TranscriptParse(_) => "TranscriptParseError",
            DigestError::RateLimited(_) => "RateLimitError",
            DigestError::Llm(_) => "LlmError",
            DigestError::AllModelsExhausted { .. } => "AllModelsExhausted",
            DigestError::Email(_) => "EmailError",
            DigestError::ModelServer(_) => "ModelServerError",
            DigestError::InvalidInput(_) => "InvalidInput",
        }
    }

    /// Whether this error means the pipeline could not start at all.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DigestError::Config(_)
                | DigestError::MissingCredential(_)
                | DigestError::NoChannelsConfigured
                | DigestError::NoModelsConfigured
        )
    }
}

/// Result type alias for tubedigest operations.
pub type Result<T> = std::result::Result<T, DigestError>;
