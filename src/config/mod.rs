//! Configuration module for tubedigest.
//!
//! Handles loading settings, prompt templates and environment credentials.

mod credentials;
mod prompts;
mod settings;

pub use credentials::{CredentialRequirements, Credentials, EmailCredentials};
pub use prompts::{ArticlePrompts, ChatPrompt, Prompts, TranslationPrompts};
pub use settings::{
    EmailSettings, GeneralSettings, LlmSettings, ModelServerSettings, PipelineSettings,
    PromptSettings, Settings, TranscriptSettings, TranslationSettings, VideoRetrievalSettings,
};
