//! Credentials collected from the environment at startup.

use crate::error::{DigestError, Result};

/// Secrets needed by a pipeline run.
///
/// Built once in `main` and handed to the components that need it.
#[derive(Clone, Default)]
pub struct Credentials {
    pub youtube_api_key: String,
    /// Absent for a local model server that needs no key.
    pub llm_api_key: Option<String>,
    pub email: Option<EmailCredentials>,
    pub transcript_relay_url: Option<String>,
}

/// Sender/recipient pair plus the sender's SMTP password.
#[derive(Clone)]
pub struct EmailCredentials {
    pub sender: String,
    pub password: String,
    pub recipient: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("youtube_api_key", &"<redacted>")
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<redacted>"))
            .field("email", &self.email.as_ref().map(|e| &e.recipient))
            .field("transcript_relay_url", &self.transcript_relay_url.is_some())
            .finish()
    }
}

/// What a command needs from the environment.
#[derive(Debug, Clone, Copy)]
pub struct CredentialRequirements {
    pub youtube_key: bool,
    pub llm_key: bool,
    pub email: bool,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env(requirements: CredentialRequirements) -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), requirements)
    }

    /// Read credentials through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F, requirements: CredentialRequirements) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| DigestError::MissingCredential(name.to_string()))
        };

        let youtube_api_key = if requirements.youtube_key {
            require("YOUTUBE_API_KEY")?
        } else {
            get("YOUTUBE_API_KEY").unwrap_or_default()
        };

        let llm_api_key = get("LLM_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        if requirements.llm_key && llm_api_key.is_none() {
            return Err(DigestError::MissingCredential(
                "LLM_API_KEY (or OPENAI_API_KEY)".to_string(),
            ));
        }

        let email = if requirements.email {
            let recipient = get("RECIPIENT_EMAIL")
                .or_else(|| get("RECEPIENT_EMAIL"))
                .ok_or_else(|| DigestError::MissingCredential("RECIPIENT_EMAIL".to_string()))?;
            Some(EmailCredentials {
                sender: require("SENDER_EMAIL")?,
                password: require("SENDER_PASSWORD")?,
                recipient,
            })
        } else {
            None
        };

        Ok(Self {
            youtube_api_key,
            llm_api_key,
            email,
            transcript_relay_url: get("TRANSCRIPT_RELAY_URL"),
        })
    }
}
