//! Digest delivery over SMTP.

use crate::config::{EmailCredentials, EmailSettings};
use crate::error::{DigestError, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

/// Who a digest is sent from and to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddresses {
    pub sender: String,
    pub recipient: String,
}

impl From<&EmailCredentials> for EmailAddresses {
    fn from(creds: &EmailCredentials) -> Self {
        Self {
            sender: creds.sender.clone(),
            recipient: creds.recipient.clone(),
        }
    }
}

/// Final stage of a run; errors propagate to the operator.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn send(&self, markdown: &str, addresses: &EmailAddresses) -> Result<()>;
}

/// Render GitHub-flavoured Markdown to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = comrak::Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    comrak::markdown_to_html(markdown, &options)
}

/// Build a `multipart/alternative` message with plain and HTML bodies.
pub fn build_message(markdown: &str, subject: &str, addresses: &EmailAddresses) -> Result<Message> {
    let parse = |raw: &str| {
        raw.parse::<Mailbox>()
            .map_err(|e| DigestError::Email(format!("invalid address '{}': {}", raw, e)))
    };

    Message::builder()
        .from(parse(&addresses.sender)?)
        .to(parse(&addresses.recipient)?)
        .subject(subject)
        .multipart(MultiPart::alternative_plain_html(
            markdown.to_string(),
            markdown_to_html(markdown),
        ))
        .map_err(|e| DigestError::Email(e.to_string()))
}

/// Implicit-TLS SMTP delivery with login credentials.
pub struct EmailDelivery {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    subject: String,
}

impl EmailDelivery {
    pub fn new(settings: &EmailSettings, credentials: &EmailCredentials) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| DigestError::Email(format!("SMTP relay '{}': {}", settings.smtp_host, e)))?
            .port(settings.smtp_port)
            .credentials(SmtpCredentials::new(
                credentials.sender.clone(),
                credentials.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            subject: settings.subject.clone(),
        })
    }
}

#[async_trait]
impl Delivery for EmailDelivery {
    #[instrument(skip(self, markdown, addresses), fields(recipient = %addresses.recipient))]
    async fn send(&self, markdown: &str, addresses: &EmailAddresses) -> Result<()> {
        let message = build_message(markdown, &self.subject, addresses)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DigestError::Email(e.to_string()))?;
        info!("Digest email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses() -> EmailAddresses {
        EmailAddresses {
            sender: "Digest Bot <bot@example.com>".into(),
            recipient: "reader@example.com".into(),
        }
    }

    #[test]
    fn test_markdown_to_html_extensions() {
        let html = markdown_to_html("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~ https://example.com");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("<a href=\"https://example.com\">"));
    }

    #[test]
    fn test_message_has_plain_and_html_parts() {
        let message = build_message("# Hello\n\nworld", "Daily digest", &addresses()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Daily digest"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("<h1>Hello</h1>"));
    }

    #[test]
    fn test_invalid_address_is_an_email_error() {
        let bad = EmailAddresses {
            sender: "not an address".into(),
            recipient: "reader@example.com".into(),
        };
        let err = build_message("x", "s", &bad).unwrap_err();
        assert_eq!(err.category(), "EmailError");
    }

    #[tokio::test]
    async fn test_transport_builds_without_connecting() {
        let creds = EmailCredentials {
            sender: "bot@example.com".into(),
            password: "app-password".into(),
            recipient: "reader@example.com".into(),
        };
        assert!(EmailDelivery::new(&EmailSettings::default(), &creds).is_ok());
    }
}
