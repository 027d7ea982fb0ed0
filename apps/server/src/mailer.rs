//! # Email Delivery
//!
//! Thin client for a Resend-compatible transactional email API:
//!
//! ```text
//! POST {api_base}/emails
//! Authorization: Bearer <api_key>
//! { "from": "...", "to": ["..."], "subject": "...", "html": "..." }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EmailConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email is not configured (set email.api_key and email.from)")]
    NotConfigured,

    #[error("No digest recipients configured")]
    NoRecipients,

    #[error("Email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    from: Option<String>,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Mailer {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            from: config.from.clone().filter(|f| !f.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some()
    }

    /// Sends one HTML message to every recipient.
    pub async fn send(&self, to: &[String], subject: &str, html: &str) -> Result<(), MailError> {
        let (Some(api_key), Some(from)) = (&self.api_key, &self.from) else {
            return Err(MailError::NotConfigured);
        };
        if to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        debug!(recipients = to.len(), subject = %subject, "Sending email");
        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(api_key)
            .json(&OutgoingEmail {
                from,
                to,
                subject,
                html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Email provider returned an error");
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(recipients = to.len(), "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_config(api_key: Option<&str>, from: Option<&str>) -> EmailConfig {
        EmailConfig {
            api_base: "http://127.0.0.1:9/".to_string(),
            api_key: api_key.map(str::to_string),
            from: from.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_refuses() {
        let mailer = Mailer::new(&email_config(None, Some("loja@example.com"))).unwrap();
        assert!(!mailer.is_configured());
        let err = mailer.send(&["a@example.com".to_string()], "s", "<p>x</p>").await;
        assert!(matches!(err, Err(MailError::NotConfigured)));

        let blank = Mailer::new(&email_config(Some("  "), Some("loja@example.com"))).unwrap();
        assert!(!blank.is_configured());
    }

    #[tokio::test]
    async fn test_empty_recipients_rejected_before_request() {
        let mailer = Mailer::new(&email_config(Some("re_test"), Some("loja@example.com"))).unwrap();
        assert!(mailer.is_configured());
        assert_eq!(mailer.api_base, "http://127.0.0.1:9");
        let err = mailer.send(&[], "s", "<p>x</p>").await;
        assert!(matches!(err, Err(MailError::NoRecipients)));
    }

    #[test]
    fn test_payload_shape() {
        let to = vec!["a@example.com".to_string()];
        let json = serde_json::to_value(OutgoingEmail {
            from: "Loja <loja@example.com>",
            to: &to,
            subject: "Resumo",
            html: "<p>ok</p>",
        })
        .unwrap();
        assert_eq!(json["to"][0], "a@example.com");
        assert_eq!(json["subject"], "Resumo");
    }
}
