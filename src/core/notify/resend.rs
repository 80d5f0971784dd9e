//! Email delivery through the Resend HTTP API

use async_trait::async_trait;
use serde::Serialize;

use super::{Notification, Notifier, NotifyError, render_template};

/// Resend email endpoint
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Resend configuration
#[derive(Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub endpoint: String,
}

impl std::fmt::Debug for ResendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendConfig")
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Split a comma separated env value, dropping blanks
pub fn parse_address_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            from: from.into(),
            cc: Vec::new(),
            bcc: Vec::new(),
            endpoint: RESEND_API_URL.to_string(),
        }
    }

    /// Read `RESEND_*` variables; `None` unless an API key is set
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let from = std::env::var("RESEND_FROM").unwrap_or_default();

        let mut config = Self::new(api_key, from);
        config.cc = std::env::var("RESEND_CC")
            .map(|v| parse_address_list(&v))
            .unwrap_or_default();
        config.bcc = std::env::var("RESEND_BCC")
            .map(|v| parse_address_list(&v))
            .unwrap_or_default();
        Some(config)
    }

    /// Override the API endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    cc: &'a [String],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    bcc: &'a [String],
    subject: &'a str,
    html: String,
}

/// Notifier backed by Resend
#[derive(Clone)]
pub struct ResendNotifier {
    config: ResendConfig,
    client: reqwest::Client,
}

impl ResendNotifier {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_request<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Result<SendEmailRequest<'a>, NotifyError> {
        let html = render_template(&notification.template, &notification.data)?;

        Ok(SendEmailRequest {
            from: &self.config.from,
            to: vec![notification.to.as_str()],
            cc: &self.config.cc,
            bcc: &self.config.bcc,
            subject: &notification.subject,
            html,
        })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let request = self.build_request(notification)?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Resend accepted message to {}", notification.to);
        Ok(())
    }
}
