//! Outbound notifications
//!
//! Services hand a [`Notification`] to the [`NotificationDispatcher`] and move
//! on; a background worker delivers it through a [`Notifier`]. Delivery
//! failures are logged, never returned to the request that triggered them.

pub mod dispatcher;
pub mod resend;
pub mod templates;

use async_trait::async_trait;
use serde::Serialize;

pub use dispatcher::NotificationDispatcher;
pub use resend::{ResendConfig, ResendNotifier};
pub use templates::{SIGNUP_TEMPLATE, render_template};

/// A message to one recipient, rendered from a named template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub template: String,
    pub data: serde_json::Value,
}

/// Notification error types
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Template placeholder has no value: {0}")]
    MissingValue(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Delivery channel for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that only logs; used when no email provider is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        // Body is rendered so template problems surface in development too
        let body = render_template(&notification.template, &notification.data)?;
        tracing::info!(
            "Notification (not delivered, no email provider): to={}, subject={:?}, template={}, {} bytes",
            notification.to,
            notification.subject,
            notification.template,
            body.len()
        );
        Ok(())
    }
}
