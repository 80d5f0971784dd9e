//! Fire-and-forget notification dispatch

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Notification, Notifier};

/// Handle for queueing notifications to the background worker
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiving end of its queue
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a dispatcher whose worker delivers through `notifier`
    pub fn spawn(notifier: Arc<dyn Notifier>) -> (Self, JoinHandle<()>) {
        let (dispatcher, rx) = Self::channel();
        let worker = tokio::spawn(run_worker(rx, notifier));
        (dispatcher, worker)
    }

    /// Queue a notification. Never blocks and never fails the caller.
    pub fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::warn!(
                "Notification worker gone, dropping message to {}",
                e.0.to
            );
        }
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Notification>, notifier: Arc<dyn Notifier>) {
    while let Some(notification) = rx.recv().await {
        match notifier.send(&notification).await {
            Ok(()) => tracing::debug!(
                "Notification '{}' sent to {}",
                notification.template,
                notification.to
            ),
            Err(e) => tracing::warn!(
                "Failed to send notification '{}' to {}: {}",
                notification.template,
                notification.to,
                e
            ),
        }
    }

    tracing::debug!("Notification worker stopped");
}
