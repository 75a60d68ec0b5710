//! Outbound notifications (host emails, emergency texts).
//!
//! Delivery is a side effect: callers go through [`notify_best_effort`] so a
//! failing provider never fails the request that triggered it.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub channel: Channel,
    /// Email address or phone number.
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Trait for notification delivery, enabling mock testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AppError>;
}

/// Notifier that records deliveries in the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AppError> {
        tracing::info!(
            channel = ?notification.channel,
            to = %notification.to,
            subject = %notification.subject,
            "Notification dispatched"
        );
        Ok(())
    }
}

/// Send a notification, logging instead of propagating failures.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.send(&notification).await {
        tracing::warn!(
            "Failed to send {:?} notification to {}: {e}",
            notification.channel,
            notification.to
        );
    }
}
