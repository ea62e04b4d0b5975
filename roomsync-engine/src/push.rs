//! Push delivery seam. The real sender is the platform's push service; the
//! core only shapes the note and classifies failures as retriable or not.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One rendered push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNote {
    /// Delivery address registered by the recipient's device.
    pub address: String,
    /// Notification title, derived from the sender's display name.
    pub title: String,
    /// Notification body: the text for text messages, a fixed label for
    /// everything else. Raw payload structure never appears here.
    pub body: String,
    /// Room the message belongs to, for client-side routing on tap.
    pub room_id: Uuid,
    /// Message author, for client-side grouping.
    pub sender_id: Uuid,
}

/// Push delivery failures.
#[derive(Debug, Error)]
pub enum PushError {
    /// Worth retrying: the trigger will be redelivered and the ledger was
    /// not committed.
    #[error("transient push failure: {0}")]
    Transient(String),
    /// Not worth retrying (bad address, revoked token).
    #[error("permanent push failure: {0}")]
    Permanent(String),
}

impl PushError {
    /// Whether a redelivered trigger could still succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Sends one push notification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Delivers `note`; failures are surfaced for the dispatcher to classify.
    async fn send(&self, note: &PushNote) -> Result<(), PushError>;
}

/// Recording sender for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryPushSender {
    sent: Mutex<Vec<PushNote>>,
}

impl MemoryPushSender {
    /// A sender that records every note it is given.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    pub async fn sent(&self) -> Vec<PushNote> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PushSender for MemoryPushSender {
    async fn send(&self, note: &PushNote) -> Result<(), PushError> {
        self.sent.lock().await.push(note.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retriable() {
        assert!(PushError::Transient("timeout".into()).is_retriable());
        assert!(!PushError::Permanent("revoked token".into()).is_retriable());
    }

    #[tokio::test]
    async fn memory_sender_records_in_order() {
        let sender = MemoryPushSender::new();
        let note = PushNote {
            address: "token".into(),
            title: "New message from Noa".into(),
            body: "sent an order".into(),
            room_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
        };

        sender.send(&note).await.unwrap();
        let sent = sender.sent().await;
        assert_eq!(sent, vec![note]);
    }
}
