//! Idempotent server-side notification dispatch.
//!
//! The store's trigger infrastructure delivers "message appended" events
//! at-least-once; the ledger gate turns that into at-most-one push per
//! message. Commit order is the load-bearing detail: the ledger entry is
//! written only after a successful send, so a failed send leaves the gate
//! open for the redelivered trigger. The remaining window — a crash between
//! send and commit — degrades to at-least-once and is logged as such.

use std::sync::Arc;

use metrics::counter;
use shared::models::Message;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::directory::{DirectoryError, RecipientDirectory};
use crate::ledger::{IdempotencyLedger, LedgerError};
use crate::push::{PushError, PushNote, PushSender};

/// One trigger invocation: a message newly appended under a dedupe scope.
#[derive(Debug, Clone)]
pub struct MessageAppended {
    /// Scope under which duplicate suppression applies (the conversation).
    pub scope_id: Uuid,
    /// The appended message.
    pub message: Message,
}

/// Terminal states of one dispatch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A push notification went out and the ledger was committed.
    Sent,
    /// The ledger already held this message; nothing was sent.
    Duplicate,
    /// The room has no counterparty to notify.
    NoRecipient,
    /// The counterparty has no registered push address.
    NoAddress,
}

/// Failures that abort a dispatch invocation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The ledger could not be read; the trigger will be redelivered.
    #[error("ledger read failed: {0}")]
    Ledger(#[from] LedgerError),
    /// Recipient lookup failed; the trigger will be redelivered.
    #[error("recipient lookup failed: {0}")]
    Directory(#[from] DirectoryError),
    /// Push delivery failed before the ledger was committed; a redelivered
    /// trigger can still succeed.
    #[error("push delivery failed: {0}")]
    Push(#[from] PushError),
    /// The send succeeded but the commit did not: a redelivered trigger may
    /// notify twice. Logged distinctly for operational alerting.
    #[error("ledger commit failed after send for message {message_id}: {source}")]
    LedgerCommit {
        /// The message whose ledger entry is missing.
        message_id: Uuid,
        /// The underlying ledger failure.
        source: LedgerError,
    },
}

/// Turns appended messages into at-most-one push notification each.
#[derive(Clone)]
pub struct NotificationDispatcher {
    ledger: Arc<dyn IdempotencyLedger>,
    directory: Arc<dyn RecipientDirectory>,
    push: Arc<dyn PushSender>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish()
    }
}

impl NotificationDispatcher {
    /// A dispatcher over the three collaborating backends.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn IdempotencyLedger>,
        directory: Arc<dyn RecipientDirectory>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            ledger,
            directory,
            push,
        }
    }

    /// Handles one trigger invocation. Safe to call repeatedly for the same
    /// message: duplicates short-circuit at the ledger gate.
    ///
    /// # Errors
    /// See [`DispatchError`]; every error path before the send leaves the
    /// ledger untouched so redelivery can retry cleanly.
    #[instrument(
        name = "dispatch.handle",
        skip(self, trigger),
        fields(scope_id = %trigger.scope_id, message_id = %trigger.message.id)
    )]
    pub async fn handle(&self, trigger: &MessageAppended) -> Result<DispatchOutcome, DispatchError> {
        let message = &trigger.message;

        if self.ledger.has(trigger.scope_id, message.id).await? {
            counter!("roomsync_notifications_deduped_total").increment(1);
            debug!("duplicate trigger suppressed");
            return Ok(DispatchOutcome::Duplicate);
        }

        let Some(recipient) = self
            .directory
            .resolve(trigger.scope_id, message.sender_id)
            .await?
        else {
            counter!("roomsync_notifications_skipped_total", "reason" => "no_recipient")
                .increment(1);
            warn!("room has no counterparty; nothing to notify");
            return Ok(DispatchOutcome::NoRecipient);
        };

        let Some(address) = recipient.push_address else {
            counter!("roomsync_notifications_skipped_total", "reason" => "no_address").increment(1);
            warn!(user_id = %recipient.user_id, "recipient has no push address");
            return Ok(DispatchOutcome::NoAddress);
        };

        let note = PushNote {
            address,
            title: format!("New message from {}", message.sender_name),
            body: message.preview(),
            room_id: message.room_id,
            sender_id: message.sender_id,
        };

        if let Err(push_error) = self.push.send(&note).await {
            counter!("roomsync_push_failures_total").increment(1);
            // Ledger stays uncommitted so the redelivered trigger can retry.
            warn!(%push_error, retriable = push_error.is_retriable(), "push send failed");
            return Err(DispatchError::Push(push_error));
        }

        counter!("roomsync_notifications_sent_total").increment(1);

        if let Err(source) = self.ledger.add(trigger.scope_id, message.id).await {
            error!(%source, "ledger commit failed after a successful send; duplicate possible on retry");
            return Err(DispatchError::LedgerCommit {
                message_id: message.id,
                source,
            });
        }

        Ok(DispatchOutcome::Sent)
    }
}
