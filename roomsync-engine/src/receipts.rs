//! Read-receipt writer: flips read flags when a room is opened.
//!
//! Best-effort by design. A lost receipt never corrupts the log; it only
//! delays an unread-count decrement until the room is opened again.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::store::{MessageStore, StoreError};

/// Marks a room's counterparty messages as read.
#[derive(Clone)]
pub struct ReadReceiptWriter {
    store: Arc<dyn MessageStore>,
}

impl std::fmt::Debug for ReadReceiptWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadReceiptWriter").finish()
    }
}

impl ReadReceiptWriter {
    /// A writer over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Marks every unread counterparty message in `room_id` as read, and
    /// returns how many receipts were written. Calling again immediately
    /// finds nothing unread and writes zero, so redundant calls are safe.
    ///
    /// # Errors
    /// Returns the first store failure encountered; receipts written before
    /// the failure stand (the flag only ever moves `false → true`).
    #[instrument(name = "receipts.mark_room_read", skip(self), err)]
    pub async fn mark_room_read(&self, room_id: Uuid, viewer_id: Uuid) -> Result<usize, StoreError> {
        let messages = self.store.room_messages(room_id).await?;
        let mut written = 0;
        for message in messages
            .iter()
            .filter(|m| m.sender_id != viewer_id && !m.read_by_recipient)
        {
            self.store.update_read(message.id).await?;
            written += 1;
        }
        if written > 0 {
            debug!(%room_id, written, "read receipts written");
        }
        Ok(written)
    }

    /// Fire-and-forget variant for UI paths that must not block: failures
    /// are logged as warnings and otherwise dropped.
    pub fn spawn_mark_room_read(&self, room_id: Uuid, viewer_id: Uuid) -> JoinHandle<()> {
        let writer = self.clone();
        tokio::spawn(async move {
            if let Err(error) = writer.mark_room_read(room_id, viewer_id).await {
                warn!(%room_id, %error, "read receipt write failed; counts catch up on the next open");
            }
        })
    }
}
