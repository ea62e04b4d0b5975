//! Adapter contract for the external append-only message log.
//!
//! The real store is an external document database with per-document change
//! notifications; this module specifies only the narrow surface the core
//! consumes. [`memory::MemoryStore`] is the in-process reference
//! implementation backing the test suite.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use shared::models::{ChangeKind, Message, MessageInput};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub mod memory;

pub use memory::MemoryStore;

/// Errors surfaced by a message store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced message does not exist.
    #[error("message not found: {0}")]
    NotFound(Uuid),
    /// The backend could not be reached; retried by the platform's own
    /// machinery, the core only stays idempotent across replays.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Query window for a live subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribeFilter {
    /// Restrict the feed to one room; `None` follows the global stream.
    pub room_id: Option<Uuid>,
    /// Maximum messages delivered in the initial snapshot (newest kept).
    pub limit: Option<usize>,
}

/// Events delivered on a subscription: one snapshot of the current matching
/// set, then incremental deltas in order.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The full current matching set, ordered by message order key.
    Snapshot(Vec<Message>),
    /// An incremental delta relative to the query window.
    Change {
        /// Whether the message is new or an update to one already seen.
        kind: ChangeKind,
        /// The message after the change.
        message: Message,
    },
}

/// A live change feed with a deterministic teardown handle.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// cancels the feed; the store detaches the listener instead of leaving it
/// dangling across repeated open/close cycles.
#[derive(Debug)]
pub struct Subscription {
    events: ReceiverStream<StoreEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Wraps a receiver and the token that detaches its producer.
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<StoreEvent>, cancel: CancellationToken) -> Self {
        Self {
            events: ReceiverStream::new(receiver),
            cancel,
        }
    }

    /// Next event on the feed; `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<StoreEvent> {
        use tokio_stream::StreamExt;
        self.events.next().await
    }

    /// Detach the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for Subscription {
    type Item = StoreEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

/// The narrow contract the core consumes from the external log.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message; the store assigns `id` and `created_at`.
    async fn append(&self, input: MessageInput) -> Result<Uuid, StoreError>;

    /// All messages of a room, ordered by order key.
    async fn room_messages(&self, room_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Sets `read_by_recipient = true`. A no-op when already set; the flag
    /// never transitions back.
    async fn update_read(&self, message_id: Uuid) -> Result<(), StoreError>;

    /// Opens a live feed: one snapshot, then deltas in order.
    async fn subscribe(&self, filter: SubscribeFilter) -> Result<Subscription, StoreError>;
}
