//! In-process reference implementation of the store contract.
//!
//! Not a storage engine: it exists so the aggregator, receipt writer, and
//! dispatcher can be exercised end-to-end without the external platform.
//! Delivery semantics mirror the real store: one ordered snapshot per
//! subscribe, then per-change deltas, read flags never reverting.

use async_trait::async_trait;
use shared::models::{ChangeKind, Message, MessageInput, Timestamp};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{MessageStore, StoreError, StoreEvent, SubscribeFilter, Subscription};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct Subscriber {
    filter: SubscribeFilter,
    sender: mpsc::Sender<StoreEvent>,
    cancel: CancellationToken,
}

impl Subscriber {
    fn matches(&self, message: &Message) -> bool {
        self.filter.room_id.is_none_or(|room| room == message.room_id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<Message>,
    subscribers: Vec<Subscriber>,
}

/// In-memory message store with live change fan-out.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fan_out(inner: &mut Inner, kind: ChangeKind, message: &Message) {
        inner.subscribers.retain(|subscriber| {
            if subscriber.cancel.is_cancelled() {
                return false;
            }
            if !subscriber.matches(message) {
                return true;
            }
            let event = StoreEvent::Change {
                kind,
                message: message.clone(),
            };
            match subscriber.sender.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
                // Window overflow: the slow subscriber keeps its place and
                // recovers by resubscribing for a fresh snapshot.
                Err(mpsc::error::TrySendError::Full(_)) => true,
            }
        });
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, input: MessageInput) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.lock().await;
        let message = Message {
            id: Uuid::new_v4(),
            room_id: input.room_id,
            sender_id: input.sender_id,
            sender_name: input.sender_name,
            sender_avatar: input.sender_avatar,
            payload: input.payload,
            created_at: Timestamp::now(),
            read_by_recipient: false,
        };
        inner.log.push(message.clone());
        Self::fan_out(&mut inner, ChangeKind::Added, &message);
        Ok(message.id)
    }

    async fn room_messages(&self, room_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().await;
        let mut messages: Vec<Message> = inner
            .log
            .iter()
            .filter(|message| message.room_id == room_id)
            .cloned()
            .collect();
        messages.sort_by_key(Message::order_key);
        Ok(messages)
    }

    async fn update_read(&self, message_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(position) = inner.log.iter().position(|m| m.id == message_id) else {
            return Err(StoreError::NotFound(message_id));
        };
        if inner.log[position].read_by_recipient {
            // Redundant write of an already-true flag; no event is emitted.
            return Ok(());
        }
        inner.log[position].read_by_recipient = true;
        let message = inner.log[position].clone();
        Self::fan_out(&mut inner, ChangeKind::Modified, &message);
        Ok(())
    }

    async fn subscribe(&self, filter: SubscribeFilter) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock().await;
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let mut snapshot: Vec<Message> = inner
            .log
            .iter()
            .filter(|message| filter.room_id.is_none_or(|room| room == message.room_id))
            .cloned()
            .collect();
        snapshot.sort_by_key(Message::order_key);
        if let Some(limit) = filter.limit {
            if snapshot.len() > limit {
                snapshot = snapshot.split_off(snapshot.len() - limit);
            }
        }

        // Fresh channel with capacity >= 1; the snapshot always fits.
        let _ = sender.try_send(StoreEvent::Snapshot(snapshot));

        inner.subscribers.push(Subscriber {
            filter,
            sender,
            cancel: cancel.clone(),
        });

        Ok(Subscription::new(receiver, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::MessagePayload;

    fn text_input(room: Uuid, sender: Uuid, text: &str) -> MessageInput {
        MessageInput::text(room, sender, "Noa", text)
    }

    #[tokio::test]
    async fn subscribe_delivers_snapshot_then_deltas() {
        let store = MemoryStore::new();
        let room = Uuid::new_v4();
        let sender = Uuid::new_v4();

        store.append(text_input(room, sender, "first")).await.unwrap();

        let mut subscription = store.subscribe(SubscribeFilter::default()).await.unwrap();
        let Some(StoreEvent::Snapshot(snapshot)) = subscription.next_event().await else {
            panic!("expected snapshot first");
        };
        assert_eq!(snapshot.len(), 1);

        store.append(text_input(room, sender, "second")).await.unwrap();
        let Some(StoreEvent::Change { kind, message }) = subscription.next_event().await else {
            panic!("expected a change event");
        };
        assert_eq!(kind, ChangeKind::Added);
        assert_eq!(message.payload, MessagePayload::Text { text: "second".into() });
    }

    #[tokio::test]
    async fn room_filter_excludes_other_rooms() {
        let store = MemoryStore::new();
        let room = Uuid::new_v4();
        let other = Uuid::new_v4();
        let sender = Uuid::new_v4();

        let mut subscription = store
            .subscribe(SubscribeFilter {
                room_id: Some(room),
                limit: None,
            })
            .await
            .unwrap();
        assert!(matches!(
            subscription.next_event().await,
            Some(StoreEvent::Snapshot(snapshot)) if snapshot.is_empty()
        ));

        store.append(text_input(other, sender, "elsewhere")).await.unwrap();
        store.append(text_input(room, sender, "here")).await.unwrap();

        let Some(StoreEvent::Change { message, .. }) = subscription.next_event().await else {
            panic!("expected a change event");
        };
        assert_eq!(message.room_id, room);
    }

    #[tokio::test]
    async fn snapshot_respects_the_limit_keeping_newest() {
        let store = MemoryStore::new();
        let room = Uuid::new_v4();
        let sender = Uuid::new_v4();
        for i in 0..5 {
            store
                .append(text_input(room, sender, &format!("m{i}")))
                .await
                .unwrap();
        }

        let mut subscription = store
            .subscribe(SubscribeFilter {
                room_id: Some(room),
                limit: Some(2),
            })
            .await
            .unwrap();
        let Some(StoreEvent::Snapshot(snapshot)) = subscription.next_event().await else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot[1].payload,
            MessagePayload::Text { text: "m4".into() }
        );
    }

    #[tokio::test]
    async fn update_read_is_idempotent_and_emits_one_modified() {
        let store = MemoryStore::new();
        let room = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let id = store.append(text_input(room, sender, "hi")).await.unwrap();

        let mut subscription = store.subscribe(SubscribeFilter::default()).await.unwrap();
        let _snapshot = subscription.next_event().await;

        store.update_read(id).await.unwrap();
        store.update_read(id).await.unwrap();

        let Some(StoreEvent::Change { kind, message }) = subscription.next_event().await else {
            panic!("expected the read flip");
        };
        assert_eq!(kind, ChangeKind::Modified);
        assert!(message.read_by_recipient);

        // The second write was a no-op: appending afterwards shows the very
        // next event is the new message, not a duplicate flip.
        store.append(text_input(room, sender, "next")).await.unwrap();
        let Some(StoreEvent::Change { kind, .. }) = subscription.next_event().await else {
            panic!("expected the append");
        };
        assert_eq!(kind, ChangeKind::Added);
    }

    #[tokio::test]
    async fn update_read_unknown_message_is_not_found() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update_read(missing).await,
            Err(StoreError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn unsubscribe_detaches_the_listener() {
        let store = MemoryStore::new();
        let room = Uuid::new_v4();
        let sender = Uuid::new_v4();

        let mut subscription = store.subscribe(SubscribeFilter::default()).await.unwrap();
        let _snapshot = subscription.next_event().await;

        subscription.unsubscribe();
        store.append(text_input(room, sender, "after")).await.unwrap();

        // The subscriber was pruned during fan-out, closing the channel.
        assert!(subscription.next_event().await.is_none());
    }
}
