//! Cancellable session that drives a subscription into an aggregator.
//!
//! One session per open client view. Teardown is a single deterministic
//! call: `shutdown` cancels the drive loop and unsubscribes the feed, so a
//! closed view never keeps mutating rooms it no longer displays.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use shared::models::{RoomSummary, SlaThresholds};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::aggregator::{RoomAggregator, UnreadAlert};
use crate::store::{StoreEvent, Subscription};

const ALERT_CHANNEL_CAPACITY: usize = 64;

/// A live aggregation session over one subscription.
#[derive(Debug)]
pub struct AggregatorSession {
    state: Arc<RwLock<RoomAggregator>>,
    alerts: mpsc::Receiver<UnreadAlert>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AggregatorSession {
    /// Spawns the drive loop for `viewer_id` over the given feed.
    #[must_use]
    pub fn spawn(subscription: Subscription, viewer_id: Uuid) -> Self {
        let state = Arc::new(RwLock::new(RoomAggregator::new(viewer_id)));
        let (alert_tx, alert_rx) = mpsc::channel(ALERT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(drive(
            subscription,
            Arc::clone(&state),
            alert_tx,
            cancel.clone(),
        ));

        Self {
            state,
            alerts: alert_rx,
            cancel,
            handle,
        }
    }

    /// Current room summaries, SLA tiers evaluated against `now`.
    pub async fn rooms(&self, now: DateTime<Utc>, thresholds: &SlaThresholds) -> Vec<RoomSummary> {
        self.state.read().await.rooms(now, thresholds)
    }

    /// Summary for one room.
    pub async fn room(
        &self,
        room_id: Uuid,
        now: DateTime<Utc>,
        thresholds: &SlaThresholds,
    ) -> Option<RoomSummary> {
        self.state.read().await.room(room_id, now, thresholds)
    }

    /// Unread messages across every room.
    pub async fn unread_total(&self) -> u32 {
        self.state.read().await.unread_total()
    }

    /// Next unread alert; `None` once the session has stopped.
    pub async fn next_alert(&mut self) -> Option<UnreadAlert> {
        self.alerts.recv().await
    }

    /// Stops the drive loop and detaches the subscription.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn drive(
    mut subscription: Subscription,
    state: Arc<RwLock<RoomAggregator>>,
    alerts: mpsc::Sender<UnreadAlert>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                subscription.unsubscribe();
                debug!("aggregator session cancelled");
                break;
            }
            event = subscription.next_event() => match event {
                Some(StoreEvent::Snapshot(messages)) => {
                    state.write().await.seed(&messages);
                }
                Some(StoreEvent::Change { kind, message }) => {
                    let alert = state.write().await.apply(kind, &message);
                    if let Some(alert) = alert {
                        counter!("roomsync_unread_alerts_total").increment(1);
                        // A full or dropped alert channel must not stall the
                        // fold; the counts stay correct either way.
                        let _ = alerts.try_send(alert);
                    }
                }
                None => {
                    debug!("subscription feed closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, MessageStore, SubscribeFilter};
    use shared::models::MessageInput;
    use std::time::Duration;

    async fn wait_until<F>(mut condition: F)
    where
        F: AsyncFnMut() -> bool,
    {
        for _ in 0..100 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn folds_snapshot_and_live_events() {
        let store = MemoryStore::new();
        let worker = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let room = Uuid::new_v4();

        store
            .append(MessageInput::text(room, customer, "Noa", "before subscribe"))
            .await
            .unwrap();

        let subscription = store.subscribe(SubscribeFilter::default()).await.unwrap();
        let mut session = AggregatorSession::spawn(subscription, worker);

        wait_until(async || session.unread_total().await == 1).await;

        store
            .append(MessageInput::text(room, customer, "Noa", "after subscribe"))
            .await
            .unwrap();

        // Only the live event alerts; the snapshot seeded silently.
        let alert = session.next_alert().await.unwrap();
        assert_eq!(alert.preview, "after subscribe");
        assert_eq!(session.unread_total().await, 2);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_leaves_no_dangling_listener() {
        let store = MemoryStore::new();
        let worker = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let room = Uuid::new_v4();

        let subscription = store.subscribe(SubscribeFilter::default()).await.unwrap();
        let session = AggregatorSession::spawn(subscription, worker);

        let state = Arc::clone(&session.state);
        session.shutdown().await;

        store
            .append(MessageInput::text(room, customer, "Noa", "into the void"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(state.read().await.unread_total(), 0);
    }
}
