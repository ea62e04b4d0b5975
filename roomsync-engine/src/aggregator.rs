//! Reducer that folds the raw message stream into per-room aggregates.
//!
//! One aggregator per connected session, no shared state. The fold is
//! expressed as `(state, event) -> state'` so it is unit-testable without a
//! live subscription, and so a one-shot replay of a message sequence equals
//! the incremental path applied in the same order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::models::{ChangeKind, Message, RoomSummary, SlaThresholds, SlaTier, Timestamp, classify};
use uuid::Uuid;

/// Emitted when a counterparty message lands unread, to drive an audible or
/// visual alert. Never emitted while seeding from a snapshot, so a reconnect
/// cannot cause an alert storm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadAlert {
    /// Room the message arrived in.
    pub room_id: Uuid,
    /// The message that triggered the alert.
    pub message_id: Uuid,
    /// Sender display name at send time.
    pub sender_name: String,
    /// One-line payload preview.
    pub preview: String,
}

#[derive(Debug, Clone)]
struct RoomState {
    display_name: String,
    avatar_url: Option<String>,
    unread: u32,
    last_key: (DateTime<Utc>, Uuid),
    last_preview: String,
    last_at: Timestamp,
    // Order key of the newest counterparty message; display identity follows
    // the counterparty, not whoever wrote last.
    counterparty_key: Option<(DateTime<Utc>, Uuid)>,
}

#[derive(Debug, Clone, Copy)]
struct CountedUnread {
    room_id: Uuid,
    created_at: DateTime<Utc>,
}

/// Per-session fold of the message stream into room aggregates.
#[derive(Debug)]
pub struct RoomAggregator {
    viewer_id: Uuid,
    rooms: HashMap<Uuid, RoomState>,
    // Messages currently counted as unread, keyed by message id. This is the
    // dedupe guard: duplicate added events cannot double-count, and duplicate
    // read flips cannot decrement twice or below zero.
    counted: HashMap<Uuid, CountedUnread>,
}

impl RoomAggregator {
    /// An empty aggregate for one viewer.
    #[must_use]
    pub fn new(viewer_id: Uuid) -> Self {
        Self {
            viewer_id,
            rooms: HashMap::new(),
            counted: HashMap::new(),
        }
    }

    /// The viewer this aggregate counts unread messages for.
    #[must_use]
    pub fn viewer_id(&self) -> Uuid {
        self.viewer_id
    }

    /// Applies an initial snapshot. Counts unread state exactly like the
    /// incremental path but never emits alerts.
    pub fn seed(&mut self, messages: &[Message]) {
        for message in messages {
            self.ingest(message);
        }
    }

    /// Applies one incremental change event. Returns an alert when a
    /// counterparty message lands unread for the first time.
    pub fn apply(&mut self, kind: ChangeKind, message: &Message) -> Option<UnreadAlert> {
        match kind {
            ChangeKind::Added => {
                let newly_counted = self.ingest(message);
                newly_counted.then(|| UnreadAlert {
                    room_id: message.room_id,
                    message_id: message.id,
                    sender_name: message.sender_name.clone(),
                    preview: message.preview(),
                })
            }
            ChangeKind::Modified => {
                self.apply_read_flip(message);
                None
            }
        }
    }

    /// Number of rooms currently represented.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Unread messages across every room.
    #[must_use]
    pub fn unread_total(&self) -> u32 {
        self.rooms.values().map(|room| room.unread).sum()
    }

    /// Summaries for every room, sorted by last-message time descending,
    /// with SLA tiers evaluated against `now`.
    #[must_use]
    pub fn rooms(&self, now: DateTime<Utc>, thresholds: &SlaThresholds) -> Vec<RoomSummary> {
        let newest_unread = self.newest_unread_by_room();
        let mut summaries: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(id, room)| self.summarize(*id, room, newest_unread.get(id), now, thresholds))
            .collect();
        summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        summaries
    }

    /// Summary for one room, if any of its messages have been observed.
    #[must_use]
    pub fn room(
        &self,
        room_id: Uuid,
        now: DateTime<Utc>,
        thresholds: &SlaThresholds,
    ) -> Option<RoomSummary> {
        let room = self.rooms.get(&room_id)?;
        let newest_unread = self.newest_unread_by_room();
        Some(self.summarize(room_id, room, newest_unread.get(&room_id), now, thresholds))
    }

    fn summarize(
        &self,
        id: Uuid,
        room: &RoomState,
        newest_unread: Option<&DateTime<Utc>>,
        now: DateTime<Utc>,
        thresholds: &SlaThresholds,
    ) -> RoomSummary {
        let sla_tier = match newest_unread {
            Some(at) if room.unread > 0 => {
                let age = now.signed_duration_since(*at).to_std().unwrap_or_default();
                classify(age, room.unread, thresholds)
            }
            _ => SlaTier::None,
        };
        RoomSummary {
            id,
            display_name: room.display_name.clone(),
            avatar_url: room.avatar_url.clone(),
            unread: room.unread,
            last_message_preview: room.last_preview.clone(),
            last_message_at: room.last_at,
            sla_tier,
        }
    }

    fn newest_unread_by_room(&self) -> HashMap<Uuid, DateTime<Utc>> {
        let mut newest: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for counted in self.counted.values() {
            newest
                .entry(counted.room_id)
                .and_modify(|at| *at = (*at).max(counted.created_at))
                .or_insert(counted.created_at);
        }
        newest
    }

    // Folds one message into the aggregate. Returns true when the message
    // was counted as unread for the first time.
    fn ingest(&mut self, message: &Message) -> bool {
        let key = message.order_key();
        let room = self
            .rooms
            .entry(message.room_id)
            .or_insert_with(|| RoomState {
                display_name: message.sender_name.clone(),
                avatar_url: message.sender_avatar.clone(),
                unread: 0,
                last_key: key,
                last_preview: message.preview(),
                last_at: message.created_at,
                counterparty_key: None,
            });

        if key >= room.last_key {
            room.last_key = key;
            room.last_preview = message.preview();
            room.last_at = message.created_at;
        }

        let from_counterparty = message.sender_id != self.viewer_id;
        if from_counterparty && room.counterparty_key.is_none_or(|existing| key > existing) {
            room.counterparty_key = Some(key);
            room.display_name = message.sender_name.clone();
            if message.sender_avatar.is_some() {
                room.avatar_url = message.sender_avatar.clone();
            }
        }

        // A sender never counts their own message as unread for themselves.
        if !from_counterparty || message.read_by_recipient {
            return false;
        }
        if self.counted.contains_key(&message.id) {
            // Duplicate delivery of the same added event.
            return false;
        }
        self.counted.insert(
            message.id,
            CountedUnread {
                room_id: message.room_id,
                created_at: message.created_at.0,
            },
        );
        room.unread += 1;
        true
    }

    fn apply_read_flip(&mut self, message: &Message) {
        if !message.read_by_recipient {
            return;
        }
        // Decrement only when this exact message had been counted; a second
        // flip for the same id finds nothing and changes nothing.
        if self.counted.remove(&message.id).is_some() {
            if let Some(room) = self.rooms.get_mut(&message.room_id) {
                room.unread = room.unread.saturating_sub(1);
            }
        }
    }
}
