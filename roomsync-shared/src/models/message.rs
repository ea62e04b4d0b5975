use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timestamp;

/// Maximum number of characters of free text surfaced in previews and
/// notification bodies.
const PREVIEW_MAX_CHARS: usize = 120;

/// One line item inside an order payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    /// Product display name as it appeared in the catalog at order time.
    pub name: String,
    /// Requested quantity.
    pub quantity: u32,
}

/// Type-specific message content.
///
/// The set is closed but forward-compatible: a payload with an unrecognized
/// `type` tag deserializes into [`MessagePayload::Unknown`] instead of
/// failing, so a newer client release never breaks an older aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePayload {
    /// Free-form chat text.
    Text {
        /// The message body.
        text: String,
    },
    /// A structured order submitted from the catalog cart.
    Order {
        /// Ordered line items.
        items: Vec<OrderLine>,
    },
    /// A shared geographic position.
    Location {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },
    /// Any payload type this build does not recognize. Rendered as an opaque
    /// attachment; never inspected further.
    #[serde(other)]
    Unknown,
}

impl MessagePayload {
    /// Human-readable one-line preview, used for room lists and push
    /// notification bodies. Non-text payloads map to fixed labels so the raw
    /// payload structure never leaks into a notification.
    #[must_use]
    pub fn preview(&self) -> String {
        match self {
            Self::Text { text } => {
                if text.chars().count() <= PREVIEW_MAX_CHARS {
                    text.clone()
                } else {
                    let truncated: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
                    format!("{truncated}…")
                }
            }
            Self::Order { .. } => "sent an order".to_string(),
            Self::Location { .. } => "shared a location".to_string(),
            Self::Unknown => "sent an attachment".to_string(),
        }
    }
}

/// A single entry in the append-only message log.
///
/// Messages are never edited or deleted after append; the one exception is
/// `read_by_recipient`, which may transition `false → true` exactly once
/// (redundant writes of `true` are store-level no-ops).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Store-assigned unique identifier.
    pub id: Uuid,

    /// The conversation this message belongs to.
    pub room_id: Uuid,

    /// Identity of the author.
    pub sender_id: Uuid,

    /// Display name snapshot at send time; not kept in sync with later
    /// profile edits.
    pub sender_name: String,

    /// Avatar URL snapshot at send time, when the sender had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,

    /// Type-specific content.
    pub payload: MessagePayload,

    /// Server-assigned timestamp; the authoritative ordering key within a
    /// room.
    pub created_at: Timestamp,

    /// Whether the designated recipient has read this message.
    pub read_by_recipient: bool,
}

impl Message {
    /// Total ordering key within a room: `created_at` first, byte-wise `id`
    /// comparison as the tie-break for identical timestamps.
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at.0, self.id)
    }

    /// One-line preview of the payload. See [`MessagePayload::preview`].
    #[must_use]
    pub fn preview(&self) -> String {
        self.payload.preview()
    }
}

/// Client-side shape for appending a message. The store assigns `id` and
/// `created_at`; the read flag always starts out `false`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageInput {
    /// Target conversation.
    pub room_id: Uuid,
    /// Author identity.
    pub sender_id: Uuid,
    /// Author display name at send time.
    pub sender_name: String,
    /// Author avatar URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    /// Type-specific content.
    pub payload: MessagePayload,
}

impl MessageInput {
    /// Convenience constructor for a plain text message.
    #[must_use]
    pub fn text(room_id: Uuid, sender_id: Uuid, sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            sender_avatar: None,
            payload: MessagePayload::Text { text: text.into() },
        }
    }
}

/// How a change event relates to the subscriber's query window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A message newly appended to the log.
    Added,
    /// An existing message whose read flag flipped.
    Modified,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message_at(ts: DateTime<Utc>, id: Uuid) -> Message {
        Message {
            id,
            room_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            sender_name: "Dana".to_string(),
            sender_avatar: None,
            payload: MessagePayload::Text {
                text: "hello".to_string(),
            },
            created_at: Timestamp(ts),
            read_by_recipient: false,
        }
    }

    #[test]
    fn order_key_sorts_by_created_at_then_id() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 3, 8, 14, 30, 1).unwrap();
        let low = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
        let high = Uuid::parse_str("ffffffff-ffff-4fff-bfff-fffffffffffe").unwrap();

        let earlier = message_at(t0, high);
        let later = message_at(t1, low);
        assert!(earlier.order_key() < later.order_key());

        // Same timestamp: the id breaks the tie.
        let a = message_at(t0, low);
        let b = message_at(t0, high);
        assert!(a.order_key() < b.order_key());
    }

    #[test]
    fn text_preview_truncates_long_messages() {
        let short = MessagePayload::Text {
            text: "two boards, please".to_string(),
        };
        assert_eq!(short.preview(), "two boards, please");

        let long = MessagePayload::Text {
            text: "x".repeat(500),
        };
        let preview = long.preview();
        assert!(preview.chars().count() <= 121);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn non_text_previews_use_fixed_labels() {
        let order = MessagePayload::Order {
            items: vec![OrderLine {
                name: "drywall board".to_string(),
                quantity: 12,
            }],
        };
        assert_eq!(order.preview(), "sent an order");

        let location = MessagePayload::Location {
            lat: 32.08,
            lon: 34.78,
        };
        assert_eq!(location.preview(), "shared a location");

        assert_eq!(MessagePayload::Unknown.preview(), "sent an attachment");
    }

    #[test]
    fn unknown_payload_type_deserializes_without_error() {
        let raw = r#"{"type":"VOICE_NOTE","durationSecs":12}"#;
        let payload: MessagePayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload, MessagePayload::Unknown);
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = MessagePayload::Order {
            items: vec![
                OrderLine {
                    name: "stud 70mm".to_string(),
                    quantity: 40,
                },
                OrderLine {
                    name: "track 70mm".to_string(),
                    quantity: 40,
                },
            ],
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"ORDER\""));
        let back: MessagePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
