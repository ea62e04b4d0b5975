use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SlaTier, Timestamp};

/// Derived per-conversation aggregate, produced by the room aggregator.
///
/// A summary is never persisted: it exists only inside a live session and is
/// rebuilt from the message log on reconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSummary {
    /// The `room_id` shared by this conversation's messages.
    pub id: Uuid,

    /// Display name, taken from the most recent counterparty message.
    pub display_name: String,

    /// Avatar URL, when the most recent counterparty message carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Messages not yet read by the viewer, excluding the viewer's own.
    pub unread: u32,

    /// Preview of the newest message by order key.
    pub last_message_preview: String,

    /// Timestamp of the newest message by order key.
    pub last_message_at: Timestamp,

    /// Escalation tier for the oldest unread wait in this room.
    pub sla_tier: SlaTier,
}
