//! Model types shared across the roomsync workspace.

pub mod message;
pub mod room;
pub mod sla;
pub mod timestamp;

pub use message::{ChangeKind, Message, MessageInput, MessagePayload, OrderLine};
pub use room::RoomSummary;
pub use sla::{SlaThresholds, SlaTier, classify};
pub use timestamp::Timestamp;
