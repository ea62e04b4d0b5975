//! Recipient resolution: who is the other party in a room, and where do
//! their notifications go.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A room participant eligible to receive notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Participant identity.
    pub user_id: Uuid,
    /// Current display name.
    pub display_name: String,
    /// Push delivery address, when the participant has registered one.
    /// Absence is an expected, recoverable condition.
    pub push_address: Option<String>,
}

/// Errors surfaced by a directory backend.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing profile store could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Looks up the room participant other than the sender.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// The counterparty of `sender_id` in `room_id`, or `None` when the room
    /// has no other registered participant.
    async fn resolve(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
    ) -> Result<Option<Recipient>, DirectoryError>;
}

/// In-memory room membership map.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    members: RwLock<HashMap<Uuid, Vec<Recipient>>>,
}

impl MemoryDirectory {
    /// An empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the member list of a room.
    pub async fn set_members(&self, room_id: Uuid, members: Vec<Recipient>) {
        self.members.write().await.insert(room_id, members);
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn resolve(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
    ) -> Result<Option<Recipient>, DirectoryError> {
        let members = self.members.read().await;
        Ok(members
            .get(&room_id)
            .and_then(|list| list.iter().find(|member| member.user_id != sender_id))
            .cloned())
    }
}
