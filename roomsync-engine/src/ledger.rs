//! Idempotency ledger: the set of already-processed message ids, scoped per
//! conversation and bounded in size.
//!
//! The dispatcher consults the ledger before sending and commits after a
//! successful send. Scoping per conversation keeps any one entry list small;
//! bounded retention works because the trigger infrastructure only
//! redelivers recent invocations, never arbitrarily old ones.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors surfaced by a ledger backend.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The backing store could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Scoped processed-id set. `has` followed by `add` for the same
/// `(scope, id)` must serialize across concurrent invocations; backends
/// achieve this with their store's conditional update, not client locking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// Whether `id` has already been processed under `scope`.
    async fn has(&self, scope: Uuid, id: Uuid) -> Result<bool, LedgerError>;

    /// Records `id` as processed under `scope`.
    async fn add(&self, scope: Uuid, id: Uuid) -> Result<(), LedgerError>;
}

/// In-memory ledger with per-scope bounded retention, oldest evicted first.
#[derive(Debug)]
pub struct MemoryLedger {
    max_entries_per_scope: usize,
    scopes: Mutex<HashMap<Uuid, VecDeque<Uuid>>>,
}

impl MemoryLedger {
    /// A ledger keeping at most `max_entries_per_scope` ids per scope.
    #[must_use]
    pub fn new(max_entries_per_scope: usize) -> Self {
        Self {
            max_entries_per_scope: max_entries_per_scope.max(1),
            scopes: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl IdempotencyLedger for MemoryLedger {
    async fn has(&self, scope: Uuid, id: Uuid) -> Result<bool, LedgerError> {
        let scopes = self.scopes.lock().await;
        Ok(scopes
            .get(&scope)
            .is_some_and(|entries| entries.contains(&id)))
    }

    async fn add(&self, scope: Uuid, id: Uuid) -> Result<(), LedgerError> {
        let mut scopes = self.scopes.lock().await;
        let entries = scopes.entry(scope).or_default();
        if entries.contains(&id) {
            return Ok(());
        }
        entries.push_back(id);
        while entries.len() > self.max_entries_per_scope {
            entries.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_has_round_trips() {
        let ledger = MemoryLedger::new(8);
        let scope = Uuid::new_v4();
        let id = Uuid::new_v4();

        assert!(!ledger.has(scope, id).await.unwrap());
        ledger.add(scope, id).await.unwrap();
        assert!(ledger.has(scope, id).await.unwrap());
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let ledger = MemoryLedger::new(8);
        let id = Uuid::new_v4();
        let scope_a = Uuid::new_v4();
        let scope_b = Uuid::new_v4();

        ledger.add(scope_a, id).await.unwrap();
        assert!(ledger.has(scope_a, id).await.unwrap());
        assert!(!ledger.has(scope_b, id).await.unwrap());
    }

    #[tokio::test]
    async fn retention_evicts_oldest_first() {
        let ledger = MemoryLedger::new(2);
        let scope = Uuid::new_v4();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for id in &ids {
            ledger.add(scope, *id).await.unwrap();
        }

        assert!(!ledger.has(scope, ids[0]).await.unwrap());
        assert!(ledger.has(scope, ids[1]).await.unwrap());
        assert!(ledger.has(scope, ids[2]).await.unwrap());
    }

    #[tokio::test]
    async fn redundant_add_does_not_duplicate() {
        let ledger = MemoryLedger::new(2);
        let scope = Uuid::new_v4();
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        ledger.add(scope, id).await.unwrap();
        ledger.add(scope, id).await.unwrap();
        ledger.add(scope, other).await.unwrap();

        // Both still present: the duplicate add did not consume a slot.
        assert!(ledger.has(scope, id).await.unwrap());
        assert!(ledger.has(scope, other).await.unwrap());
    }
}
