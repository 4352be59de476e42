//! Per-owner write serialization
//!
//! Mutations of one owner's forest (root provisioning, inserts, moves,
//! deletes) read sibling orders and then write them back, so two of them
//! racing on the same owner could both claim the same slot. Each mutation
//! holds its owner's lock for its whole read-plan-write cycle; different
//! owners never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are swept once the map grows past this many owners
const PRUNE_THRESHOLD: usize = 1024;

/// Lazily created async mutex per owner id
#[derive(Debug, Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner_id`'s forest
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn acquire(&self, owner_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(owner_id);
        lock.lock_owned().await
    }

    /// Number of owners currently tracked
    pub fn tracked_owners(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    fn lock_for(&self, owner_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            // The map only holds Arcs; a panic mid-insert leaves it usable
            Err(poisoned) => poisoned.into_inner(),
        };

        if locks.len() >= PRUNE_THRESHOLD {
            // Entries only referenced by the map are idle
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
