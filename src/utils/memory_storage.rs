//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory snapshot storage for testing and development
///
/// Clones share the same underlying slot, so a test can keep a handle and
/// inspect what the ledger saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    snapshot: Arc<RwLock<Option<Snapshot>>>,
    saves: Arc<RwLock<usize>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the storage as if a snapshot had been saved earlier
    pub fn preload(&self, snapshot: Snapshot) {
        if let Ok(mut slot) = self.snapshot.write() {
            *slot = Some(snapshot);
        }
    }

    /// Last saved snapshot
    pub fn stored(&self) -> Option<Snapshot> {
        self.snapshot.read().ok().and_then(|slot| slot.clone())
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saves.read().map(|count| *count).unwrap_or_default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        if let Ok(mut slot) = self.snapshot.write() {
            *slot = None;
        }
        if let Ok(mut count) = self.saves.write() {
            *count = 0;
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryStorage {
    async fn load(&self) -> LedgerResult<Option<Snapshot>> {
        self.snapshot
            .read()
            .map(|slot| slot.clone())
            .map_err(|_| LedgerError::Storage("Memory storage lock poisoned".to_string()))
    }

    async fn save(&mut self, snapshot: &Snapshot) -> LedgerResult<()> {
        let mut slot = self
            .snapshot
            .write()
            .map_err(|_| LedgerError::Storage("Memory storage lock poisoned".to_string()))?;
        *slot = Some(snapshot.clone());
        drop(slot);

        if let Ok(mut count) = self.saves.write() {
            *count += 1;
        }
        Ok(())
    }
}
