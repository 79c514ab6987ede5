use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use dagswap_types::Cid;
use tracing::debug;

use crate::block::Block;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlockStore, StoreStats};

/// In-memory, HashMap-based block store.
///
/// Intended for tests and embedding. Blocks live behind a `RwLock`; payloads
/// are reference counted so reads do not copy bytes.
///
/// The store can be switched offline with [`set_available`], after which
/// every operation fails with [`StoreError::Unavailable`]. This stands in for
/// a backend whose medium went away.
///
/// [`set_available`]: InMemoryBlockStore::set_available
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<Cid, Block>>,
    offline: AtomicBool,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Take the store offline (`false`) or bring it back (`true`).
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Remove every block.
    pub fn clear(&self) -> StoreResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".into()));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<Cid, Block>>> {
        self.check_online()?;
        self.blocks.read().map_err(StoreError::poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<Cid, Block>>> {
        self.check_online()?;
        self.blocks.write().map_err(StoreError::poisoned)
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn put(&self, block: &Block) -> StoreResult<bool> {
        let mut map = self.write()?;
        if map.contains_key(block.cid()) {
            return Ok(false);
        }
        debug!(cid = %block.cid(), size = block.len(), "stored block");
        map.insert(block.cid().clone(), block.clone());
        Ok(true)
    }

    fn get(&self, cid: &Cid) -> StoreResult<Option<Block>> {
        Ok(self.read()?.get(cid).cloned())
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.read()?.contains_key(cid))
    }

    fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.write()?.remove(cid).is_some())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let map = self.read()?;
        let total_size = map.values().map(|b| b.len() as u64).sum();
        Ok(StoreStats::from_totals(map.len(), total_size))
    }

    fn all_cids(&self) -> StoreResult<Vec<Cid>> {
        let mut cids: Vec<Cid> = self.read()?.keys().cloned().collect();
        cids.sort();
        Ok(cids)
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.blocks.read().map(|m| m.len()).ok();
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &count)
            .field("offline", &self.offline.load(Ordering::SeqCst))
            .finish()
    }
}
