use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use dagswap_types::Cid;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::block::Block;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlockStore, GcReport, StoreStats};

/// Counters for a [`CachedBlockStore`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub bytes: u64,
}

impl CacheStats {
    /// Fraction of reads served from the cache, 0.0 when nothing was read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState {
    lru: LruCache<Cid, Block>,
    bytes: u64,
}

/// Least-recently-used read cache in front of any [`BlockStore`].
///
/// The cache is bounded both by block count and by total payload bytes.
/// Writes go to the wrapped store first and are cached only once the store
/// accepted them; deletes evict from the cache after the store removed the
/// block. Every operation that changes the wrapped store or fills the cache
/// holds the cache lock throughout, so the cache never holds a block the
/// store does not.
pub struct CachedBlockStore<S> {
    inner: S,
    state: Mutex<CacheState>,
    capacity_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<S: BlockStore> CachedBlockStore<S> {
    pub fn new(inner: S, config: &StoreConfig) -> Self {
        Self::with_capacity(inner, config.cache_capacity_blocks, config.cache_capacity_bytes)
    }

    /// Cache at most `blocks` blocks and `bytes` payload bytes.
    pub fn with_capacity(inner: S, blocks: usize, bytes: u64) -> Self {
        let blocks = NonZeroUsize::new(blocks).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            state: Mutex::new(CacheState {
                lru: LruCache::new(blocks),
                bytes: 0,
            }),
            capacity_bytes: bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache_stats(&self) -> StoreResult<CacheStats> {
        let state = self.lock()?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: state.lru.len(),
            bytes: state.bytes,
        })
    }

    /// Drop every cached block. The wrapped store is untouched.
    pub fn clear_cache(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.lru.clear();
        state.bytes = 0;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, CacheState>> {
        self.state.lock().map_err(StoreError::poisoned)
    }

    fn admit(&self, state: &mut CacheState, block: &Block) {
        let size = block.len() as u64;
        if size > self.capacity_bytes {
            return;
        }
        if let Some((_, old)) = state.lru.push(block.cid().clone(), block.clone()) {
            state.bytes -= old.len() as u64;
            if old.cid() != block.cid() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        state.bytes += size;
        while state.bytes > self.capacity_bytes {
            let Some((cid, evicted)) = state.lru.pop_lru() else {
                break;
            };
            debug!(cid = %cid, "evicted block from cache");
            state.bytes -= evicted.len() as u64;
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<S: BlockStore> BlockStore for CachedBlockStore<S> {
    fn put(&self, block: &Block) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let stored = self.inner.put(block)?;
        self.admit(&mut state, block);
        Ok(stored)
    }

    fn get(&self, cid: &Cid) -> StoreResult<Option<Block>> {
        let mut state = self.lock()?;
        if let Some(block) = state.lru.get(cid).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(block));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let block = self.inner.get(cid)?;
        if let Some(block) = &block {
            self.admit(&mut state, block);
        }
        Ok(block)
    }

    fn has(&self, cid: &Cid) -> StoreResult<bool> {
        if self.lock()?.lru.contains(cid) {
            return Ok(true);
        }
        self.inner.has(cid)
    }

    fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let removed = self.inner.delete(cid)?;
        if let Some(old) = state.lru.pop(cid) {
            state.bytes -= old.len() as u64;
        }
        Ok(removed)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        self.inner.stats()
    }

    fn all_cids(&self) -> StoreResult<Vec<Cid>> {
        self.inner.all_cids()
    }

    fn collect_garbage(&self, roots: &HashSet<Cid>) -> StoreResult<GcReport> {
        let mut state = self.lock()?;
        let report = self.inner.collect_garbage(roots)?;
        if report.blocks_removed > 0 {
            state.lru.clear();
            state.bytes = 0;
        }
        Ok(report)
    }
}

impl<S> std::fmt::Debug for CachedBlockStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBlockStore")
            .field("capacity_bytes", &self.capacity_bytes)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}
