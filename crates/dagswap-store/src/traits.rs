use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use dagswap_types::Cid;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::Block;
use crate::error::StoreResult;

/// Aggregate store statistics, computed on demand.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_blocks: usize,
    pub total_size: u64,
    pub average_block_size: f64,
}

impl StoreStats {
    /// Build stats from a block count and byte total.
    pub fn from_totals(total_blocks: usize, total_size: u64) -> Self {
        let average_block_size = if total_blocks == 0 {
            0.0
        } else {
            total_size as f64 / total_blocks as f64
        };
        Self {
            total_blocks,
            total_size,
            average_block_size,
        }
    }
}

/// Outcome of a garbage collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    pub blocks_removed: usize,
    pub bytes_freed: u64,
    pub duration: Duration,
}

/// Content-addressed block storage.
///
/// All implementations must satisfy these invariants:
/// - `put` is idempotent: the first put of a CID returns `true`, every later
///   put of the same CID returns `false` and changes nothing.
/// - Concurrent `put`s of the same block from different callers are safe and
///   commutative.
/// - Every operation may fail with [`StoreError::Unavailable`] when the
///   backing medium is down. Absence is never an error.
/// - The store does not validate blocks; callers that received a block from
///   an untrusted source call [`Block::validate`] first.
///
/// [`StoreError::Unavailable`]: crate::StoreError::Unavailable
pub trait BlockStore: Send + Sync {
    /// Store a block. Returns `true` if it was not already present.
    fn put(&self, block: &Block) -> StoreResult<bool>;

    /// Fetch a block by CID.
    fn get(&self, cid: &Cid) -> StoreResult<Option<Block>>;

    fn has(&self, cid: &Cid) -> StoreResult<bool>;

    /// Remove a block. Returns `true` if it was present.
    fn delete(&self, cid: &Cid) -> StoreResult<bool>;

    fn stats(&self) -> StoreResult<StoreStats>;

    /// Every stored CID, sorted.
    fn all_cids(&self) -> StoreResult<Vec<Cid>>;

    /// Store many blocks. Each entry reports that block's outcome; one failure
    /// does not stop the rest.
    fn put_all(&self, blocks: &[Block]) -> HashMap<Cid, StoreResult<bool>> {
        blocks
            .iter()
            .map(|block| (block.cid().clone(), self.put(block)))
            .collect()
    }

    /// Fetch many blocks. Each requested CID maps to its own outcome, `None`
    /// when it is not stored; one failure does not stop the rest.
    fn get_all(&self, cids: &[Cid]) -> HashMap<Cid, StoreResult<Option<Block>>> {
        cids.iter().map(|cid| (cid.clone(), self.get(cid))).collect()
    }

    /// Delete every block not reachable from `roots` through block links.
    ///
    /// Roots are kept even if nothing references them. A root that is not
    /// stored contributes nothing and is not an error.
    fn collect_garbage(&self, roots: &HashSet<Cid>) -> StoreResult<GcReport> {
        let started = Instant::now();
        let live = mark_reachable(self, roots)?;

        let mut report = GcReport::default();
        for cid in self.all_cids()? {
            if live.contains(&cid) {
                continue;
            }
            let Some(block) = self.get(&cid)? else {
                continue;
            };
            if self.delete(&cid)? {
                debug!(cid = %cid, size = block.len(), "collected block");
                report.blocks_removed += 1;
                report.bytes_freed += block.len() as u64;
            }
        }
        report.duration = started.elapsed();
        info!(
            roots = roots.len(),
            live = live.len(),
            removed = report.blocks_removed,
            bytes_freed = report.bytes_freed,
            "garbage collection finished"
        );
        Ok(report)
    }
}

/// Every stored CID reachable from `roots`, roots included.
pub fn mark_reachable<S: BlockStore + ?Sized>(store: &S, roots: &HashSet<Cid>) -> StoreResult<HashSet<Cid>> {
    let mut live = HashSet::new();
    let mut queue: VecDeque<Cid> = roots.iter().cloned().collect();
    while let Some(cid) = queue.pop_front() {
        if live.contains(&cid) {
            continue;
        }
        let Some(block) = store.get(&cid)? else {
            continue;
        };
        live.insert(cid);
        queue.extend(block.links().into_iter().filter(|l| !live.contains(l)));
    }
    Ok(live)
}
