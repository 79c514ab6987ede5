//! The Merkle DAG structure and traversal algorithms.
//!
//! [`MerkleDag`] stores blocks in a [`HashMap`] keyed by CID and caches each
//! block's outbound links. Reverse edges (parents) are derived by scanning,
//! since they change whenever any block is added.
//!
//! # Invariants
//!
//! - Every CID key maps to exactly one block.
//! - `links[cid]` is the deduplicated, in-order link list of `blocks[cid]`.
//! - Links may dangle; no operation treats a dangling link as an error.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use dagswap_store::{Block, BlockStore};
use dagswap_types::Cid;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DagError, DagResult};

/// Shape statistics for a [`MerkleDag`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagStats {
    pub total_blocks: usize,
    pub total_size: u64,
    /// Blocks no other present block links to.
    pub root_blocks: usize,
    /// Blocks with no links to other present blocks.
    pub leaf_blocks: usize,
    /// Blocks on the longest root-to-leaf path. A lone block has depth 1.
    pub max_depth: usize,
}

/// An index of blocks keyed by CID, with edges taken from block links.
#[derive(Clone, Debug, Default)]
pub struct MerkleDag {
    blocks: HashMap<Cid, Block>,
    links: HashMap<Cid, Vec<Cid>>,
}

impl MerkleDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a DAG from every block in `store`.
    pub fn from_store(store: &dyn BlockStore) -> DagResult<Self> {
        let mut dag = Self::new();
        dag.load_from_store(store)?;
        Ok(dag)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Insert a block, replacing any block already stored under its CID.
    pub fn add_block(&mut self, block: Block) {
        let mut seen = HashSet::new();
        let links: Vec<Cid> = block
            .links()
            .into_iter()
            .filter(|cid| seen.insert(cid.clone()))
            .collect();
        debug!(cid = %block.cid(), links = links.len(), "added DAG block");
        self.links.insert(block.cid().clone(), links);
        self.blocks.insert(block.cid().clone(), block);
    }

    /// Remove a block. Returns `true` if it was present.
    pub fn remove_block(&mut self, cid: &Cid) -> bool {
        self.links.remove(cid);
        self.blocks.remove(cid).is_some()
    }

    /// Add every block in `store`. Returns how many blocks were added.
    pub fn load_from_store(&mut self, store: &dyn BlockStore) -> DagResult<usize> {
        let cids = store.all_cids()?;
        let mut count = 0;
        for (_, fetched) in store.get_all(&cids) {
            if let Some(block) = fetched? {
                self.add_block(block);
                count += 1;
            }
        }
        info!(blocks = count, "loaded DAG from store");
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn has_block(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    pub fn get_block(&self, cid: &Cid) -> Option<&Block> {
        self.blocks.get(cid)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Every CID in the DAG, sorted.
    pub fn cids(&self) -> Vec<Cid> {
        let mut cids: Vec<Cid> = self.blocks.keys().cloned().collect();
        cids.sort();
        cids
    }

    /// Outbound links of a block, dangling ones included.
    pub fn links(&self, cid: &Cid) -> Option<&[Cid]> {
        self.links.get(cid).map(Vec::as_slice)
    }

    /// Linked blocks that are present, in link order.
    pub fn children(&self, cid: &Cid) -> Vec<&Block> {
        self.present_links(cid)
            .filter_map(|c| self.blocks.get(c))
            .collect()
    }

    /// Present blocks that link to `cid`, sorted.
    pub fn parents(&self, cid: &Cid) -> Vec<Cid> {
        let mut parents: Vec<Cid> = self
            .links
            .iter()
            .filter(|(parent, links)| *parent != cid && links.contains(cid))
            .map(|(parent, _)| parent.clone())
            .collect();
        parents.sort();
        parents
    }

    /// Blocks that no other present block links to, sorted.
    pub fn roots(&self) -> Vec<Cid> {
        let referenced = self.referenced();
        let mut roots: Vec<Cid> = self
            .blocks
            .keys()
            .filter(|cid| !referenced.contains(cid))
            .cloned()
            .collect();
        roots.sort();
        roots
    }

    /// Blocks with no links to other present blocks, sorted.
    pub fn leaves(&self) -> Vec<Cid> {
        let mut leaves: Vec<Cid> = self
            .blocks
            .keys()
            .filter(|cid| self.present_links(cid).all(|c| c == *cid))
            .cloned()
            .collect();
        leaves.sort();
        leaves
    }

    /// Links from present blocks to present blocks, excluding self-links.
    fn referenced(&self) -> HashSet<&Cid> {
        self.links
            .iter()
            .flat_map(|(parent, links)| links.iter().filter(move |c| *c != parent))
            .filter(|c| self.blocks.contains_key(*c))
            .collect()
    }

    fn present_links<'a>(&'a self, cid: &Cid) -> impl Iterator<Item = &'a Cid> + 'a {
        self.links
            .get(cid)
            .into_iter()
            .flatten()
            .filter(move |c| self.blocks.contains_key(*c))
    }

    // ---------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------

    /// Pre-order depth-first walk from `root`, following links in order.
    ///
    /// `visit` returns `false` to stop the walk. Missing blocks are skipped
    /// and each block is visited at most once. Returns the number of blocks
    /// visited.
    pub fn depth_first_traversal<F>(&self, root: &Cid, mut visit: F) -> usize
    where
        F: FnMut(&Block) -> bool,
    {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(cid) = stack.pop() {
            if !visited.insert(cid) {
                continue;
            }
            let Some(block) = self.blocks.get(cid) else {
                continue;
            };
            if !visit(block) {
                break;
            }
            // Reverse so the first link is popped first.
            let links: Vec<&Cid> = self.present_links(cid).collect();
            stack.extend(links.into_iter().rev().filter(|c| !visited.contains(c)));
        }
        visited.iter().filter(|c| self.blocks.contains_key(**c)).count()
    }

    /// Breadth-first walk from `root`. Same contract as
    /// [`depth_first_traversal`](Self::depth_first_traversal).
    pub fn breadth_first_traversal<F>(&self, root: &Cid, mut visit: F) -> usize
    where
        F: FnMut(&Block) -> bool,
    {
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        let mut count = 0;
        while let Some(cid) = queue.pop_front() {
            let Some(block) = self.blocks.get(cid) else {
                continue;
            };
            count += 1;
            if !visit(block) {
                break;
            }
            for child in self.present_links(cid) {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        count
    }

    /// Present blocks reachable from any of `roots`, roots included.
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a Cid>) -> HashSet<Cid> {
        let mut reachable = HashSet::new();
        for root in roots {
            if reachable.contains(root) {
                continue;
            }
            self.breadth_first_traversal(root, |block| {
                reachable.insert(block.cid().clone());
                true
            });
        }
        reachable
    }

    /// Linked CIDs under `root` that are not present.
    ///
    /// If `root` itself is absent the result is just `root`.
    pub fn missing_links(&self, root: &Cid) -> HashSet<Cid> {
        if !self.has_block(root) {
            return HashSet::from([root.clone()]);
        }
        let mut missing = HashSet::new();
        self.breadth_first_traversal(root, |block| {
            if let Some(links) = self.links.get(block.cid()) {
                missing.extend(links.iter().filter(|c| !self.has_block(c)).cloned());
            }
            true
        });
        missing
    }

    /// Every linked CID that is not present, across the whole DAG.
    pub fn dangling_links(&self) -> HashSet<Cid> {
        self.links
            .values()
            .flatten()
            .filter(|c| !self.has_block(c))
            .cloned()
            .collect()
    }

    // ---------------------------------------------------------------
    // Topological sort
    // ---------------------------------------------------------------

    /// Order every block after all the blocks it links to.
    ///
    /// Uses Kahn's algorithm over present-to-present edges, releasing ready
    /// blocks in CID order for deterministic output. Fails with
    /// [`DagError::CycleDetected`] if some blocks can never become ready.
    pub fn topological_sort(&self) -> DagResult<Vec<Cid>> {
        // pending[cid] = number of present children not yet emitted.
        let mut pending: HashMap<&Cid, usize> = HashMap::with_capacity(self.blocks.len());
        let mut parents_of: HashMap<&Cid, Vec<&Cid>> = HashMap::new();
        for cid in self.blocks.keys() {
            let mut count = 0;
            for child in self.present_links(cid) {
                count += 1;
                parents_of.entry(child).or_default().push(cid);
            }
            pending.insert(cid, count);
        }

        let mut ready: BTreeSet<&Cid> = pending
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(cid, _)| *cid)
            .collect();
        let mut order = Vec::with_capacity(self.blocks.len());

        while let Some(cid) = ready.pop_first() {
            order.push(cid.clone());
            for parent in parents_of.get(cid).into_iter().flatten() {
                if let Some(n) = pending.get_mut(parent) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*parent);
                    }
                }
            }
        }

        if order.len() < self.blocks.len() {
            let stuck = pending
                .into_iter()
                .filter(|(_, n)| *n > 0)
                .map(|(cid, _)| cid)
                .min()
                .cloned();
            if let Some(cid) = stuck {
                return Err(DagError::CycleDetected(cid));
            }
        }
        Ok(order)
    }

    // ---------------------------------------------------------------
    // Statistics
    // ---------------------------------------------------------------

    pub fn calculate_stats(&self) -> DagStats {
        DagStats {
            total_blocks: self.blocks.len(),
            total_size: self.blocks.values().map(|b| b.len() as u64).sum(),
            root_blocks: self.roots().len(),
            leaf_blocks: self.leaves().len(),
            max_depth: self.max_depth(),
        }
    }

    /// Longest path in blocks, ignoring edges that close a cycle.
    fn max_depth(&self) -> usize {
        let mut depth: HashMap<&Cid, usize> = HashMap::with_capacity(self.blocks.len());
        let mut on_path: HashSet<&Cid> = HashSet::new();

        for start in self.blocks.keys() {
            if depth.contains_key(start) {
                continue;
            }
            // (cid, children already pushed)
            let mut stack = vec![(start, false)];
            while let Some((cid, expanded)) = stack.pop() {
                if expanded {
                    let below = self
                        .present_links(cid)
                        .filter_map(|c| depth.get(c).copied())
                        .max()
                        .unwrap_or(0);
                    depth.insert(cid, below + 1);
                    on_path.remove(cid);
                    continue;
                }
                if depth.contains_key(cid) || !on_path.insert(cid) {
                    continue;
                }
                stack.push((cid, true));
                for child in self.present_links(cid) {
                    if !depth.contains_key(child) && !on_path.contains(child) {
                        stack.push((child, false));
                    }
                }
            }
        }
        depth.values().copied().max().unwrap_or(0)
    }
}
