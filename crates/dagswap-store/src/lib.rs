//! Hash-verified blocks and content-addressed block storage.
//!
//! A [`Block`] pairs a payload with the [`Cid`](dagswap_types::Cid) that
//! addresses it. Stores are keyed by CID and never interpret payloads except
//! to follow links during garbage collection.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`InMemoryBlockStore`] -- `HashMap`-based store for tests and embedding
//! - [`CachedBlockStore`] -- LRU read cache wrapping any other store
//!
//! # Design Rules
//!
//! 1. Blocks are immutable; the same bytes always produce the same CID.
//! 2. `put` is idempotent and safe to call concurrently for the same block.
//! 3. Absence is `Ok(None)` / `Ok(false)`, never an error.
//! 4. A backend that cannot serve a request fails with
//!    [`StoreError::Unavailable`].
//! 5. Garbage collection never deletes a root or anything reachable from one.

pub mod block;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod memory;
pub mod traits;

pub use block::{Block, DEFAULT_HASH};
pub use cache::{CacheStats, CachedBlockStore};
pub use config::StoreConfig;
pub use directory::{Directory, DirectoryEntry, EntryKind};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBlockStore;
pub use traits::{mark_reachable, BlockStore, GcReport, StoreStats};
