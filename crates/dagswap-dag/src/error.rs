//! Error types for the Merkle DAG.

use dagswap_store::StoreError;
use dagswap_types::Cid;

/// Errors that can occur during DAG operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A link cycle was found. Content addressing makes cycles impossible for
    /// honestly built blocks, so this always means injected or corrupt data.
    #[error("cycle detected involving block {0}")]
    CycleDetected(Cid),

    /// A referenced block is not in the DAG.
    #[error("block not found: {0}")]
    BlockNotFound(Cid),

    /// Loading from a block store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
