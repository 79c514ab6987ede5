//! Merkle DAG over content-addressed blocks.
//!
//! [`MerkleDag`] is a flat map from CID to block. Edges are not stored as
//! pointers: each block's outbound links are extracted by its codec when the
//! block is added and cached alongside it. A link to a CID that is not in the
//! map is a *dangling* link, which is normal for a partially synced graph.
//!
//! Because edges are data rather than structure, a cycle can exist if blocks
//! are injected with forged CIDs. Traversals tolerate cycles and
//! [`MerkleDag::topological_sort`] reports them as [`DagError::CycleDetected`].

pub mod dag;
pub mod error;

pub use dag::{DagStats, MerkleDag};
pub use error::{DagError, DagResult};
