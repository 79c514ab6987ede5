//! A complete dagswap node.
//!
//! [`Node`] wires a block store, the [`MerkleDag`](dagswap_dag::MerkleDag)
//! index, a [`PeerManager`](dagswap_net::PeerManager), and a
//! [`Synchronizer`](dagswap_sync::Synchronizer) together, configured from a
//! single [`NodeConfig`] that can be loaded from TOML.

pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::Node;

pub use dagswap_dag::{DagStats, MerkleDag};
pub use dagswap_net::{DeviceAddress, DiscoveryHub, MemoryNetwork, PeerEvent, PeerId};
pub use dagswap_protocol::BitswapMessage;
pub use dagswap_store::{Block, BlockStore, Directory, DirectoryEntry};
pub use dagswap_sync::{SyncEvent, SyncReport, SyncStats};
pub use dagswap_types::{Cid, CodecType, HashAlgorithm};
