//! Block synchronization for dagswap.
//!
//! A [`Synchronizer`] speaks the block exchange protocol over any
//! [`PeerNetwork`] (normally a [`dagswap_net::PeerManager`]):
//!
//! - inbound `Want`, `BlockRequest`, and `Ping` are answered in the
//!   background from the local store
//! - a session with one peer swaps inventories and pulls what is missing
//! - every received block is hash-checked before it is stored
//! - continuous sync repeats sessions on an interval without overlap

pub mod config;
pub mod error;
pub mod negotiation;
pub mod synchronizer;
pub mod transport;
pub mod types;
pub mod verifier;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use negotiation::NegotiationEngine;
pub use synchronizer::Synchronizer;
pub use transport::PeerNetwork;
pub use types::{Negotiation, SyncEvent, SyncReport, SyncStats};
pub use verifier::{BlockVerifier, Rejection};
