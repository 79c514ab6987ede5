//! Peer layer for dagswap.
//!
//! Turns reachable devices into identified, connected peers and moves opaque
//! frames between them:
//!
//! - [`DeviceDiscovery`] reports devices by [`DeviceAddress`]
//! - [`TransportProtocol`] dials and accepts [`Connection`]s
//! - [`ConnectionPolicy`] screens every inbound connection
//! - [`HandshakeProtocol`] confirms the [`PeerId`] behind a connection
//! - [`PeerStore`] remembers peers across connections
//! - [`PeerManager`] owns all of the above and publishes [`PeerEvent`]s
//!
//! In-memory implementations ([`MemoryNetwork`], [`DiscoveryHub`],
//! [`InMemoryPeerStore`]) run whole networks inside one process.

pub mod config;
pub mod discovery;
pub mod error;
pub mod handshake;
pub mod manager;
pub mod peer;
pub mod policy;
pub mod store;
pub mod transport;

pub use config::PeerManagerConfig;
pub use discovery::{
    BroadcastDiscovery, DeviceDiscovery, DiscoveredDevice, DiscoveryEvent, DiscoveryHub,
    NoopDiscovery,
};
pub use error::{NetError, NetResult};
pub use handshake::{
    DefaultHandshake, HandshakeMessage, HandshakeProtocol, HandshakeResult, PROTOCOL_VERSION,
};
pub use manager::{PeerEvent, PeerManager};
pub use peer::{DeviceAddress, LocalIdentity, Peer, PeerId, PeerStatus};
pub use policy::{
    AcceptAll, CallbackPolicy, ConnectionPolicy, InboundRequest, ManualApproval, PendingApproval,
    RejectAll,
};
pub use store::{InMemoryPeerStore, PeerStore, PeerStoreEvent};
pub use transport::{
    Connection, IncomingConnections, MemoryConnection, MemoryNetwork, MemoryTransport,
    TransportProtocol,
};
