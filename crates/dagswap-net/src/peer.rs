use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

/// Application-level identity of a peer, confirmed by a handshake.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh, time-ordered identity.
    pub fn random() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Where a device can be reached. Not an identity: the same peer may show
/// up at different addresses over time.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Connection lifecycle of a peer or device.
///
/// ```text
/// discovered -> connecting -> connected -> disconnecting -> disconnected
///                   |                                          |
///                   +--> failed --------> connecting <---------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Discovered,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Failed,
}

impl PeerStatus {
    pub fn can_transition_to(self, next: PeerStatus) -> bool {
        use PeerStatus::*;
        matches!(
            (self, next),
            (Discovered, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
                | (Disconnected, Connecting)
                | (Failed, Connecting)
        )
    }

    /// True when a fresh connection attempt may start from this state.
    pub fn can_connect(self) -> bool {
        self.can_transition_to(PeerStatus::Connecting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known peer. The record outlives its connections; disconnecting only
/// changes `status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub address: DeviceAddress,
    pub status: PeerStatus,
    pub metadata: BTreeMap<String, String>,
    pub last_seen: DateTime<Utc>,
}

impl Peer {
    pub fn new(id: PeerId, address: DeviceAddress) -> Self {
        Self {
            id,
            address,
            status: PeerStatus::Discovered,
            metadata: BTreeMap::new(),
            last_seen: Utc::now(),
        }
    }

    /// Move to `next`, rejecting edges the lifecycle does not allow.
    pub fn transition(&mut self, next: PeerStatus) -> NetResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(NetError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.last_seen = Utc::now();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.status == PeerStatus::Connected
    }
}

/// The identity this node presents during handshakes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub peer_id: PeerId,
    pub display_name: String,
}

impl LocalIdentity {
    pub fn new(peer_id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            peer_id,
            display_name: display_name.into(),
        }
    }
}
