use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NetError, NetResult};
use crate::peer::{LocalIdentity, PeerId};
use crate::transport::Connection;

/// Version spoken by [`DefaultHandshake`]. Peers on other versions are
/// rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Frames exchanged while upgrading a connection to a peer session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeMessage {
    Hello {
        peer_id: PeerId,
        version: u32,
        display_name: String,
    },
    Welcome {
        peer_id: PeerId,
        version: u32,
    },
    Reject {
        reason: String,
    },
}

impl HandshakeMessage {
    pub fn encode(&self) -> NetResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| NetError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> NetResult<Self> {
        bincode::deserialize(bytes).map_err(|e| NetError::Serialization(e.to_string()))
    }
}

/// Outcome of one handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeResult {
    pub success: bool,
    pub remote_peer_id: Option<PeerId>,
    pub error: Option<NetError>,
}

impl HandshakeResult {
    pub fn accepted(remote: PeerId) -> Self {
        Self {
            success: true,
            remote_peer_id: Some(remote),
            error: None,
        }
    }

    pub fn failed(error: NetError) -> Self {
        Self {
            success: false,
            remote_peer_id: None,
            error: Some(error),
        }
    }

    /// The confirmed remote identity, or the reason there is none.
    pub fn into_result(self) -> NetResult<PeerId> {
        match (self.remote_peer_id, self.error) {
            (Some(peer), None) if self.success => Ok(peer),
            (_, Some(error)) => Err(error),
            _ => Err(NetError::HandshakeRejected("handshake did not complete".into())),
        }
    }
}

/// Upgrades an anonymous connection into an identified peer session.
///
/// Both sides must resolve within a bounded time; a silent remote yields a
/// failed result, never a hang.
#[async_trait]
pub trait HandshakeProtocol: Send + Sync {
    async fn initiate(&self, connection: &dyn Connection, local: &LocalIdentity) -> HandshakeResult;

    async fn respond(&self, connection: &dyn Connection, local: &LocalIdentity) -> HandshakeResult;

    /// Tell a dialer it will not be let in, before the connection closes.
    async fn reject(&self, _connection: &dyn Connection, _reason: &str) {}
}

/// `Hello` from the dialer, answered with `Welcome` or `Reject`.
#[derive(Clone, Debug)]
pub struct DefaultHandshake {
    timeout: Duration,
    version: u32,
}

impl DefaultHandshake {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            version: PROTOCOL_VERSION,
        }
    }

    /// Speak a different protocol version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    async fn next_message(&self, connection: &dyn Connection) -> NetResult<HandshakeMessage> {
        let frame = tokio::time::timeout(self.timeout, connection.recv())
            .await
            .map_err(|_| NetError::HandshakeTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })??;
        let frame = frame.ok_or_else(|| {
            NetError::connection_failed(connection.remote_address(), "closed during handshake")
        })?;
        HandshakeMessage::decode(&frame)
    }

    async fn send(&self, connection: &dyn Connection, message: &HandshakeMessage) -> NetResult<()> {
        connection.send(message.encode()?).await
    }

    async fn run_initiator(
        &self,
        connection: &dyn Connection,
        local: &LocalIdentity,
    ) -> NetResult<PeerId> {
        let hello = HandshakeMessage::Hello {
            peer_id: local.peer_id.clone(),
            version: self.version,
            display_name: local.display_name.clone(),
        };
        self.send(connection, &hello).await?;
        match self.next_message(connection).await? {
            HandshakeMessage::Welcome { peer_id, version } if version == self.version => Ok(peer_id),
            HandshakeMessage::Welcome { version, .. } => Err(NetError::HandshakeRejected(format!(
                "remote speaks version {version}, expected {}",
                self.version
            ))),
            HandshakeMessage::Reject { reason } => Err(NetError::HandshakeRejected(reason)),
            HandshakeMessage::Hello { .. } => Err(NetError::HandshakeRejected(
                "unexpected hello from the accepting side".into(),
            )),
        }
    }

    async fn run_responder(
        &self,
        connection: &dyn Connection,
        local: &LocalIdentity,
    ) -> NetResult<PeerId> {
        let (peer_id, version, display_name) = match self.next_message(connection).await? {
            HandshakeMessage::Hello {
                peer_id,
                version,
                display_name,
            } => (peer_id, version, display_name),
            other => {
                return Err(NetError::HandshakeRejected(format!(
                    "expected hello, got {other:?}"
                )))
            }
        };
        if version != self.version {
            let reason = format!("unsupported protocol version {version}");
            self.send(connection, &HandshakeMessage::Reject { reason: reason.clone() })
                .await?;
            return Err(NetError::HandshakeRejected(reason));
        }
        if peer_id == local.peer_id {
            let reason = "connection to self".to_string();
            self.send(connection, &HandshakeMessage::Reject { reason: reason.clone() })
                .await?;
            return Err(NetError::HandshakeRejected(reason));
        }
        self.send(
            connection,
            &HandshakeMessage::Welcome {
                peer_id: local.peer_id.clone(),
                version: self.version,
            },
        )
        .await?;
        debug!(peer = %peer_id, name = %display_name, "accepted hello");
        Ok(peer_id)
    }
}

impl Default for DefaultHandshake {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl HandshakeProtocol for DefaultHandshake {
    async fn initiate(&self, connection: &dyn Connection, local: &LocalIdentity) -> HandshakeResult {
        match self.run_initiator(connection, local).await {
            Ok(remote) => HandshakeResult::accepted(remote),
            Err(error) => HandshakeResult::failed(error),
        }
    }

    async fn respond(&self, connection: &dyn Connection, local: &LocalIdentity) -> HandshakeResult {
        match self.run_responder(connection, local).await {
            Ok(remote) => HandshakeResult::accepted(remote),
            Err(error) => HandshakeResult::failed(error),
        }
    }

    async fn reject(&self, connection: &dyn Connection, reason: &str) {
        let reject = HandshakeMessage::Reject {
            reason: reason.to_string(),
        };
        if let Err(error) = self.send(connection, &reject).await {
            debug!(%error, "could not deliver handshake reject");
        }
    }
}
