use thiserror::Error;

use crate::peer::{DeviceAddress, PeerId, PeerStatus};

/// Errors produced by the peer layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NetError {
    /// The transport could not reach the device.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed {
        address: DeviceAddress,
        reason: String,
    },

    /// The remote side never completed the handshake.
    #[error("handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout { timeout_ms: u64 },

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("connection limit of {0} reached")]
    ConnectionLimit(usize),

    /// Too many recent failures for this address.
    #[error("connection attempts to {address} throttled for {retry_after_ms}ms")]
    Throttled {
        address: DeviceAddress,
        retry_after_ms: u64,
    },

    #[error("inbound connection from {0} was not approved")]
    ApprovalDenied(DeviceAddress),

    #[error("peer {0} is not connected")]
    PeerNotConnected(PeerId),

    #[error("invalid peer transition {from} -> {to}")]
    InvalidTransition { from: PeerStatus, to: PeerStatus },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("peer store error: {0}")]
    PeerStore(String),
}

impl NetError {
    /// Failures worth another attempt at the same address.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::HandshakeTimeout { .. }
                | Self::Transport(_)
                | Self::Timeout(_)
        )
    }

    pub(crate) fn connection_failed(address: &DeviceAddress, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.clone(),
            reason: reason.into(),
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;
