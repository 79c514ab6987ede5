use thiserror::Error;

use dagswap_net::PeerId;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The peer is not connected or stopped accepting messages.
    #[error("peer {0} is unavailable")]
    PeerUnavailable(PeerId),

    #[error("no connected peers")]
    NoPeers,

    /// Another session with this peer is still running.
    #[error("a sync session with {0} is already in progress")]
    SessionInProgress(PeerId),

    #[error("timed out waiting for {waiting_for} from {peer}")]
    Timeout { peer: PeerId, waiting_for: String },

    #[error("store error: {0}")]
    Store(#[from] dagswap_store::StoreError),

    #[error("protocol error: {0}")]
    Protocol(#[from] dagswap_protocol::ProtocolError),

    #[error("dag error: {0}")]
    Dag(#[from] dagswap_dag::DagError),
}

pub type SyncResult<T> = Result<T, SyncError>;
