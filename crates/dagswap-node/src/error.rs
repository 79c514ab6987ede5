use dagswap_types::Cid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    /// A locally added block whose payload does not hash to its CID.
    #[error("block {0} does not match its CID")]
    InvalidBlock(Cid),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] dagswap_store::StoreError),

    #[error("dag error: {0}")]
    Dag(#[from] dagswap_dag::DagError),

    #[error("network error: {0}")]
    Net(#[from] dagswap_net::NetError),

    #[error("sync error: {0}")]
    Sync(#[from] dagswap_sync::SyncError),
}

pub type NodeResult<T> = Result<T, NodeError>;
