use dagswap_codec::CodecError;
use dagswap_types::Cid;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing medium is down or its state is unusable (for the in-memory
    /// store: a poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A block payload could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A structured payload decoded but did not have the expected shape.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Block bytes do not hash to the block's CID.
    #[error("integrity failure: {0} does not match its data")]
    IntegrityFailure(Cid),
}

impl StoreError {
    pub(crate) fn poisoned<T>(_: T) -> Self {
        Self::Unavailable("lock poisoned".into())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
