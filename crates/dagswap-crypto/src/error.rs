/// Errors from hash algorithm lookup.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The multihash code is unknown or not carried by the registry.
    #[error("unsupported hash algorithm: {0:#x}")]
    UnsupportedAlgorithm(u64),
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
