use thiserror::Error;

/// Errors produced while constructing or parsing addressing types.
///
/// All variants are caller errors: the input was malformed or names an
/// algorithm or codec that is not available. They are never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed multihash: {0}")]
    MalformedMultihash(String),

    #[error("malformed CID: {0}")]
    MalformedCid(String),

    #[error("unsupported hash algorithm: {0:#x}")]
    UnsupportedAlgorithm(u64),

    #[error("unsupported codec: {0:#x}")]
    UnsupportedCodec(u64),

    #[error("invalid CID version: {0}")]
    InvalidVersion(u64),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl From<dagswap_crypto::CryptoError> for TypeError {
    fn from(err: dagswap_crypto::CryptoError) -> Self {
        match err {
            dagswap_crypto::CryptoError::UnsupportedAlgorithm(code) => Self::UnsupportedAlgorithm(code),
        }
    }
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
