use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// A hash algorithm, identified by its multihash code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// No hashing: the digest is the input bytes. Weak by construction.
    Identity,
    /// SHA-256 (32-byte digest).
    Sha2_256,
    /// SHA-512 (64-byte digest).
    Sha2_512,
    /// BLAKE3 with the default 32-byte output.
    Blake3,
}

impl HashAlgorithm {
    /// Every algorithm this crate knows about.
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Identity,
        HashAlgorithm::Sha2_256,
        HashAlgorithm::Sha2_512,
        HashAlgorithm::Blake3,
    ];

    /// The multihash code for this algorithm.
    pub const fn code(&self) -> u64 {
        match self {
            Self::Identity => 0x00,
            Self::Sha2_256 => 0x12,
            Self::Sha2_512 => 0x13,
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up an algorithm by multihash code.
    pub fn from_code(code: u64) -> CryptoResult<Self> {
        match code {
            0x00 => Ok(Self::Identity),
            0x12 => Ok(Self::Sha2_256),
            0x13 => Ok(Self::Sha2_512),
            0x1e => Ok(Self::Blake3),
            other => Err(CryptoError::UnsupportedAlgorithm(other)),
        }
    }

    /// Fixed digest length in bytes, or `None` for identity (variable).
    pub const fn digest_len(&self) -> Option<usize> {
        match self {
            Self::Identity => None,
            Self::Sha2_256 => Some(32),
            Self::Sha2_512 => Some(64),
            Self::Blake3 => Some(32),
        }
    }

    /// Returns `true` for the identity pseudo-hash.
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Canonical multicodec table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Sha2_256 => "sha2-256",
            Self::Sha2_512 => "sha2-512",
            Self::Blake3 => "blake3",
        }
    }

    /// Parse a multicodec table name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip() {
        for alg in HashAlgorithm::ALL {
            assert_eq!(HashAlgorithm::from_code(alg.code()).unwrap(), alg);
        }
    }

    #[test]
    fn unknown_code_is_unsupported() {
        assert_eq!(
            HashAlgorithm::from_code(0xb220),
            Err(CryptoError::UnsupportedAlgorithm(0xb220))
        );
    }

    #[test]
    fn digest_lengths() {
        assert_eq!(HashAlgorithm::Sha2_256.digest_len(), Some(32));
        assert_eq!(HashAlgorithm::Sha2_512.digest_len(), Some(64));
        assert_eq!(HashAlgorithm::Blake3.digest_len(), Some(32));
        assert_eq!(HashAlgorithm::Identity.digest_len(), None);
    }

    #[test]
    fn names() {
        assert_eq!(HashAlgorithm::Sha2_256.to_string(), "sha2-256");
        assert_eq!(HashAlgorithm::from_name("blake3"), Some(HashAlgorithm::Blake3));
        assert_eq!(HashAlgorithm::from_name("md5"), None);
    }
}
