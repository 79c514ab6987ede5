use std::collections::BTreeSet;
use std::sync::Arc;

use crate::algorithm::HashAlgorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::hasher::Hasher;

/// Factory for [`Hasher`]s, restricted to a configured set of algorithms.
#[derive(Clone, Debug)]
pub struct HashRegistry {
    enabled: BTreeSet<HashAlgorithm>,
}

impl HashRegistry {
    /// Registry carrying every built-in algorithm.
    pub fn standard() -> Self {
        Self::with_algorithms(HashAlgorithm::ALL)
    }

    /// Registry carrying only the given algorithms.
    pub fn with_algorithms(algorithms: impl IntoIterator<Item = HashAlgorithm>) -> Self {
        Self {
            enabled: algorithms.into_iter().collect(),
        }
    }

    /// Whether `algorithm` can be created by this registry.
    pub fn is_supported(&self, algorithm: HashAlgorithm) -> bool {
        self.enabled.contains(&algorithm)
    }

    /// Whether the multihash `code` names an algorithm this registry carries.
    pub fn is_supported_code(&self, code: u64) -> bool {
        HashAlgorithm::from_code(code)
            .map(|a| self.is_supported(a))
            .unwrap_or(false)
    }

    /// Create a hasher for `algorithm`.
    pub fn create(&self, algorithm: HashAlgorithm) -> CryptoResult<Arc<dyn Hasher>> {
        if !self.is_supported(algorithm) {
            return Err(CryptoError::UnsupportedAlgorithm(algorithm.code()));
        }
        Ok(algorithm.hasher())
    }

    /// Create a hasher from a raw multihash code.
    pub fn create_by_code(&self, code: u64) -> CryptoResult<Arc<dyn Hasher>> {
        self.create(HashAlgorithm::from_code(code)?)
    }

    /// Hash `data` with `algorithm` in one call.
    pub fn digest(&self, algorithm: HashAlgorithm, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(self.create(algorithm)?.hash(data))
    }

    /// Algorithms carried by this registry, in code order.
    pub fn algorithms(&self) -> impl Iterator<Item = HashAlgorithm> + '_ {
        self.enabled.iter().copied()
    }
}

impl Default for HashRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
