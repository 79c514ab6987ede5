use dagswap_types::HashAlgorithm;
use serde::{Deserialize, Serialize};

/// Block store settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of blocks held by the read cache.
    pub cache_capacity_blocks: usize,
    /// Maximum total payload bytes held by the read cache.
    pub cache_capacity_bytes: u64,
    /// Hash algorithm for blocks created locally.
    pub default_hash: HashAlgorithm,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity_blocks: 1024,
            cache_capacity_bytes: 64 * 1024 * 1024,
            default_hash: crate::block::DEFAULT_HASH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = StoreConfig::default();
        assert_eq!(config.cache_capacity_blocks, 1024);
        assert_eq!(config.cache_capacity_bytes, 64 * 1024 * 1024);
        assert_eq!(config.default_hash, HashAlgorithm::Sha2_256);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"cache_capacity_blocks": 8}"#).unwrap();
        assert_eq!(config.cache_capacity_blocks, 8);
        assert_eq!(config.cache_capacity_bytes, 64 * 1024 * 1024);
    }
}
