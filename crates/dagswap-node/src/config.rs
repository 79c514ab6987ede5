use std::path::Path;
use std::time::Duration;

use dagswap_net::PeerManagerConfig;
use dagswap_store::StoreConfig;
use dagswap_sync::SyncConfig;
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Everything needed to build a [`Node`](crate::Node).
///
/// ```toml
/// display_name = "laptop"
/// address = "mem://laptop"
/// continuous_sync_interval_ms = 10000
///
/// [peer]
/// max_connections = 16
/// auto_connect = true
///
/// [sync]
/// request_timeout_ms = 2000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed peer id. A fresh one is generated when absent.
    pub peer_id: Option<String>,
    pub display_name: String,
    /// Listening address, used by [`Node::in_memory`](crate::Node::in_memory).
    pub address: String,
    pub peer: PeerManagerConfig,
    pub sync: SyncConfig,
    pub store: StoreConfig,
    /// Start continuous sync at this interval when the node starts.
    pub continuous_sync_interval_ms: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_id: None,
            display_name: "dagswap".into(),
            address: "mem://dagswap".into(),
            peer: PeerManagerConfig::default(),
            sync: SyncConfig::default(),
            store: StoreConfig::default(),
            continuous_sync_interval_ms: None,
        }
    }
}

impl NodeConfig {
    pub fn from_toml_str(text: &str) -> NodeResult<Self> {
        toml::from_str(text).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> NodeResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> NodeResult<String> {
        toml::to_string(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn continuous_sync_interval(&self) -> Option<Duration> {
        self.continuous_sync_interval_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_values() {
        let config = NodeConfig::default();
        assert!(config.peer_id.is_none());
        assert_eq!(config.peer.max_connections, 8);
        assert_eq!(config.sync.max_fetch_rounds, 16);
        assert!(config.continuous_sync_interval().is_none());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
            display_name = "laptop"
            continuous_sync_interval_ms = 250

            [peer]
            auto_connect = true

            [sync]
            request_timeout_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(config.display_name, "laptop");
        assert_eq!(config.continuous_sync_interval(), Some(Duration::from_millis(250)));
        assert!(config.peer.auto_connect);
        assert_eq!(config.peer.connect_timeout_ms, 5_000);
        assert_eq!(config.sync.request_timeout_ms, 2_000);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = NodeConfig::from_toml_str("display_name = [").unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "address = \"mem://from-file\"").unwrap();
        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.address, "mem://from-file");

        assert!(matches!(
            NodeConfig::load("/nonexistent/dagswap.toml"),
            Err(NodeError::Io(_))
        ));
    }

    #[test]
    fn toml_roundtrip() {
        let config = NodeConfig {
            peer_id: Some("fixed".into()),
            continuous_sync_interval_ms: Some(1_000),
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(NodeConfig::from_toml_str(&text).unwrap(), config);
    }
}
