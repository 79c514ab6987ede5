use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`Synchronizer`](crate::Synchronizer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long to wait for any single answer from a peer.
    pub request_timeout_ms: u64,
    /// Block requests outstanding per session at once.
    pub max_inflight_requests: usize,
    /// Pass blocks received from one peer on to the others with `Have`.
    pub announce_received: bool,
    /// Start a session with every peer as soon as it connects.
    pub sync_on_connect: bool,
    /// Upper bound on DAG walks in `fetch_missing_blocks`.
    pub max_fetch_rounds: usize,
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            max_inflight_requests: 32,
            announce_received: true,
            sync_on_connect: false,
            max_fetch_rounds: 16,
            event_capacity: 1024,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let c = SyncConfig::default();
        assert_eq!(c.request_timeout(), Duration::from_secs(5));
        assert_eq!(c.max_inflight_requests, 32);
        assert!(c.announce_received);
        assert!(!c.sync_on_connect);
        assert_eq!(c.max_fetch_rounds, 16);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let c: SyncConfig = serde_json::from_str(r#"{"sync_on_connect": true}"#).unwrap();
        assert!(c.sync_on_connect);
        assert_eq!(c.request_timeout_ms, 5_000);
    }
}
