use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`PeerManager`](crate::PeerManager).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerManagerConfig {
    /// Connected plus in-flight outbound connections allowed at once.
    pub max_connections: usize,
    pub connect_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Extra attempts after the first failure of a `connect_to_device` call.
    pub connect_retries: u32,
    /// Base delay between attempts; doubles with each consecutive failure.
    pub retry_backoff_ms: u64,
    pub max_retry_backoff_ms: u64,
    /// How long a manual approval may stay unanswered before it is rejected.
    pub approval_timeout_ms: u64,
    /// Dial every device as soon as discovery reports it.
    pub auto_connect: bool,
    /// Capacity of the peer event channel.
    pub event_capacity: usize,
}

impl Default for PeerManagerConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            connect_timeout_ms: 5_000,
            handshake_timeout_ms: 5_000,
            connect_retries: 2,
            retry_backoff_ms: 500,
            max_retry_backoff_ms: 30_000,
            approval_timeout_ms: 30_000,
            auto_connect: false,
            event_capacity: 1024,
        }
    }
}

impl PeerManagerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }

    /// Delay after the `failures`-th consecutive failure (1-based), capped
    /// at `max_retry_backoff_ms`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(32);
        let delay = self.retry_backoff_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_retry_backoff_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let c = PeerManagerConfig::default();
        assert_eq!(c.max_connections, 8);
        assert_eq!(c.connect_timeout(), Duration::from_secs(5));
        assert_eq!(c.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(c.connect_retries, 2);
        assert_eq!(c.approval_timeout(), Duration::from_secs(30));
        assert!(!c.auto_connect);
        assert_eq!(c.event_capacity, 1024);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let c = PeerManagerConfig {
            retry_backoff_ms: 100,
            max_retry_backoff_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(c.backoff(1), Duration::from_millis(100));
        assert_eq!(c.backoff(2), Duration::from_millis(200));
        assert_eq!(c.backoff(4), Duration::from_millis(800));
        assert_eq!(c.backoff(5), Duration::from_millis(1_000));
        assert_eq!(c.backoff(200), Duration::from_millis(1_000));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let c: PeerManagerConfig = serde_json::from_str(r#"{"max_connections": 2}"#).unwrap();
        assert_eq!(c.max_connections, 2);
        assert_eq!(c.retry_backoff_ms, 500);
    }
}
