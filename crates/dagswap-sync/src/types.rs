use std::time::Duration;

use dagswap_net::PeerId;
use dagswap_types::Cid;
use serde::{Deserialize, Serialize};

/// Result of comparing local and remote inventories.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Negotiation {
    /// Held remotely, missing locally.
    pub wants: Vec<Cid>,
    /// Held locally, missing remotely.
    pub offers: Vec<Cid>,
    pub common: Vec<Cid>,
}

/// What one session with one peer achieved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub peer: PeerId,
    /// Blocks stored locally because of this session.
    pub received: Vec<Cid>,
    /// Blocks served to this peer while the session ran.
    pub sent: usize,
    /// Responses discarded because their payload did not hash to their CID.
    pub invalid: usize,
    /// Requests that went unanswered or were refused.
    pub failed: Vec<Cid>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.invalid == 0
    }
}

/// Lifetime counters for a synchronizer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub passes_started: u64,
    /// Continuous-sync ticks dropped because a pass was still running.
    pub passes_skipped: u64,
    pub sessions_succeeded: u64,
    pub sessions_failed: u64,
    pub blocks_received: u64,
    pub blocks_sent: u64,
    pub invalid_blocks: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    SyncStarted(PeerId),
    SyncCompleted(SyncReport),
    SyncFailed { peer: PeerId, error: String },
    /// A peer announced blocks we do not hold.
    BlocksDiscovered { cids: Vec<Cid>, peer: PeerId },
    /// Blocks fetched from a peer were verified and stored.
    BlocksFetched { cids: Vec<Cid>, peer: PeerId },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SyncReport {
        SyncReport {
            peer: PeerId::new("p"),
            received: vec![],
            sent: 0,
            invalid: 0,
            failed: vec![],
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn report_success_requires_clean_transfers() {
        assert!(report().success());
        assert!(!SyncReport { invalid: 1, ..report() }.success());
        let cid = dagswap_store::Block::raw(b"x".to_vec()).cid().clone();
        assert!(!SyncReport { failed: vec![cid], ..report() }.success());
    }
}
