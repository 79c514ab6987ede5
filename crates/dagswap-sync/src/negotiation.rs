use std::collections::HashSet;

use dagswap_types::Cid;

use crate::types::Negotiation;

/// Want/have arithmetic over CID sets. Every output is sorted.
pub struct NegotiationEngine;

impl NegotiationEngine {
    /// CIDs the remote has that we don't.
    pub fn compute_wants(local: &HashSet<Cid>, remote: &HashSet<Cid>) -> Vec<Cid> {
        sorted(remote.difference(local).cloned())
    }

    /// CIDs to advertise.
    pub fn compute_haves(local: &HashSet<Cid>) -> Vec<Cid> {
        sorted(local.iter().cloned())
    }

    /// The `Have` answer to a `Want`: everything held for an empty request,
    /// otherwise the requested CIDs that are held.
    pub fn answer_want(local: &HashSet<Cid>, requested: &[Cid]) -> Vec<Cid> {
        if requested.is_empty() {
            return Self::compute_haves(local);
        }
        let requested: HashSet<&Cid> = requested.iter().collect();
        sorted(requested.into_iter().filter(|c| local.contains(*c)).cloned())
    }

    pub fn negotiate(local: &HashSet<Cid>, remote: &HashSet<Cid>) -> Negotiation {
        Negotiation {
            wants: Self::compute_wants(local, remote),
            offers: sorted(local.difference(remote).cloned()),
            common: sorted(local.intersection(remote).cloned()),
        }
    }
}

fn sorted(cids: impl Iterator<Item = Cid>) -> Vec<Cid> {
    let mut cids: Vec<Cid> = cids.collect();
    cids.sort();
    cids
}
