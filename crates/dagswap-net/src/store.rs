use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::error::{NetError, NetResult};
use crate::peer::{Peer, PeerId};

#[derive(Clone, Debug, PartialEq)]
pub enum PeerStoreEvent {
    PeerAdded(Peer),
    PeerUpdated(Peer),
    PeerRemoved(PeerId),
}

/// Persistence for known peers.
///
/// The [`PeerManager`](crate::PeerManager) is the only writer; everything
/// else reads.
pub trait PeerStore: Send + Sync {
    /// Insert or replace the record for `peer.id`.
    fn store_peer(&self, peer: Peer) -> NetResult<()>;

    /// Returns `true` if a record was removed.
    fn remove_peer(&self, id: &PeerId) -> NetResult<bool>;

    fn get_peer(&self, id: &PeerId) -> NetResult<Option<Peer>>;

    fn all_peers(&self) -> NetResult<Vec<Peer>>;

    fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent>;
}

/// `HashMap`-backed peer store.
pub struct InMemoryPeerStore {
    peers: RwLock<HashMap<PeerId, Peer>>,
    events: broadcast::Sender<PeerStoreEvent>,
}

impl InMemoryPeerStore {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            events: broadcast::channel(256).0,
        }
    }

    pub fn len(&self) -> NetResult<usize> {
        Ok(self.peers.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> NetResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryPeerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> NetError {
    NetError::PeerStore("peer store lock poisoned".into())
}

impl PeerStore for InMemoryPeerStore {
    fn store_peer(&self, peer: Peer) -> NetResult<()> {
        let previous = self
            .peers
            .write()
            .map_err(poisoned)?
            .insert(peer.id.clone(), peer.clone());
        let event = match previous {
            Some(_) => PeerStoreEvent::PeerUpdated(peer),
            None => PeerStoreEvent::PeerAdded(peer),
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
        Ok(())
    }

    fn remove_peer(&self, id: &PeerId) -> NetResult<bool> {
        let removed = self.peers.write().map_err(poisoned)?.remove(id).is_some();
        if removed {
            let _ = self.events.send(PeerStoreEvent::PeerRemoved(id.clone()));
        }
        Ok(removed)
    }

    fn get_peer(&self, id: &PeerId) -> NetResult<Option<Peer>> {
        Ok(self.peers.read().map_err(poisoned)?.get(id).cloned())
    }

    fn all_peers(&self) -> NetResult<Vec<Peer>> {
        let mut peers: Vec<Peer> = self.peers.read().map_err(poisoned)?.values().cloned().collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(peers)
    }

    fn subscribe(&self) -> broadcast::Receiver<PeerStoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{DeviceAddress, PeerStatus};

    fn peer(id: &str) -> Peer {
        Peer::new(PeerId::new(id), DeviceAddress::new(format!("mem://{id}")))
    }

    #[test]
    fn store_get_remove() {
        let store = InMemoryPeerStore::new();
        store.store_peer(peer("b")).unwrap();
        store.store_peer(peer("a")).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.get_peer(&PeerId::new("a")).unwrap().unwrap().id.as_str(), "a");

        let ids: Vec<_> = store.all_peers().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PeerId::new("a"), PeerId::new("b")]);

        assert!(store.remove_peer(&PeerId::new("a")).unwrap());
        assert!(!store.remove_peer(&PeerId::new("a")).unwrap());
        assert!(store.get_peer(&PeerId::new("a")).unwrap().is_none());
    }

    #[test]
    fn events_distinguish_add_and_update() {
        let store = InMemoryPeerStore::new();
        let mut events = store.subscribe();

        let mut p = peer("a");
        store.store_peer(p.clone()).unwrap();
        p.status = PeerStatus::Connecting;
        store.store_peer(p.clone()).unwrap();
        store.remove_peer(&p.id).unwrap();

        assert!(matches!(events.try_recv().unwrap(), PeerStoreEvent::PeerAdded(_)));
        match events.try_recv().unwrap() {
            PeerStoreEvent::PeerUpdated(updated) => {
                assert_eq!(updated.status, PeerStatus::Connecting)
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            events.try_recv().unwrap(),
            PeerStoreEvent::PeerRemoved(PeerId::new("a"))
        );
    }
}
