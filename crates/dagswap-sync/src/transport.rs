use async_trait::async_trait;
use dagswap_net::{PeerEvent, PeerId, PeerManager};
use tokio::sync::broadcast;

/// The slice of the peer layer the synchronizer needs: who is connected,
/// a way to send them a frame, and the stream of what they send back.
#[async_trait]
pub trait PeerNetwork: Send + Sync {
    fn connected_peers(&self) -> Vec<PeerId>;

    /// `false` if the frame could not be handed to the peer.
    async fn send(&self, peer: &PeerId, payload: Vec<u8>) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<PeerEvent>;
}

#[async_trait]
impl PeerNetwork for PeerManager {
    fn connected_peers(&self) -> Vec<PeerId> {
        PeerManager::connected_peers(self)
    }

    async fn send(&self, peer: &PeerId, payload: Vec<u8>) -> bool {
        self.send_message(peer, payload).await
    }

    fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        PeerManager::subscribe(self)
    }
}
