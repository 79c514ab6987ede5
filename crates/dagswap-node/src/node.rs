use std::sync::{Arc, RwLock};

use bytes::Bytes;
use dagswap_dag::MerkleDag;
use dagswap_net::{
    AcceptAll, ConnectionPolicy, DefaultHandshake, DeviceAddress, DeviceDiscovery,
    DiscoveredDevice, DiscoveryHub, InMemoryPeerStore, LocalIdentity, MemoryNetwork, PeerId,
    PeerManager, PeerStore, TransportProtocol,
};
use dagswap_store::{Block, BlockStore, CachedBlockStore, Directory, InMemoryBlockStore};
use dagswap_sync::Synchronizer;
use dagswap_types::{Cid, CodecType};
use tracing::{debug, info};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};

/// One participant in a dagswap network.
///
/// Owns a cached in-memory block store, the DAG index over it, a
/// [`PeerManager`], and a [`Synchronizer`] speaking over that manager.
/// Blocks added through the node are stored, indexed, and announced to
/// every connected peer.
pub struct Node {
    config: NodeConfig,
    store: Arc<dyn BlockStore>,
    dag: Arc<RwLock<MerkleDag>>,
    peers: PeerManager,
    sync: Synchronizer,
}

impl Node {
    /// Build a node over caller-supplied collaborators. Must be called inside
    /// a Tokio runtime.
    pub fn new(
        config: NodeConfig,
        transport: Arc<dyn TransportProtocol>,
        discovery: Arc<dyn DeviceDiscovery>,
        policy: Arc<dyn ConnectionPolicy>,
        peer_store: Arc<dyn PeerStore>,
    ) -> Self {
        let peer_id = config
            .peer_id
            .as_deref()
            .map(PeerId::new)
            .unwrap_or_else(PeerId::random);
        let identity = LocalIdentity::new(peer_id, config.display_name.clone());
        let handshake = Arc::new(DefaultHandshake::new(config.peer.handshake_timeout()));
        let peers = PeerManager::new(
            identity,
            config.peer.clone(),
            transport,
            discovery,
            handshake,
            policy,
            peer_store,
        );

        let store: Arc<dyn BlockStore> = Arc::new(CachedBlockStore::new(
            InMemoryBlockStore::new(),
            &config.store,
        ));
        let dag = Arc::new(RwLock::new(MerkleDag::new()));
        let sync = Synchronizer::new(
            config.sync.clone(),
            Arc::clone(&store),
            Arc::clone(&dag),
            Arc::new(peers.clone()),
        );
        info!(peer = %peers.local_id(), address = %peers.local_address(), "node created");

        Self {
            config,
            store,
            dag,
            peers,
            sync,
        }
    }

    /// A node on an in-process network, discoverable through `hub`, that
    /// accepts every inbound connection.
    pub fn in_memory(config: NodeConfig, network: &MemoryNetwork, hub: &DiscoveryHub) -> Self {
        let address = DeviceAddress::new(config.address.clone());
        let transport = Arc::new(network.transport(address.clone()));
        let discovery = Arc::new(hub.discovery(DiscoveredDevice::new(
            address,
            config.display_name.clone(),
        )));
        Self::new(
            config,
            transport,
            discovery,
            Arc::new(AcceptAll),
            Arc::new(InMemoryPeerStore::new()),
        )
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn local_id(&self) -> &PeerId {
        self.peers.local_id()
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    pub fn dag(&self) -> &Arc<RwLock<MerkleDag>> {
        &self.dag
    }

    pub fn peers(&self) -> &PeerManager {
        &self.peers
    }

    pub fn sync(&self) -> &Synchronizer {
        &self.sync
    }

    /// Listen, discover, and begin continuous sync if configured.
    pub async fn start(&self) -> NodeResult<()> {
        self.peers.start_listening().await?;
        self.peers.start_discovery().await?;
        if let Some(interval) = self.config.continuous_sync_interval() {
            self.sync.start_continuous_sync(interval);
        }
        info!(peer = %self.local_id(), "node started");
        Ok(())
    }

    pub async fn shutdown(&self) -> NodeResult<()> {
        self.sync.shutdown();
        self.peers.shutdown().await?;
        info!(peer = %self.local_id(), "node stopped");
        Ok(())
    }

    /// Dial a device and wait for the handshake.
    pub async fn connect(&self, address: impl Into<DeviceAddress>) -> NodeResult<PeerId> {
        Ok(self.peers.connect_to_device(&address.into()).await?)
    }

    /// Store, index, and announce a block. Announcing only happens the first
    /// time a CID is added.
    pub async fn add_block(&self, block: Block) -> NodeResult<Cid> {
        if !block.validate() {
            return Err(NodeError::InvalidBlock(block.cid().clone()));
        }
        let cid = block.cid().clone();
        if self.sync.insert(block)? {
            let notified = self.sync.announce_blocks(std::slice::from_ref(&cid)).await;
            debug!(%cid, peers = notified, "added block");
        }
        Ok(cid)
    }

    /// Wrap bytes in a raw block hashed with the configured algorithm.
    pub async fn add_data(&self, data: impl Into<Bytes>) -> NodeResult<Cid> {
        let block = Block::from_data(data, CodecType::Raw, self.config.store.default_hash);
        self.add_block(block).await
    }

    /// Add a directory block. Its entries are not added.
    pub async fn add_directory(&self, directory: &Directory) -> NodeResult<Cid> {
        let block = directory.to_block(self.config.store.default_hash)?;
        self.add_block(block).await
    }

    pub fn get_block(&self, cid: &Cid) -> NodeResult<Option<Block>> {
        Ok(self.store.get(cid)?)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("peer", self.local_id())
            .field("address", self.peers.local_address())
            .finish_non_exhaustive()
    }
}
