//! Peer lifecycle.
//!
//! The [`PeerManager`] owns every connection and is the only component that
//! changes peer status. It drives outbound dials (connect, handshake, retry
//! with backoff), screens inbound connections through the approval policy
//! before their handshake, and turns inbound frames into
//! [`PeerEvent::MessageReceived`] events, one reader task per connection so
//! frames from one peer keep their order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PeerManagerConfig;
use crate::discovery::{DeviceDiscovery, DiscoveredDevice, DiscoveryEvent};
use crate::error::{NetError, NetResult};
use crate::handshake::HandshakeProtocol;
use crate::peer::{DeviceAddress, LocalIdentity, Peer, PeerId, PeerStatus};
use crate::policy::{ConnectionPolicy, InboundRequest};
use crate::store::PeerStore;
use crate::transport::{Connection, IncomingConnections, TransportProtocol};

/// Everything observable about the peer layer, in production order.
#[derive(Clone, Debug, PartialEq)]
pub enum PeerEvent {
    Discovered(DiscoveredDevice),
    Lost(DeviceAddress),
    Connected(Peer),
    Disconnected(PeerId),
    /// A `connect_to_device` call gave up.
    ConnectionFailed {
        address: DeviceAddress,
        error: NetError,
    },
    MessageReceived {
        peer_id: PeerId,
        payload: Vec<u8>,
    },
}

struct DeviceRecord {
    device: DiscoveredDevice,
    status: PeerStatus,
    peer_id: Option<PeerId>,
    failures: u32,
    retry_at: Option<Instant>,
}

impl DeviceRecord {
    fn new(device: DiscoveredDevice) -> Self {
        Self {
            device,
            status: PeerStatus::Discovered,
            peer_id: None,
            failures: 0,
            retry_at: None,
        }
    }

    fn unknown(address: &DeviceAddress) -> Self {
        Self::new(DiscoveredDevice::new(address.clone(), address.as_str()))
    }

    fn advance(&mut self, next: PeerStatus) {
        advance(&mut self.status, next, &self.device.address);
    }
}

fn advance(status: &mut PeerStatus, next: PeerStatus, address: &DeviceAddress) -> bool {
    if status.can_transition_to(next) {
        *status = next;
        true
    } else {
        debug!(%address, from = %status, to = %next, "ignoring transition");
        false
    }
}

struct ActiveConnection {
    connection: Arc<dyn Connection>,
    address: DeviceAddress,
    initiator: PeerId,
    reader: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    devices: HashMap<DeviceAddress, DeviceRecord>,
    connections: HashMap<PeerId, ActiveConnection>,
    dialing: usize,
    accepting: usize,
}

impl Registry {
    fn slots_used(&self) -> usize {
        self.connections.len() + self.dialing + self.accepting
    }
}

/// An inbound connection slot, held from the limit check until the
/// connection is registered or refused.
struct AcceptSlot<'a>(&'a Shared);

impl Drop for AcceptSlot<'_> {
    fn drop(&mut self) {
        let mut registry = self.0.registry();
        registry.accepting = registry.accepting.saturating_sub(1);
    }
}

#[derive(Default)]
struct Tasks {
    listener: Option<JoinHandle<()>>,
    discovery: Option<JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    identity: LocalIdentity,
    config: PeerManagerConfig,
    transport: Arc<dyn TransportProtocol>,
    discovery: Arc<dyn DeviceDiscovery>,
    handshake: Arc<dyn HandshakeProtocol>,
    policy: Arc<dyn ConnectionPolicy>,
    peer_store: Arc<dyn PeerStore>,
    registry: Mutex<Registry>,
    tasks: Mutex<Tasks>,
    events: broadcast::Sender<PeerEvent>,
    shut_down: AtomicBool,
}

/// Connection manager for one local identity. Cheap to clone; clones share
/// state.
#[derive(Clone)]
pub struct PeerManager {
    shared: Arc<Shared>,
}

impl PeerManager {
    pub fn new(
        identity: LocalIdentity,
        config: PeerManagerConfig,
        transport: Arc<dyn TransportProtocol>,
        discovery: Arc<dyn DeviceDiscovery>,
        handshake: Arc<dyn HandshakeProtocol>,
        policy: Arc<dyn ConnectionPolicy>,
        peer_store: Arc<dyn PeerStore>,
    ) -> Self {
        reset_stale_peers(peer_store.as_ref());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                identity,
                config,
                transport,
                discovery,
                handshake,
                policy,
                peer_store,
                registry: Mutex::new(Registry::default()),
                tasks: Mutex::new(Tasks::default()),
                events,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.shared.identity.peer_id
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.shared.identity
    }

    pub fn local_address(&self) -> &DeviceAddress {
        self.shared.transport.local_address()
    }

    pub fn config(&self) -> &PeerManagerConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.shared.events.subscribe()
    }

    // -- queries ------------------------------------------------------------

    /// Every peer the store remembers, connected or not.
    pub fn peers(&self) -> NetResult<Vec<Peer>> {
        self.shared.peer_store.all_peers()
    }

    pub fn peer(&self, id: &PeerId) -> NetResult<Option<Peer>> {
        self.shared.peer_store.get_peer(id)
    }

    /// Peers with an open connection, sorted.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.shared.registry().connections.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.shared.registry().connections.contains_key(peer)
    }

    /// Connection state of the device at `address`, if it is known.
    pub fn device_state(&self, address: &DeviceAddress) -> Option<PeerStatus> {
        self.shared
            .registry()
            .devices
            .get(address)
            .map(|record| record.status)
    }

    /// Devices reported by discovery or dialed, sorted by address.
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<_> = self
            .shared
            .registry()
            .devices
            .values()
            .map(|record| record.device.clone())
            .collect();
        devices.sort_by(|a, b| a.address.cmp(&b.address));
        devices
    }

    // -- outbound -----------------------------------------------------------

    /// Dial `address`, run the handshake, and register the peer behind it.
    ///
    /// Retryable failures are retried up to `connect_retries` times with
    /// exponential backoff. When every attempt fails the device is marked
    /// [`PeerStatus::Failed`] and further calls are throttled until the
    /// backoff for its failure count has passed.
    pub async fn connect_to_device(&self, address: &DeviceAddress) -> NetResult<PeerId> {
        if let Some(peer) = self.shared.begin_dial(address)? {
            return Ok(peer);
        }
        let outcome = self.shared.dial(address).await;
        self.shared.finish_dial(address, outcome).await
    }

    /// Send one frame. `false` if the peer is not connected or the send
    /// failed.
    pub async fn send_message(&self, peer: &PeerId, payload: Vec<u8>) -> bool {
        let connection = self
            .shared
            .registry()
            .connections
            .get(peer)
            .map(|active| Arc::clone(&active.connection));
        let Some(connection) = connection else {
            debug!(%peer, "dropping message for disconnected peer");
            return false;
        };
        match connection.send(payload).await {
            Ok(()) => true,
            Err(error) => {
                debug!(%peer, %error, "send failed");
                false
            }
        }
    }

    pub async fn disconnect_from_peer(&self, peer: &PeerId) -> NetResult<()> {
        let active = {
            let mut guard = self.shared.registry();
            let registry = &mut *guard;
            let active = registry
                .connections
                .remove(peer)
                .ok_or_else(|| NetError::PeerNotConnected(peer.clone()))?;
            if let Some(record) = registry.devices.get_mut(&active.address) {
                record.advance(PeerStatus::Disconnecting);
            }
            self.shared.update_peer(peer, PeerStatus::Disconnecting);
            active
        };
        active.reader.abort();
        active.connection.close().await;

        let mut registry = self.shared.registry();
        if let Some(record) = registry.devices.get_mut(&active.address) {
            record.advance(PeerStatus::Disconnected);
        }
        self.shared.update_peer(peer, PeerStatus::Disconnected);
        self.shared.emit(PeerEvent::Disconnected(peer.clone()));
        info!(%peer, "disconnected");
        Ok(())
    }

    /// Forget a peer, disconnecting it first if needed.
    pub async fn remove_peer(&self, peer: &PeerId) -> NetResult<bool> {
        if self.is_connected(peer) {
            match self.disconnect_from_peer(peer).await {
                Ok(()) | Err(NetError::PeerNotConnected(_)) => {}
                Err(error) => return Err(error),
            }
        }
        self.shared.peer_store.remove_peer(peer)
    }

    // -- inbound ------------------------------------------------------------

    /// Accept inbound connections until [`stop_listening`](Self::stop_listening).
    pub async fn start_listening(&self) -> NetResult<()> {
        self.shared.transport.start_listening().await?;
        let mut tasks = lock(&self.shared.tasks);
        if tasks.listener.is_none() {
            match self.shared.transport.take_incoming() {
                Some(incoming) => {
                    let weak = Arc::downgrade(&self.shared);
                    tasks.listener = Some(tokio::spawn(accept_loop(weak, incoming)));
                }
                None => warn!("transport has no inbound stream to accept from"),
            }
        }
        info!(address = %self.local_address(), "listening");
        Ok(())
    }

    pub async fn stop_listening(&self) -> NetResult<()> {
        self.shared.transport.stop_listening().await?;
        info!(address = %self.local_address(), "stopped listening");
        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.shared.transport.is_listening()
    }

    // -- discovery ----------------------------------------------------------

    pub async fn start_discovery(&self) -> NetResult<()> {
        {
            let mut tasks = lock(&self.shared.tasks);
            if tasks.discovery.is_none() {
                let events = self.shared.discovery.subscribe();
                let weak = Arc::downgrade(&self.shared);
                tasks.discovery = Some(tokio::spawn(discovery_loop(weak, events)));
            }
        }
        self.shared.discovery.start_discovery().await?;
        info!("discovery started");
        Ok(())
    }

    pub async fn stop_discovery(&self) -> NetResult<()> {
        let task = lock(&self.shared.tasks).discovery.take();
        if let Some(task) = task {
            task.abort();
        }
        self.shared.discovery.stop_discovery().await?;
        info!("discovery stopped");
        Ok(())
    }

    pub fn is_discovering(&self) -> bool {
        self.shared.discovery.is_discovering()
    }

    /// Stop discovery and listening, then disconnect every peer.
    pub async fn shutdown(&self) -> NetResult<()> {
        if self.shared.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.stop_discovery().await?;
        self.stop_listening().await?;
        let listener = lock(&self.shared.tasks).listener.take();
        if let Some(listener) = listener {
            listener.abort();
        }
        for peer in self.connected_peers() {
            match self.disconnect_from_peer(&peer).await {
                Ok(()) | Err(NetError::PeerNotConnected(_)) => {}
                Err(error) => warn!(%peer, %error, "disconnect during shutdown failed"),
            }
        }
        info!(peer = %self.local_id(), "peer manager shut down");
        Ok(())
    }
}

impl std::fmt::Debug for PeerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerManager")
            .field("peer_id", self.local_id())
            .field("address", self.local_address())
            .field("connected", &self.connected_peers().len())
            .finish()
    }
}

/// Records persisted as connected belong to a previous run.
fn reset_stale_peers(store: &dyn PeerStore) {
    let peers = match store.all_peers() {
        Ok(peers) => peers,
        Err(error) => {
            warn!(%error, "could not load peers");
            return;
        }
    };
    for mut peer in peers {
        if matches!(
            peer.status,
            PeerStatus::Connecting | PeerStatus::Connected | PeerStatus::Disconnecting
        ) {
            peer.status = PeerStatus::Disconnected;
            if let Err(error) = store.store_peer(peer) {
                warn!(%error, "could not reset stale peer");
            }
        }
    }
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    fn emit(&self, event: PeerEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Mirror a status change into the peer store.
    fn update_peer(&self, id: &PeerId, status: PeerStatus) {
        let result = self.peer_store.get_peer(id).and_then(|peer| match peer {
            Some(mut peer) => {
                peer.status = status;
                peer.last_seen = chrono::Utc::now();
                self.peer_store.store_peer(peer)
            }
            None => Ok(()),
        });
        if let Err(error) = result {
            warn!(peer = %id, %error, "could not update peer record");
        }
    }

    /// Reserve a connection slot and move the device to `connecting`.
    /// Returns the peer id if the device is already connected.
    fn begin_dial(&self, address: &DeviceAddress) -> NetResult<Option<PeerId>> {
        let mut guard = self.registry();
        let registry = &mut *guard;
        let used = registry.slots_used();
        let record = registry
            .devices
            .entry(address.clone())
            .or_insert_with(|| DeviceRecord::unknown(address));

        match record.status {
            PeerStatus::Connected if record.peer_id.is_some() => {
                return Ok(record.peer_id.clone())
            }
            PeerStatus::Connecting | PeerStatus::Disconnecting => {
                return Err(NetError::connection_failed(
                    address,
                    format!("device is {}", record.status),
                ))
            }
            _ => {}
        }
        if let Some(retry_at) = record.retry_at {
            let now = Instant::now();
            if retry_at > now {
                return Err(NetError::Throttled {
                    address: address.clone(),
                    retry_after_ms: (retry_at - now).as_millis() as u64,
                });
            }
        }
        if used >= self.config.max_connections {
            return Err(NetError::ConnectionLimit(self.config.max_connections));
        }
        record.advance(PeerStatus::Connecting);
        registry.dialing += 1;
        debug!(%address, "dialing");
        Ok(None)
    }

    async fn dial(&self, address: &DeviceAddress) -> NetResult<(Arc<dyn Connection>, PeerId)> {
        let attempts = self.config.connect_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.dial_once(address).await {
                Ok(dialed) => return Ok(dialed),
                Err(error) if error.is_retryable() && attempt < attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(%address, attempt, %error, ?delay, "connection attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn dial_once(&self, address: &DeviceAddress) -> NetResult<(Arc<dyn Connection>, PeerId)> {
        let connection = tokio::time::timeout(self.config.connect_timeout(), self.transport.connect(address))
            .await
            .map_err(|_| NetError::Timeout(format!("connecting to {address}")))??;
        let result = self
            .handshake
            .initiate(connection.as_ref(), &self.identity)
            .await;
        match result.into_result() {
            Ok(peer) => Ok((connection, peer)),
            Err(error) => {
                connection.close().await;
                Err(error)
            }
        }
    }

    async fn finish_dial(
        self: &Arc<Self>,
        address: &DeviceAddress,
        outcome: NetResult<(Arc<dyn Connection>, PeerId)>,
    ) -> NetResult<PeerId> {
        let (connection, peer) = match outcome {
            Ok(dialed) => dialed,
            Err(error) => {
                let mut guard = self.registry();
                let registry = &mut *guard;
                registry.dialing = registry.dialing.saturating_sub(1);
                if let Some(record) = registry.devices.get_mut(address) {
                    record.advance(PeerStatus::Failed);
                    record.failures = record.failures.saturating_add(1);
                    record.retry_at = Some(Instant::now() + self.config.backoff(record.failures));
                }
                warn!(%address, %error, "giving up on device");
                self.emit(PeerEvent::ConnectionFailed {
                    address: address.clone(),
                    error: error.clone(),
                });
                return Err(error);
            }
        };
        {
            let mut registry = self.registry();
            registry.dialing = registry.dialing.saturating_sub(1);
        }
        let initiator = self.identity.peer_id.clone();
        self.register(connection, peer.clone(), address.clone(), initiator)
            .await;
        Ok(peer)
    }

    /// Make `connection` the live connection to `peer`.
    ///
    /// When both sides dial each other at once, each ends up with two
    /// connections. Both keep the one dialed by the smaller peer id so they
    /// agree on which to close.
    async fn register(
        self: &Arc<Self>,
        connection: Arc<dyn Connection>,
        peer: PeerId,
        address: DeviceAddress,
        initiator: PeerId,
    ) {
        let preferred_initiator = std::cmp::min(&self.identity.peer_id, &peer).clone();
        let to_close = {
            let mut guard = self.registry();
            let registry = &mut *guard;

            let keep_existing = registry.connections.get(&peer).is_some_and(|existing| {
                existing.connection.is_open()
                    && (existing.initiator == preferred_initiator
                        || initiator != preferred_initiator)
            });
            if keep_existing {
                debug!(%peer, "keeping existing connection, closing duplicate");
                Some(connection)
            } else {
                let reader = self.spawn_reader(peer.clone(), Arc::clone(&connection));
                let replaced = registry.connections.insert(
                    peer.clone(),
                    ActiveConnection {
                        connection,
                        address: address.clone(),
                        initiator,
                        reader,
                    },
                );

                let record = registry
                    .devices
                    .entry(address.clone())
                    .or_insert_with(|| DeviceRecord::unknown(&address));
                if record.status != PeerStatus::Connected {
                    if record.status.can_connect() {
                        record.advance(PeerStatus::Connecting);
                    }
                    record.advance(PeerStatus::Connected);
                }
                record.peer_id = Some(peer.clone());
                record.failures = 0;
                record.retry_at = None;

                match replaced {
                    Some(old) => {
                        debug!(%peer, "replaced duplicate connection");
                        old.reader.abort();
                        Some(old.connection)
                    }
                    None => {
                        let record = self.connected_record(&peer, &address);
                        info!(%peer, %address, "peer connected");
                        self.emit(PeerEvent::Connected(record));
                        None
                    }
                }
            }
        };
        if let Some(connection) = to_close {
            connection.close().await;
        }
    }

    /// Store and return the peer record for a fresh connection.
    fn connected_record(&self, peer: &PeerId, address: &DeviceAddress) -> Peer {
        let mut record = match self.peer_store.get_peer(peer) {
            Ok(Some(existing)) => existing,
            Ok(None) => Peer::new(peer.clone(), address.clone()),
            Err(error) => {
                warn!(%peer, %error, "could not load peer record");
                Peer::new(peer.clone(), address.clone())
            }
        };
        record.address = address.clone();
        record.status = PeerStatus::Connected;
        record.last_seen = chrono::Utc::now();
        if let Err(error) = self.peer_store.store_peer(record.clone()) {
            warn!(%peer, %error, "could not store peer record");
        }
        record
    }

    fn spawn_reader(self: &Arc<Self>, peer: PeerId, connection: Arc<dyn Connection>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match connection.recv().await {
                    Ok(Some(payload)) => {
                        let Some(shared) = weak.upgrade() else {
                            return;
                        };
                        debug!(%peer, bytes = payload.len(), "message received");
                        shared.emit(PeerEvent::MessageReceived {
                            peer_id: peer.clone(),
                            payload,
                        });
                    }
                    Ok(None) => break,
                    Err(error) => {
                        debug!(%peer, %error, "read failed");
                        break;
                    }
                }
            }
            connection.close().await;
            if let Some(shared) = weak.upgrade() {
                shared.connection_closed(&peer, connection.id());
            }
        })
    }

    /// The remote hung up on `connection_id`.
    fn connection_closed(&self, peer: &PeerId, connection_id: u64) {
        let mut guard = self.registry();
        let registry = &mut *guard;
        let current = registry
            .connections
            .get(peer)
            .is_some_and(|active| active.connection.id() == connection_id);
        if !current {
            return;
        }
        let Some(active) = registry.connections.remove(peer) else {
            return;
        };
        if let Some(record) = registry.devices.get_mut(&active.address) {
            record.advance(PeerStatus::Disconnecting);
            record.advance(PeerStatus::Disconnected);
        }
        self.update_peer(peer, PeerStatus::Disconnected);
        info!(%peer, "peer hung up");
        self.emit(PeerEvent::Disconnected(peer.clone()));
    }

    /// Screen, handshake, and register one inbound connection.
    async fn accept(self: Arc<Self>, connection: Arc<dyn Connection>) -> NetResult<PeerId> {
        let address = connection.remote_address().clone();
        let reserved = {
            let mut registry = self.registry();
            let free = registry.slots_used() < self.config.max_connections;
            if free {
                registry.accepting += 1;
            }
            free
        };
        if !reserved {
            self.handshake
                .reject(connection.as_ref(), "connection limit reached")
                .await;
            connection.close().await;
            return Err(NetError::ConnectionLimit(self.config.max_connections));
        }
        let _slot = AcceptSlot(self.as_ref());

        if !self.policy.approve(&InboundRequest::new(address.clone())).await {
            self.handshake
                .reject(connection.as_ref(), "connection not approved")
                .await;
            connection.close().await;
            return Err(NetError::ApprovalDenied(address));
        }

        let result = self
            .handshake
            .respond(connection.as_ref(), &self.identity)
            .await;
        let peer = match result.into_result() {
            Ok(peer) => peer,
            Err(error) => {
                connection.close().await;
                return Err(error);
            }
        };
        self.register(connection, peer.clone(), address, peer.clone())
            .await;
        Ok(peer)
    }

    fn on_discovery(self: &Arc<Self>, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::DevicesDiscovered(devices) => {
                for device in devices {
                    if &device.address == self.transport.local_address() {
                        continue;
                    }
                    let dial = {
                        let mut registry = self.registry();
                        let record = registry
                            .devices
                            .entry(device.address.clone())
                            .or_insert_with(|| DeviceRecord::new(device.clone()));
                        record.device = device.clone();
                        debug!(address = %device.address, name = %device.display_name, "device discovered");
                        self.emit(PeerEvent::Discovered(device.clone()));
                        self.config.auto_connect && record.status.can_connect()
                    };
                    if dial {
                        let manager = PeerManager {
                            shared: Arc::clone(self),
                        };
                        tokio::spawn(async move {
                            if let Err(error) = manager.connect_to_device(&device.address).await {
                                debug!(address = %device.address, %error, "auto-connect failed");
                            }
                        });
                    }
                }
            }
            DiscoveryEvent::DevicesLost(devices) => {
                let mut registry = self.registry();
                for device in devices {
                    let idle = registry.devices.get(&device.address).is_some_and(|record| {
                        !matches!(
                            record.status,
                            PeerStatus::Connecting | PeerStatus::Connected | PeerStatus::Disconnecting
                        )
                    });
                    if idle {
                        registry.devices.remove(&device.address);
                    }
                    debug!(address = %device.address, "device lost");
                    self.emit(PeerEvent::Lost(device.address));
                }
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in [tasks.listener.take(), tasks.discovery.take()].into_iter().flatten() {
            task.abort();
        }
        let registry = self.registry.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, active) in registry.connections.drain() {
            active.reader.abort();
        }
    }
}

async fn accept_loop(weak: Weak<Shared>, mut incoming: IncomingConnections) {
    while let Some(connection) = incoming.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let address = connection.remote_address().clone();
        tokio::spawn(async move {
            match shared.accept(connection).await {
                Ok(peer) => debug!(%peer, %address, "inbound connection accepted"),
                Err(error) => debug!(%address, %error, "inbound connection refused"),
            }
        });
    }
}

async fn discovery_loop(weak: Weak<Shared>, mut events: broadcast::Receiver<DiscoveryEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.on_discovery(event);
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "discovery events lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
