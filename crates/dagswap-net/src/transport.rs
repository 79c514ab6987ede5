//! Byte transports.
//!
//! A [`TransportProtocol`] dials devices and accepts inbound
//! [`Connection`]s. Each connection carries discrete frames, reliably and in
//! order. [`MemoryNetwork`] connects any number of [`MemoryTransport`]s
//! inside one process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::error::{NetError, NetResult};
use crate::peer::DeviceAddress;

/// One logical channel to one device.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Process-unique id, used to tell replaced connections apart.
    fn id(&self) -> u64;

    fn remote_address(&self) -> &DeviceAddress;

    async fn send(&self, frame: Vec<u8>) -> NetResult<()>;

    /// Next inbound frame, or `None` once either side closed.
    async fn recv(&self) -> NetResult<Option<Vec<u8>>>;

    async fn close(&self);

    fn is_open(&self) -> bool;
}

/// Receiving half of a transport's inbound connection stream.
pub type IncomingConnections = mpsc::UnboundedReceiver<Arc<dyn Connection>>;

/// Low-level connection establishment.
#[async_trait]
pub trait TransportProtocol: Send + Sync {
    fn local_address(&self) -> &DeviceAddress;

    async fn start_listening(&self) -> NetResult<()>;

    async fn stop_listening(&self) -> NetResult<()>;

    fn is_listening(&self) -> bool;

    async fn connect(&self, address: &DeviceAddress) -> NetResult<Arc<dyn Connection>>;

    /// Take the inbound connection stream. Only the first call gets it.
    fn take_incoming(&self) -> Option<IncomingConnections>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One end of an in-process connection.
pub struct MemoryConnection {
    id: u64,
    remote: DeviceAddress,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

impl MemoryConnection {
    /// Two connected ends. The first is held by `a`, talking to `b`.
    pub fn pair(a: DeviceAddress, b: DeviceAddress) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(b, a_tx, a_rx), Self::new(a, b_tx, b_rx))
    }

    fn new(
        remote: DeviceAddress,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
        inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            remote,
            outbound: Mutex::new(Some(outbound)),
            inbound: tokio::sync::Mutex::new(inbound),
            closed: watch::channel(false).0,
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn remote_address(&self) -> &DeviceAddress {
        &self.remote
    }

    async fn send(&self, frame: Vec<u8>) -> NetResult<()> {
        let outbound = lock(&self.outbound).clone();
        let Some(outbound) = outbound else {
            return Err(NetError::Transport(format!(
                "connection to {} is closed",
                self.remote
            )));
        };
        outbound
            .send(frame)
            .map_err(|_| NetError::Transport(format!("{} hung up", self.remote)))
    }

    async fn recv(&self) -> NetResult<Option<Vec<u8>>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        let frame = tokio::select! {
            frame = inbound.recv() => frame,
            _ = closed.wait_for(|closed| *closed) => None,
        };
        if frame.is_none() {
            self.closed.send_replace(true);
        }
        Ok(frame)
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        if lock(&self.outbound).take().is_some() {
            debug!(conn = self.id, remote = %self.remote, "memory connection closed");
        }
    }

    fn is_open(&self) -> bool {
        !*self.closed.borrow() && lock(&self.outbound).as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Listener registry shared by every transport on one in-process network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<DeviceAddress, mpsc::UnboundedSender<Arc<dyn Connection>>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport reachable at `address` on this network.
    pub fn transport(&self, address: impl Into<DeviceAddress>) -> MemoryTransport {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        MemoryTransport {
            address: address.into(),
            network: self.clone(),
            incoming_tx,
            incoming_rx: Mutex::new(Some(incoming_rx)),
            listening: AtomicBool::new(false),
        }
    }

    pub fn is_listening(&self, address: &DeviceAddress) -> bool {
        lock(&self.listeners).contains_key(address)
    }

    fn dial(&self, from: &DeviceAddress, to: &DeviceAddress) -> NetResult<Arc<dyn Connection>> {
        let listener = lock(&self.listeners)
            .get(to)
            .cloned()
            .ok_or_else(|| NetError::connection_failed(to, "no listener at address"))?;
        let (local, remote) = MemoryConnection::pair(from.clone(), to.clone());
        let remote: Arc<dyn Connection> = Arc::new(remote);
        listener
            .send(remote)
            .map_err(|_| NetError::connection_failed(to, "listener went away"))?;
        let local: Arc<dyn Connection> = Arc::new(local);
        Ok(local)
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

/// A device on a [`MemoryNetwork`].
pub struct MemoryTransport {
    address: DeviceAddress,
    network: MemoryNetwork,
    incoming_tx: mpsc::UnboundedSender<Arc<dyn Connection>>,
    incoming_rx: Mutex<Option<IncomingConnections>>,
    listening: AtomicBool,
}

#[async_trait]
impl TransportProtocol for MemoryTransport {
    fn local_address(&self) -> &DeviceAddress {
        &self.address
    }

    async fn start_listening(&self) -> NetResult<()> {
        let mut listeners = lock(&self.network.listeners);
        if listeners.contains_key(&self.address) && !self.listening.load(Ordering::SeqCst) {
            return Err(NetError::Transport(format!(
                "address {} is already in use",
                self.address
            )));
        }
        listeners.insert(self.address.clone(), self.incoming_tx.clone());
        self.listening.store(true, Ordering::SeqCst);
        debug!(address = %self.address, "memory transport listening");
        Ok(())
    }

    async fn stop_listening(&self) -> NetResult<()> {
        if self.listening.swap(false, Ordering::SeqCst) {
            lock(&self.network.listeners).remove(&self.address);
            debug!(address = %self.address, "memory transport stopped listening");
        }
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    async fn connect(&self, address: &DeviceAddress) -> NetResult<Arc<dyn Connection>> {
        self.network.dial(&self.address, address)
    }

    fn take_incoming(&self) -> Option<IncomingConnections> {
        lock(&self.incoming_rx).take()
    }
}
