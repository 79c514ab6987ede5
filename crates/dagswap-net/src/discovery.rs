//! Device discovery.
//!
//! Discovery reports reachable devices, not peers: a [`DiscoveredDevice`]
//! carries an address and what the device says about itself, and only a
//! handshake turns it into a [`PeerId`](crate::PeerId).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::NetResult;
use crate::peer::DeviceAddress;

const DISCOVERY_CHANNEL_CAPACITY: usize = 256;

/// A device seen by discovery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub address: DeviceAddress,
    pub display_name: String,
    pub metadata: BTreeMap<String, String>,
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    pub fn new(address: impl Into<DeviceAddress>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
            metadata: BTreeMap::new(),
            discovered_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DiscoveryEvent {
    DevicesDiscovered(Vec<DiscoveredDevice>),
    DevicesLost(Vec<DiscoveredDevice>),
}

/// A source of [`DiscoveryEvent`]s.
///
/// Receivers obtained from [`subscribe`](Self::subscribe) only see events
/// sent after they subscribed, so subscribe before starting.
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    async fn start_discovery(&self) -> NetResult<()>;

    async fn stop_discovery(&self) -> NetResult<()>;

    fn is_discovering(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent>;
}

/// Discovery that never finds anything. For nodes that only dial known
/// addresses.
pub struct NoopDiscovery {
    running: AtomicBool,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl NoopDiscovery {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            events: broadcast::channel(1).0,
        }
    }
}

impl Default for NoopDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceDiscovery for NoopDiscovery {
    async fn start_discovery(&self) -> NetResult<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_discovery(&self) -> NetResult<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Member {
    device: DiscoveredDevice,
    events: broadcast::Sender<DiscoveryEvent>,
}

/// A simulated broadcast domain. Every [`BroadcastDiscovery`] joined to the
/// same hub sees the others while both are discovering.
#[derive(Clone, Default)]
pub struct DiscoveryHub {
    members: Arc<Mutex<HashMap<DeviceAddress, Member>>>,
}

impl DiscoveryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discovery for `device` on this hub.
    pub fn discovery(&self, device: DiscoveredDevice) -> BroadcastDiscovery {
        BroadcastDiscovery {
            hub: self.clone(),
            device,
            events: broadcast::channel(DISCOVERY_CHANNEL_CAPACITY).0,
        }
    }

    /// Addresses currently announcing themselves.
    pub fn active(&self) -> Vec<DeviceAddress> {
        let mut active: Vec<_> = lock(&self.members).keys().cloned().collect();
        active.sort();
        active
    }

    fn join(&self, device: &DiscoveredDevice, events: &broadcast::Sender<DiscoveryEvent>) {
        let mut members = lock(&self.members);
        if members.contains_key(&device.address) {
            return;
        }
        let announced = DiscoveredDevice {
            discovered_at: Utc::now(),
            ..device.clone()
        };
        let mut others = Vec::with_capacity(members.len());
        for member in members.values() {
            // A member with no subscribers yet is still discoverable.
            let _ = member
                .events
                .send(DiscoveryEvent::DevicesDiscovered(vec![announced.clone()]));
            others.push(DiscoveredDevice {
                discovered_at: Utc::now(),
                ..member.device.clone()
            });
        }
        if !others.is_empty() {
            let _ = events.send(DiscoveryEvent::DevicesDiscovered(others));
        }
        members.insert(
            device.address.clone(),
            Member {
                device: device.clone(),
                events: events.clone(),
            },
        );
        debug!(address = %device.address, members = members.len(), "joined discovery hub");
    }

    fn leave(&self, address: &DeviceAddress) {
        let mut members = lock(&self.members);
        let Some(gone) = members.remove(address) else {
            return;
        };
        for member in members.values() {
            let _ = member
                .events
                .send(DiscoveryEvent::DevicesLost(vec![gone.device.clone()]));
        }
        debug!(address = %address, "left discovery hub");
    }

    fn contains(&self, address: &DeviceAddress) -> bool {
        lock(&self.members).contains_key(address)
    }
}

impl std::fmt::Debug for DiscoveryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryHub")
            .field("active", &self.active())
            .finish()
    }
}

/// Reference discovery over a [`DiscoveryHub`]: starting announces this
/// device to everyone on the hub and reports everyone already there;
/// stopping reports this device as lost.
pub struct BroadcastDiscovery {
    hub: DiscoveryHub,
    device: DiscoveredDevice,
    events: broadcast::Sender<DiscoveryEvent>,
}

impl BroadcastDiscovery {
    pub fn device(&self) -> &DiscoveredDevice {
        &self.device
    }
}

#[async_trait]
impl DeviceDiscovery for BroadcastDiscovery {
    async fn start_discovery(&self) -> NetResult<()> {
        self.hub.join(&self.device, &self.events);
        Ok(())
    }

    async fn stop_discovery(&self) -> NetResult<()> {
        self.hub.leave(&self.device.address);
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.hub.contains(&self.device.address)
    }

    fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.events.subscribe()
    }
}

impl Drop for BroadcastDiscovery {
    fn drop(&mut self) {
        self.hub.leave(&self.device.address);
    }
}
