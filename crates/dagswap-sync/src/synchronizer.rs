use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};
use std::time::{Duration, Instant};

use dagswap_dag::MerkleDag;
use dagswap_net::{PeerEvent, PeerId};
use dagswap_protocol::{BitswapCodec, BitswapMessage, WantReply};
use dagswap_store::{Block, BlockStore};
use dagswap_types::Cid;
use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::negotiation::NegotiationEngine;
use crate::transport::PeerNetwork;
use crate::types::{SyncEvent, SyncReport, SyncStats};
use crate::verifier::BlockVerifier;

/// Keeps a local block store in step with connected peers.
///
/// The synchronizer answers every inbound protocol message on a background
/// task and runs outbound sessions on the caller's task. At most one session
/// per peer runs at a time, and continuous sync never overlaps two passes.
///
/// Cloning is cheap; clones share state. Construct inside a Tokio runtime.
#[derive(Clone)]
pub struct Synchronizer {
    engine: Arc<Engine>,
}

impl Synchronizer {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn BlockStore>,
        dag: Arc<RwLock<MerkleDag>>,
        network: Arc<dyn PeerNetwork>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let incoming = network.subscribe();
        let engine = Arc::new(Engine {
            config,
            store,
            dag,
            network,
            events,
            sessions: Mutex::new(HashMap::new()),
            inventories: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            pings: Mutex::new(HashMap::new()),
            stats: Mutex::new(SyncStats::default()),
            pass_in_flight: AtomicBool::new(false),
            tasks: Mutex::new(Tasks::default()),
        });
        let task = tokio::spawn(message_loop(Arc::downgrade(&engine), incoming));
        lock(&engine.tasks).message_loop = Some(task);
        Self { engine }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.engine.config
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.engine.store
    }

    pub fn dag(&self) -> &Arc<RwLock<MerkleDag>> {
        &self.engine.dag
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.engine.events.subscribe()
    }

    pub fn stats(&self) -> SyncStats {
        lock(&self.engine.stats).clone()
    }

    /// CIDs `peer` has announced since it connected, sorted.
    pub fn remote_inventory(&self, peer: &PeerId) -> Vec<Cid> {
        let inventories = lock(&self.engine.inventories);
        let mut cids: Vec<Cid> = inventories
            .get(peer)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        cids.sort();
        cids
    }

    /// Store a local block and index it. Returns `true` if it was new.
    pub fn insert(&self, block: Block) -> SyncResult<bool> {
        self.engine.ingest(block)
    }

    /// Send `Have` for `cids` to every connected peer. Returns how many
    /// peers took the announcement.
    pub async fn announce_blocks(&self, cids: &[Cid]) -> usize {
        self.engine.announce(cids, None).await
    }

    /// Exchange inventories with `peer` and pull every block it has that we
    /// lack. Invalid blocks are discarded and counted, never stored.
    pub async fn sync_with_peer(&self, peer: &PeerId) -> SyncResult<SyncReport> {
        self.engine.sync_with_peer(peer).await
    }

    /// One session per connected peer, concurrently. A failure with one peer
    /// does not affect the others.
    pub async fn sync_with_all_peers(&self) -> Vec<(PeerId, SyncResult<SyncReport>)> {
        self.engine.sync_with_all_peers().await
    }

    /// Run [`sync_with_all_peers`](Self::sync_with_all_peers) every
    /// `interval`. A tick that lands while the previous pass is still running
    /// is skipped. Replaces any schedule already running.
    pub fn start_continuous_sync(&self, interval: Duration) {
        self.engine.start_continuous_sync(interval);
    }

    /// Cancel the schedule and any pass in flight.
    pub fn stop_continuous_sync(&self) {
        self.engine.stop_continuous_sync();
    }

    pub fn is_continuous_sync_running(&self) -> bool {
        lock(&self.engine.tasks).ticker.is_some()
    }

    /// Walk the DAG under `root` and request every linked block that is not
    /// held, round after round, until nothing is missing, nothing more can
    /// be found, or `max_fetch_rounds` is reached. Returns the CIDs fetched.
    pub async fn fetch_missing_blocks(&self, root: &Cid) -> SyncResult<HashSet<Cid>> {
        self.engine.fetch_missing_blocks(root).await
    }

    /// Round-trip time to `peer`.
    pub async fn ping(&self, peer: &PeerId) -> SyncResult<Duration> {
        self.engine.ping(peer).await
    }

    /// Stop continuous sync and stop answering peers.
    pub fn shutdown(&self) {
        self.engine.stop_continuous_sync();
        if let Some(task) = lock(&self.engine.tasks).message_loop.take() {
            task.abort();
        }
        info!("synchronizer stopped");
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("config", &self.engine.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Engine {
    config: SyncConfig,
    store: Arc<dyn BlockStore>,
    dag: Arc<RwLock<MerkleDag>>,
    network: Arc<dyn PeerNetwork>,
    events: broadcast::Sender<SyncEvent>,
    sessions: Mutex<HashMap<PeerId, Arc<Session>>>,
    /// Union of every `Have` each peer has sent.
    inventories: Mutex<HashMap<PeerId, HashSet<Cid>>>,
    requests: Mutex<HashMap<(PeerId, Cid), Vec<oneshot::Sender<Option<Block>>>>>,
    pings: Mutex<HashMap<u64, (PeerId, oneshot::Sender<()>)>>,
    stats: Mutex<SyncStats>,
    pass_in_flight: AtomicBool,
    tasks: Mutex<Tasks>,
}

#[derive(Default)]
struct Tasks {
    message_loop: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    pass: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Session {
    served: AtomicUsize,
    inventory: Mutex<Option<PendingInventory>>,
}

/// A full-inventory `Want` awaiting the last frame of its answer.
struct PendingInventory {
    want: u64,
    done: oneshot::Sender<()>,
}

/// Removes the session from the table when the session ends, however it ends.
struct SessionGuard<'a> {
    engine: &'a Engine,
    peer: PeerId,
    session: Arc<Session>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        lock(&self.engine.sessions).remove(&self.peer);
    }
}

/// Clears `pass_in_flight` when the pass ends, including when its task is
/// aborted before it first runs.
struct PassFlag(Arc<Engine>);

impl Drop for PassFlag {
    fn drop(&mut self) {
        self.0.pass_in_flight.store(false, Ordering::Release);
    }
}

enum Fetched {
    Stored,
    Missing,
    Invalid,
    Failed(SyncError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_dag(dag: &RwLock<MerkleDag>) -> RwLockReadGuard<'_, MerkleDag> {
    dag.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_dag(dag: &RwLock<MerkleDag>) -> RwLockWriteGuard<'_, MerkleDag> {
    dag.write().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    fn local_inventory(&self) -> SyncResult<HashSet<Cid>> {
        Ok(self.store.all_cids()?.into_iter().collect())
    }

    fn ingest(&self, block: Block) -> SyncResult<bool> {
        let added = self.store.put(&block)?;
        write_dag(&self.dag).add_block(block);
        Ok(added)
    }

    async fn send(&self, peer: &PeerId, message: &BitswapMessage) -> bool {
        match BitswapCodec::encode(message) {
            Ok(frame) => self.network.send(peer, frame).await,
            Err(error) => {
                warn!(%peer, kind = message.type_name(), %error, "could not encode message");
                false
            }
        }
    }

    /// Send every message in order, stopping at the first that fails.
    async fn send_all(&self, peer: &PeerId, messages: &[BitswapMessage]) -> bool {
        for message in messages {
            if !self.send(peer, message).await {
                return false;
            }
        }
        true
    }

    async fn announce(&self, cids: &[Cid], except: Option<&PeerId>) -> usize {
        if cids.is_empty() {
            return 0;
        }
        let mut frames = Vec::new();
        for message in BitswapMessage::announcements(cids) {
            match BitswapCodec::encode(&message) {
                Ok(frame) => frames.push(frame),
                Err(error) => {
                    warn!(count = cids.len(), %error, "could not encode announcement");
                    return 0;
                }
            }
        }
        let mut notified = 0;
        for peer in self.network.connected_peers() {
            if Some(&peer) == except {
                continue;
            }
            let mut delivered = true;
            for frame in &frames {
                if !self.network.send(&peer, frame.clone()).await {
                    delivered = false;
                    break;
                }
            }
            if delivered {
                notified += 1;
            }
        }
        debug!(count = cids.len(), peers = notified, "announced blocks");
        notified
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    async fn on_peer_event(self: &Arc<Self>, event: PeerEvent) {
        match event {
            PeerEvent::MessageReceived { peer_id, payload } => {
                match BitswapCodec::decode_exact(&payload) {
                    Ok(message) => self.handle_message(&peer_id, message).await,
                    Err(error) => warn!(peer = %peer_id, %error, "dropping undecodable frame"),
                }
            }
            PeerEvent::Connected(peer) if self.config.sync_on_connect => {
                let engine = Arc::clone(self);
                tokio::spawn(async move {
                    let _ = engine.sync_with_peer(&peer.id).await;
                });
            }
            PeerEvent::Disconnected(peer) => self.forget_peer(&peer),
            _ => {}
        }
    }

    async fn handle_message(&self, peer: &PeerId, message: BitswapMessage) {
        debug!(%peer, kind = message.type_name(), "received");
        match message {
            BitswapMessage::Want { id, cids } => {
                let local = match self.local_inventory() {
                    Ok(local) => local,
                    Err(error) => {
                        warn!(%peer, %error, "cannot answer want");
                        return;
                    }
                };
                let have = NegotiationEngine::answer_want(&local, &cids);
                self.send_all(peer, &BitswapMessage::answer(id, &have)).await;
            }
            BitswapMessage::Have { cids, reply } => self.record_have(peer, cids, reply),
            BitswapMessage::BlockRequest { cid } => self.serve(peer, cid).await,
            BitswapMessage::BlockResponse { block } => {
                let cid = block.cid().clone();
                self.resolve(peer, &cid, Some(block));
            }
            BitswapMessage::BlockNotFound { cid } => self.resolve(peer, &cid, None),
            BitswapMessage::Ping { nonce } => {
                self.send(peer, &BitswapMessage::Pong { nonce }).await;
            }
            BitswapMessage::Pong { nonce } => self.resolve_ping(peer, nonce),
        }
    }

    fn record_have(&self, peer: &PeerId, cids: Vec<Cid>, reply: Option<WantReply>) {
        let mut unknown = Vec::new();
        for cid in &cids {
            match self.store.has(cid) {
                Ok(true) => {}
                Ok(false) => unknown.push(cid.clone()),
                Err(error) => {
                    warn!(%peer, %cid, %error, "store failed while checking announced block")
                }
            }
        }
        lock(&self.inventories)
            .entry(peer.clone())
            .or_default()
            .extend(cids);
        if !unknown.is_empty() {
            self.emit(SyncEvent::BlocksDiscovered {
                cids: unknown,
                peer: peer.clone(),
            });
        }
        let Some(WantReply { want, last: true }) = reply else {
            return;
        };
        if let Some(session) = lock(&self.sessions).get(peer) {
            let mut pending = lock(&session.inventory);
            if pending.as_ref().is_some_and(|p| p.want == want) {
                if let Some(p) = pending.take() {
                    let _ = p.done.send(());
                }
            }
        }
    }

    async fn serve(&self, peer: &PeerId, cid: Cid) {
        let reply = match self.store.get(&cid) {
            Ok(Some(block)) => BitswapMessage::BlockResponse { block },
            Ok(None) => BitswapMessage::BlockNotFound { cid },
            Err(error) => {
                warn!(%peer, %cid, %error, "store failed while serving block");
                BitswapMessage::BlockNotFound { cid }
            }
        };
        let is_block = matches!(reply, BitswapMessage::BlockResponse { .. });
        if self.send(peer, &reply).await && is_block {
            lock(&self.stats).blocks_sent += 1;
            if let Some(session) = lock(&self.sessions).get(peer) {
                session.served.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn resolve(&self, peer: &PeerId, cid: &Cid, block: Option<Block>) {
        let waiters = lock(&self.requests).remove(&(peer.clone(), cid.clone()));
        match waiters {
            Some(waiters) => {
                for waiter in waiters {
                    let _ = waiter.send(block.clone());
                }
            }
            None => debug!(%peer, %cid, "ignoring unsolicited response"),
        }
    }

    fn resolve_ping(&self, peer: &PeerId, nonce: u64) {
        let mut pings = lock(&self.pings);
        let expected = matches!(pings.get(&nonce), Some((from, _)) if from == peer);
        if !expected {
            debug!(%peer, nonce, "ignoring unexpected pong");
            return;
        }
        if let Some((_, waiter)) = pings.remove(&nonce) {
            let _ = waiter.send(());
        }
    }

    /// Drop everything pending on a peer that went away. Waiters see their
    /// sender vanish and report the peer unavailable.
    fn forget_peer(&self, peer: &PeerId) {
        lock(&self.inventories).remove(peer);
        lock(&self.requests).retain(|(from, _), _| from != peer);
        lock(&self.pings).retain(|_, (from, _)| from != peer);
        if let Some(session) = lock(&self.sessions).get(peer) {
            lock(&session.inventory).take();
        }
        debug!(%peer, "forgot disconnected peer");
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    async fn request_block(&self, peer: &PeerId, cid: &Cid) -> SyncResult<Option<Block>> {
        let key = (peer.clone(), cid.clone());
        let (tx, rx) = oneshot::channel();
        lock(&self.requests).entry(key.clone()).or_default().push(tx);

        if !self.send(peer, &BitswapMessage::BlockRequest { cid: cid.clone() }).await {
            drop(rx);
            self.prune_request(&key);
            return Err(SyncError::PeerUnavailable(peer.clone()));
        }
        let answer = tokio::time::timeout(self.config.request_timeout(), rx).await;
        match answer {
            Ok(Ok(block)) => Ok(block),
            Ok(Err(_)) => Err(SyncError::PeerUnavailable(peer.clone())),
            Err(_) => {
                self.prune_request(&key);
                Err(SyncError::Timeout {
                    peer: peer.clone(),
                    waiting_for: format!("block {cid}"),
                })
            }
        }
    }

    fn prune_request(&self, key: &(PeerId, Cid)) {
        let mut requests = lock(&self.requests);
        if let Some(waiters) = requests.get_mut(key) {
            waiters.retain(|waiter| !waiter.is_closed());
            if waiters.is_empty() {
                requests.remove(key);
            }
        }
    }

    /// Request, verify, and store one block.
    async fn fetch_from(&self, peer: &PeerId, cid: &Cid) -> Fetched {
        let block = match self.request_block(peer, cid).await {
            Ok(Some(block)) => block,
            Ok(None) => return Fetched::Missing,
            Err(error) => return Fetched::Failed(error),
        };
        if let Err(rejection) = BlockVerifier::verify(cid, &block) {
            warn!(%peer, %rejection, "discarding invalid block");
            lock(&self.stats).invalid_blocks += 1;
            return Fetched::Invalid;
        }
        match self.ingest(block) {
            Ok(added) => {
                if added {
                    lock(&self.stats).blocks_received += 1;
                }
                Fetched::Stored
            }
            Err(error) => Fetched::Failed(error),
        }
    }

    /// Try the peers that announced `cid` first, then the rest. Returns the
    /// peer that supplied it.
    async fn fetch_from_any(&self, peers: &[PeerId], cid: &Cid) -> Option<PeerId> {
        let mut candidates = peers.to_vec();
        {
            let inventories = lock(&self.inventories);
            candidates.sort_by_key(|peer| {
                !inventories
                    .get(peer)
                    .is_some_and(|held| held.contains(cid))
            });
        }
        for peer in candidates {
            match self.fetch_from(&peer, cid).await {
                Fetched::Stored => return Some(peer),
                Fetched::Failed(error) => debug!(%peer, %cid, %error, "fetch failed"),
                Fetched::Missing | Fetched::Invalid => {}
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    fn open_session(&self, peer: &PeerId) -> SyncResult<SessionGuard<'_>> {
        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(peer) {
            return Err(SyncError::SessionInProgress(peer.clone()));
        }
        let session = Arc::new(Session::default());
        sessions.insert(peer.clone(), Arc::clone(&session));
        Ok(SessionGuard {
            engine: self,
            peer: peer.clone(),
            session,
        })
    }

    async fn sync_with_peer(&self, peer: &PeerId) -> SyncResult<SyncReport> {
        let guard = self.open_session(peer)?;
        self.emit(SyncEvent::SyncStarted(peer.clone()));
        debug!(%peer, "sync session started");

        let outcome = self.run_session(peer, &guard.session).await;
        match &outcome {
            Ok(report) => {
                {
                    let mut stats = lock(&self.stats);
                    if report.success() {
                        stats.sessions_succeeded += 1;
                    } else {
                        stats.sessions_failed += 1;
                    }
                }
                info!(
                    %peer,
                    received = report.received.len(),
                    sent = report.sent,
                    invalid = report.invalid,
                    failed = report.failed.len(),
                    "sync session finished"
                );
                self.emit(SyncEvent::SyncCompleted(report.clone()));
            }
            Err(error) => {
                lock(&self.stats).sessions_failed += 1;
                warn!(%peer, %error, "sync session failed");
                self.emit(SyncEvent::SyncFailed {
                    peer: peer.clone(),
                    error: error.to_string(),
                });
            }
        }
        outcome
    }

    async fn run_session(&self, peer: &PeerId, session: &Session) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let local = self.local_inventory()?;

        let want: u64 = rand::random();
        let (done, rx) = oneshot::channel();
        *lock(&session.inventory) = Some(PendingInventory { want, done });
        let haves = BitswapMessage::announcements(&NegotiationEngine::compute_haves(&local));
        let advertised = self.send_all(peer, &haves).await
            && self.send(peer, &BitswapMessage::want_everything(want)).await;
        if !advertised {
            return Err(SyncError::PeerUnavailable(peer.clone()));
        }
        match tokio::time::timeout(self.config.request_timeout(), rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(SyncError::PeerUnavailable(peer.clone())),
            Err(_) => {
                return Err(SyncError::Timeout {
                    peer: peer.clone(),
                    waiting_for: "inventory".into(),
                })
            }
        }

        let remote = lock(&self.inventories).get(peer).cloned().unwrap_or_default();
        let negotiation = NegotiationEngine::negotiate(&self.local_inventory()?, &remote);
        debug!(
            %peer,
            wants = negotiation.wants.len(),
            offers = negotiation.offers.len(),
            common = negotiation.common.len(),
            "negotiated"
        );

        let results: Vec<(Cid, Fetched)> = stream::iter(negotiation.wants)
            .map(|cid| async move {
                let fetched = self.fetch_from(peer, &cid).await;
                (cid, fetched)
            })
            .buffer_unordered(self.config.max_inflight_requests.max(1))
            .collect()
            .await;

        let mut report = SyncReport {
            peer: peer.clone(),
            received: Vec::new(),
            sent: 0,
            invalid: 0,
            failed: Vec::new(),
            duration: Duration::ZERO,
        };
        for (cid, fetched) in results {
            match fetched {
                Fetched::Stored => report.received.push(cid),
                Fetched::Invalid => report.invalid += 1,
                Fetched::Missing => report.failed.push(cid),
                Fetched::Failed(error) => {
                    debug!(%peer, %cid, %error, "block not transferred");
                    report.failed.push(cid);
                }
            }
        }
        report.received.sort();
        report.failed.sort();

        if !report.received.is_empty() {
            self.emit(SyncEvent::BlocksFetched {
                cids: report.received.clone(),
                peer: peer.clone(),
            });
            if self.config.announce_received {
                self.announce(&report.received, Some(peer)).await;
            }
        }
        report.sent = session.served.load(Ordering::Relaxed);
        report.duration = started.elapsed();
        Ok(report)
    }

    async fn sync_with_all_peers(&self) -> Vec<(PeerId, SyncResult<SyncReport>)> {
        let sessions = self.network.connected_peers().into_iter().map(|peer| async move {
            let outcome = self.sync_with_peer(&peer).await;
            (peer, outcome)
        });
        futures::future::join_all(sessions).await
    }

    // -----------------------------------------------------------------------
    // Continuous sync
    // -----------------------------------------------------------------------

    fn start_continuous_sync(self: &Arc<Self>, interval: Duration) {
        self.stop_continuous_sync();
        let interval = interval.max(Duration::from_millis(1));
        let weak = Arc::downgrade(self);
        let ticker = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(engine) = weak.upgrade() else { break };
                engine.begin_pass();
            }
        });
        lock(&self.tasks).ticker = Some(ticker);
        info!(interval_ms = interval.as_millis() as u64, "continuous sync started");
    }

    fn begin_pass(self: &Arc<Self>) {
        if self
            .pass_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            lock(&self.stats).passes_skipped += 1;
            debug!("previous sync pass still running, skipping tick");
            return;
        }
        lock(&self.stats).passes_started += 1;
        let flag = PassFlag(Arc::clone(self));
        let pass = tokio::spawn(async move {
            let flag = flag;
            let engine = &flag.0;
            let outcomes = engine.sync_with_all_peers().await;
            let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
            debug!(sessions = outcomes.len(), failed, "sync pass finished");
        });
        lock(&self.tasks).pass = Some(pass);
    }

    fn stop_continuous_sync(&self) {
        let mut tasks = lock(&self.tasks);
        let was_running = tasks.ticker.is_some();
        for task in [tasks.ticker.take(), tasks.pass.take()].into_iter().flatten() {
            task.abort();
        }
        if was_running {
            info!("continuous sync stopped");
        }
    }

    // -----------------------------------------------------------------------
    // Targeted fetch
    // -----------------------------------------------------------------------

    async fn fetch_missing_blocks(&self, root: &Cid) -> SyncResult<HashSet<Cid>> {
        let peers = self.network.connected_peers();
        if peers.is_empty() {
            return Err(SyncError::NoPeers);
        }
        let mut fetched = HashSet::new();
        let mut by_peer: HashMap<PeerId, Vec<Cid>> = HashMap::new();
        let mut unavailable: HashSet<Cid> = HashSet::new();

        for round in 0..self.config.max_fetch_rounds {
            let mut missing: Vec<Cid> = read_dag(&self.dag)
                .missing_links(root)
                .into_iter()
                .filter(|cid| !unavailable.contains(cid))
                .collect();
            if missing.is_empty() {
                break;
            }
            missing.sort();
            debug!(%root, round, missing = missing.len(), "fetching missing blocks");

            let peers = &peers;
            let results: Vec<(Cid, Option<PeerId>)> = stream::iter(missing)
                .map(|cid| async move {
                    let source = self.fetch_from_any(peers, &cid).await;
                    (cid, source)
                })
                .buffer_unordered(self.config.max_inflight_requests.max(1))
                .collect()
                .await;
            for (cid, source) in results {
                match source {
                    Some(peer) => {
                        fetched.insert(cid.clone());
                        by_peer.entry(peer).or_default().push(cid);
                    }
                    None => {
                        unavailable.insert(cid);
                    }
                }
            }
        }

        for (peer, mut cids) in by_peer {
            cids.sort();
            if self.config.announce_received {
                self.announce(&cids, Some(&peer)).await;
            }
            self.emit(SyncEvent::BlocksFetched { cids, peer });
        }
        if !unavailable.is_empty() {
            warn!(%root, count = unavailable.len(), "some linked blocks could not be found");
        }
        Ok(fetched)
    }

    // -----------------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------------

    async fn ping(&self, peer: &PeerId) -> SyncResult<Duration> {
        let nonce: u64 = rand::random();
        let (tx, rx) = oneshot::channel();
        lock(&self.pings).insert(nonce, (peer.clone(), tx));
        let started = Instant::now();

        if !self.send(peer, &BitswapMessage::Ping { nonce }).await {
            lock(&self.pings).remove(&nonce);
            return Err(SyncError::PeerUnavailable(peer.clone()));
        }
        match tokio::time::timeout(self.config.request_timeout(), rx).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(_)) => Err(SyncError::PeerUnavailable(peer.clone())),
            Err(_) => {
                lock(&self.pings).remove(&nonce);
                Err(SyncError::Timeout {
                    peer: peer.clone(),
                    waiting_for: "pong".into(),
                })
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in [tasks.message_loop.take(), tasks.ticker.take(), tasks.pass.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

async fn message_loop(weak: Weak<Engine>, mut incoming: broadcast::Receiver<PeerEvent>) {
    loop {
        let event = match incoming.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "synchronizer fell behind peer events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(engine) = weak.upgrade() else { break };
        engine.on_peer_event(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dagswap_net::{
        AcceptAll, DefaultHandshake, DeviceAddress, InMemoryPeerStore, LocalIdentity,
        MemoryNetwork, NoopDiscovery, PeerManager, PeerManagerConfig,
    };
    use dagswap_store::{Directory, DirectoryEntry, InMemoryBlockStore, DEFAULT_HASH};
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    fn block(data: &str) -> Block {
        Block::raw(data.as_bytes().to_vec())
    }

    fn synchronizer(network: Arc<dyn PeerNetwork>, config: SyncConfig) -> Synchronizer {
        Synchronizer::new(
            config,
            Arc::new(InMemoryBlockStore::new()),
            Arc::new(RwLock::new(MerkleDag::new())),
            network,
        )
    }

    // -----------------------------------------------------------------------
    // Scripted peer
    // -----------------------------------------------------------------------

    /// A network with one or more fake peers whose replies the test writes
    /// by hand. Everything the synchronizer sends lands in the outbox.
    struct MockNetwork {
        peers: Vec<PeerId>,
        events: broadcast::Sender<PeerEvent>,
        outbox: mpsc::UnboundedSender<(PeerId, BitswapMessage)>,
        send_delay: Duration,
        reachable: bool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    type Outbox = mpsc::UnboundedReceiver<(PeerId, BitswapMessage)>;

    impl MockNetwork {
        fn new(peers: &[&str]) -> (Arc<Self>, Outbox) {
            Self::build(peers, Duration::ZERO, true)
        }

        fn build(peers: &[&str], send_delay: Duration, reachable: bool) -> (Arc<Self>, Outbox) {
            let (outbox, rx) = mpsc::unbounded_channel();
            let (events, _) = broadcast::channel(256);
            let network = Arc::new(Self {
                peers: peers.iter().map(|p| PeerId::new(*p)).collect(),
                events,
                outbox,
                send_delay,
                reachable,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            });
            (network, rx)
        }

        fn deliver(&self, from: &str, message: BitswapMessage) {
            let _ = self.events.send(PeerEvent::MessageReceived {
                peer_id: PeerId::new(from),
                payload: BitswapCodec::encode(&message).unwrap(),
            });
        }

        /// Answer the full-inventory `Want` `want` with `cids`.
        fn answer(&self, from: &str, want: u64, cids: &[Cid]) {
            for message in BitswapMessage::answer(want, cids) {
                self.deliver(from, message);
            }
        }
    }

    #[async_trait]
    impl PeerNetwork for MockNetwork {
        fn connected_peers(&self) -> Vec<PeerId> {
            self.peers.clone()
        }

        async fn send(&self, peer: &PeerId, payload: Vec<u8>) -> bool {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if !self.reachable {
                return false;
            }
            let message = BitswapCodec::decode_exact(&payload).unwrap();
            let _ = self.outbox.send((peer.clone(), message));
            true
        }

        fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
            self.events.subscribe()
        }
    }

    async fn next_sent(
        outbox: &mut Outbox,
        mut pred: impl FnMut(&BitswapMessage) -> bool,
    ) -> BitswapMessage {
        tokio::time::timeout(WAIT, async {
            loop {
                let (_, message) = outbox.recv().await.unwrap();
                if pred(&message) {
                    return message;
                }
            }
        })
        .await
        .expect("expected message never sent")
    }

    async fn next_want(outbox: &mut Outbox) -> u64 {
        match next_sent(outbox, |m| matches!(m, BitswapMessage::Want { .. })).await {
            BitswapMessage::Want { id, .. } => id,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn announce(cids: Vec<Cid>) -> BitswapMessage {
        BitswapMessage::Have { cids, reply: None }
    }

    #[tokio::test]
    async fn want_is_answered_with_held_blocks() {
        let (network, mut outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());
        let a = block("a");
        sync.insert(a.clone()).unwrap();
        sync.insert(block("b")).unwrap();

        network.deliver(
            "remote",
            BitswapMessage::Want {
                id: 1,
                cids: vec![a.cid().clone(), block("zzz").cid().clone()],
            },
        );
        let answer = next_sent(&mut outbox, |_| true).await;
        assert_eq!(
            answer,
            BitswapMessage::Have {
                cids: vec![a.cid().clone()],
                reply: Some(WantReply { want: 1, last: true }),
            }
        );

        network.deliver("remote", BitswapMessage::want_everything(2));
        match next_sent(&mut outbox, |_| true).await {
            BitswapMessage::Have {
                cids,
                reply: Some(reply),
            } => {
                assert_eq!(cids.len(), 2);
                assert_eq!(reply, WantReply { want: 2, last: true });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn block_requests_are_served() {
        let (network, mut outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());
        let a = block("a");
        sync.insert(a.clone()).unwrap();

        network.deliver("remote", BitswapMessage::BlockRequest { cid: a.cid().clone() });
        assert_eq!(
            next_sent(&mut outbox, |_| true).await,
            BitswapMessage::BlockResponse { block: a }
        );

        let absent = block("absent").cid().clone();
        network.deliver("remote", BitswapMessage::BlockRequest { cid: absent.clone() });
        assert_eq!(
            next_sent(&mut outbox, |_| true).await,
            BitswapMessage::BlockNotFound { cid: absent }
        );
        assert_eq!(sync.stats().blocks_sent, 1);
    }

    #[tokio::test]
    async fn have_is_recorded_and_reported() {
        let (network, _outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());
        let mut events = sync.subscribe();
        let held = block("held");
        sync.insert(held.clone()).unwrap();
        let new = block("new").cid().clone();

        network.deliver("remote", announce(vec![held.cid().clone(), new.clone()]));
        let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(
            event,
            SyncEvent::BlocksDiscovered {
                cids: vec![new],
                peer: PeerId::new("remote"),
            }
        );
        assert_eq!(sync.remote_inventory(&PeerId::new("remote")).len(), 2);
    }

    #[tokio::test]
    async fn failed_store_check_is_not_reported_as_discovery() {
        let (network, _outbox) = MockNetwork::new(&["remote"]);
        let store = Arc::new(InMemoryBlockStore::new());
        let sync = Synchronizer::new(
            SyncConfig::default(),
            store.clone(),
            Arc::new(RwLock::new(MerkleDag::new())),
            network.clone(),
        );
        let mut events = sync.subscribe();
        let (a, b) = (block("a").cid().clone(), block("b").cid().clone());

        store.set_available(false);
        network.deliver("remote", announce(vec![a.clone()]));
        tokio::time::timeout(WAIT, async {
            while sync.remote_inventory(&PeerId::new("remote")).is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        store.set_available(true);
        network.deliver("remote", announce(vec![b.clone()]));

        let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(
            event,
            SyncEvent::BlocksDiscovered {
                cids: vec![b],
                peer: PeerId::new("remote"),
            }
        );
        assert_eq!(sync.remote_inventory(&PeerId::new("remote")).len(), 2);
    }

    #[tokio::test]
    async fn forged_block_is_discarded() {
        let (network, mut outbox) = MockNetwork::new(&["evil"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());
        let cid = block("genuine").cid().clone();

        let session = tokio::spawn({
            let sync = sync.clone();
            async move { sync.sync_with_peer(&PeerId::new("evil")).await }
        });
        let want = next_want(&mut outbox).await;
        network.answer("evil", want, &[cid.clone()]);
        next_sent(&mut outbox, |m| matches!(m, BitswapMessage::BlockRequest { .. })).await;
        network.deliver(
            "evil",
            BitswapMessage::BlockResponse {
                block: Block::with_cid(cid.clone(), b"forged".to_vec()),
            },
        );

        let report = session.await.unwrap().unwrap();
        assert!(report.received.is_empty());
        assert_eq!(report.invalid, 1);
        assert!(!report.success());
        assert!(!sync.store().has(&cid).unwrap());
        assert!(!read_dag(sync.dag()).has_block(&cid));
        let stats = sync.stats();
        assert_eq!(stats.invalid_blocks, 1);
        assert_eq!(stats.sessions_failed, 1);
    }

    #[tokio::test]
    async fn one_session_per_peer() {
        let (network, mut outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());

        let first = tokio::spawn({
            let sync = sync.clone();
            async move { sync.sync_with_peer(&PeerId::new("remote")).await }
        });
        let want = next_want(&mut outbox).await;

        let second = sync.sync_with_peer(&PeerId::new("remote")).await;
        assert!(matches!(second, Err(SyncError::SessionInProgress(_))));

        network.answer("remote", want, &[]);
        let report = first.await.unwrap().unwrap();
        assert!(report.success());
    }

    #[tokio::test]
    async fn announcement_during_inventory_query_does_not_cut_it_short() {
        let (network, mut outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());
        let (x, y) = (block("x"), block("y"));

        let session = tokio::spawn({
            let sync = sync.clone();
            async move { sync.sync_with_peer(&PeerId::new("remote")).await }
        });
        let want = next_want(&mut outbox).await;
        network.deliver("remote", announce(vec![x.cid().clone()]));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!session.is_finished());
        network.answer("remote", want.wrapping_add(1), &[]);
        network.answer("remote", want, &[x.cid().clone(), y.cid().clone()]);

        for _ in 0..2 {
            let requested =
                match next_sent(&mut outbox, |m| matches!(m, BitswapMessage::BlockRequest { .. }))
                    .await
                {
                    BitswapMessage::BlockRequest { cid } => cid,
                    other => panic!("unexpected {other:?}"),
                };
            let served = if &requested == x.cid() { x.clone() } else { y.clone() };
            network.deliver("remote", BitswapMessage::BlockResponse { block: served });
        }

        let report = session.await.unwrap().unwrap();
        let mut expected = vec![x.cid().clone(), y.cid().clone()];
        expected.sort();
        assert_eq!(report.received, expected);
        assert!(report.success());
    }

    #[tokio::test]
    async fn inventory_answer_spanning_frames_is_read_to_the_end() {
        let (network, mut outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());
        let x = block("x");

        let session = tokio::spawn({
            let sync = sync.clone();
            async move { sync.sync_with_peer(&PeerId::new("remote")).await }
        });
        let want = next_want(&mut outbox).await;
        network.deliver(
            "remote",
            BitswapMessage::Have {
                cids: vec![],
                reply: Some(WantReply { want, last: false }),
            },
        );
        network.deliver(
            "remote",
            BitswapMessage::Have {
                cids: vec![x.cid().clone()],
                reply: Some(WantReply { want, last: true }),
            },
        );
        next_sent(&mut outbox, |m| matches!(m, BitswapMessage::BlockRequest { .. })).await;
        network.deliver("remote", BitswapMessage::BlockResponse { block: x.clone() });

        let report = session.await.unwrap().unwrap();
        assert_eq!(report.received, vec![x.cid().clone()]);
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (network, _outbox) = MockNetwork::new(&["quiet"]);
        let config = SyncConfig {
            request_timeout_ms: 50,
            ..Default::default()
        };
        let sync = synchronizer(network, config);
        let mut events = sync.subscribe();

        let err = sync.sync_with_peer(&PeerId::new("quiet")).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }));
        assert_eq!(
            events.recv().await.unwrap(),
            SyncEvent::SyncStarted(PeerId::new("quiet"))
        );
        assert!(matches!(events.recv().await.unwrap(), SyncEvent::SyncFailed { .. }));
    }

    #[tokio::test]
    async fn ping_measures_round_trip() {
        let (network, mut outbox) = MockNetwork::new(&["remote"]);
        let sync = synchronizer(network.clone(), SyncConfig::default());

        let ping = tokio::spawn({
            let sync = sync.clone();
            async move { sync.ping(&PeerId::new("remote")).await }
        });
        let nonce = match next_sent(&mut outbox, |_| true).await {
            BitswapMessage::Ping { nonce } => nonce,
            other => panic!("unexpected {other:?}"),
        };
        network.deliver("someone-else", BitswapMessage::Pong { nonce });
        network.deliver("remote", BitswapMessage::Pong { nonce });
        assert!(ping.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn unreachable_peer_is_unavailable() {
        let (network, _outbox) = MockNetwork::build(&["gone"], Duration::ZERO, false);
        let sync = synchronizer(network, SyncConfig::default());
        assert!(matches!(
            sync.ping(&PeerId::new("gone")).await,
            Err(SyncError::PeerUnavailable(_))
        ));
        assert_eq!(sync.announce_blocks(&[block("a").cid().clone()]).await, 0);
    }

    #[tokio::test]
    async fn continuous_passes_never_overlap() {
        let (network, _outbox) =
            MockNetwork::build(&["slow"], Duration::from_millis(250), false);
        let sync = synchronizer(network.clone(), SyncConfig::default());

        sync.start_continuous_sync(Duration::from_millis(100));
        assert!(sync.is_continuous_sync_running());
        tokio::time::sleep(Duration::from_millis(900)).await;
        sync.stop_continuous_sync();
        assert!(!sync.is_continuous_sync_running());

        let stats = sync.stats();
        assert!(stats.passes_started >= 2, "{stats:?}");
        assert!(stats.passes_skipped >= 1, "{stats:?}");
        assert_eq!(network.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pass_aborted_before_it_runs_releases_the_flag() {
        let (network, _outbox) = MockNetwork::new(&[]);
        let sync = synchronizer(network, SyncConfig::default());

        sync.engine.begin_pass();
        sync.stop_continuous_sync();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sync.engine.pass_in_flight.load(Ordering::Acquire));

        sync.start_continuous_sync(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        sync.stop_continuous_sync();
        let stats = sync.stats();
        assert!(stats.passes_started > 1, "{stats:?}");
    }

    #[tokio::test]
    async fn fetch_without_peers_fails() {
        let (network, _outbox) = MockNetwork::new(&[]);
        let sync = synchronizer(network, SyncConfig::default());
        assert!(matches!(
            sync.fetch_missing_blocks(block("root").cid()).await,
            Err(SyncError::NoPeers)
        ));
    }

    // -----------------------------------------------------------------------
    // Two real peers
    // -----------------------------------------------------------------------

    struct Pair {
        x: Synchronizer,
        y: Synchronizer,
        _managers: (PeerManager, PeerManager),
    }

    fn manager(network: &MemoryNetwork, name: &str) -> PeerManager {
        let config = PeerManagerConfig::default();
        PeerManager::new(
            LocalIdentity::new(PeerId::new(name), name),
            config.clone(),
            Arc::new(network.transport(format!("mem://{name}").as_str())),
            Arc::new(NoopDiscovery::new()),
            Arc::new(DefaultHandshake::new(config.handshake_timeout())),
            Arc::new(AcceptAll),
            Arc::new(InMemoryPeerStore::new()),
        )
    }

    async fn connected_pair() -> Pair {
        let network = MemoryNetwork::new();
        let mx = manager(&network, "x");
        let my = manager(&network, "y");
        my.start_listening().await.unwrap();

        let x = synchronizer(Arc::new(mx.clone()), SyncConfig::default());
        let y = synchronizer(Arc::new(my.clone()), SyncConfig::default());

        mx.connect_to_device(&DeviceAddress::new("mem://y")).await.unwrap();
        tokio::time::timeout(WAIT, async {
            while !my.is_connected(&PeerId::new("x")) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("y never saw x");

        Pair {
            x,
            y,
            _managers: (mx, my),
        }
    }

    #[tokio::test]
    async fn two_peers_converge() {
        let pair = connected_pair().await;
        let (a, b, c) = (block("a"), block("b"), block("c"));
        pair.x.insert(a.clone()).unwrap();
        pair.x.insert(b.clone()).unwrap();
        pair.y.insert(a.clone()).unwrap();
        pair.y.insert(c.clone()).unwrap();

        let mut x_events = pair.x.subscribe();
        let mut y_events = pair.y.subscribe();
        let peer_y = PeerId::new("y");
        let peer_x = PeerId::new("x");
        let (from_y, from_x) = tokio::join!(
            pair.x.sync_with_peer(&peer_y),
            pair.y.sync_with_peer(&peer_x),
        );
        let from_y = from_y.unwrap();
        let from_x = from_x.unwrap();
        assert_eq!(from_y.received, vec![c.cid().clone()]);
        assert_eq!(from_x.received, vec![b.cid().clone()]);
        assert!(from_y.success() && from_x.success());

        for (events, peer, fetched, report) in [
            (&mut x_events, "y", &c, &from_y),
            (&mut y_events, "x", &b, &from_x),
        ] {
            let mut seen = Vec::new();
            while let Ok(event) = events.try_recv() {
                seen.push(event);
            }
            assert_eq!(seen.first(), Some(&SyncEvent::SyncStarted(PeerId::new(peer))));
            let fetched_events: Vec<&SyncEvent> = seen
                .iter()
                .filter(|e| matches!(e, SyncEvent::BlocksFetched { .. }))
                .collect();
            assert_eq!(
                fetched_events,
                vec![&SyncEvent::BlocksFetched {
                    cids: vec![fetched.cid().clone()],
                    peer: PeerId::new(peer),
                }]
            );
            assert_eq!(seen.last(), Some(&SyncEvent::SyncCompleted(report.clone())));
        }

        for sync in [&pair.x, &pair.y] {
            let held = sync.store().all_cids().unwrap();
            assert_eq!(held.len(), 3);
            assert_eq!(read_dag(sync.dag()).len(), 3);
        }
    }

    #[tokio::test]
    async fn sync_with_all_peers_covers_every_connection() {
        let pair = connected_pair().await;
        pair.y.insert(block("only-on-y")).unwrap();

        let outcomes = pair.x.sync_with_all_peers().await;
        assert_eq!(outcomes.len(), 1);
        let (peer, outcome) = &outcomes[0];
        assert_eq!(peer, &PeerId::new("y"));
        assert_eq!(outcome.as_ref().unwrap().received.len(), 1);
        assert_eq!(pair.x.stats().sessions_succeeded, 1);
    }

    #[tokio::test]
    async fn missing_subtree_is_fetched_round_by_round() {
        let pair = connected_pair().await;
        let (f1, f2) = (block("file one"), block("file two"));

        let mut inner = Directory::new();
        inner.insert(DirectoryEntry::file("two.txt", f2.cid().clone(), f2.len() as u64));
        let inner = inner.to_block(DEFAULT_HASH).unwrap();

        let mut root = Directory::new();
        root.insert(DirectoryEntry::file("one.txt", f1.cid().clone(), f1.len() as u64));
        root.insert(DirectoryEntry::directory("sub", inner.cid().clone(), 0));
        let root = root.to_block(DEFAULT_HASH).unwrap();

        for b in [&f1, &f2, &inner, &root] {
            pair.y.insert(b.clone()).unwrap();
        }

        let mut events = pair.x.subscribe();
        let fetched = pair.x.fetch_missing_blocks(root.cid()).await.unwrap();
        assert_eq!(fetched.len(), 4);
        assert!(read_dag(pair.x.dag()).missing_links(root.cid()).is_empty());
        match events.recv().await.unwrap() {
            SyncEvent::BlocksFetched { cids, peer } => {
                assert_eq!(cids.len(), 4);
                assert_eq!(peer, PeerId::new("y"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let again = pair.x.fetch_missing_blocks(root.cid()).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn unknown_root_yields_nothing() {
        let pair = connected_pair().await;
        let fetched = pair
            .x
            .fetch_missing_blocks(block("nowhere").cid())
            .await
            .unwrap();
        assert!(fetched.is_empty());
    }
}
