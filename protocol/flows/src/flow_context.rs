use indexmap::IndexMap;
use norn_addressmanager::AddressManager;
use norn_consensus_core::{
    api::{ConsensusApi, DynConsensus},
    block::Block,
    config::Config,
    tx::TransactionId,
};
use norn_consensusmanager::ConsensusManager;
use norn_core::time::unix_now;
use norn_hashes::Hash;
use norn_mempool::Mempool;
use norn_p2p_lib::{Hub, Message, Peer, ProtocolError};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Maximum number of orphan blocks kept while their parents are requested
const MAX_ORPHAN_BLOCKS: usize = 600;

/// A block received via relay is handled as an orphan only when its declared
/// blue score is within this range of the local virtual; otherwise the gap
/// indicates the node is out of sync and IBD starts instead
pub const MAX_ORPHAN_BLUE_SCORE_DIFF: u64 = 10_000;

/// Interval between rebroadcasts of locally originated transactions
pub const TRANSACTION_REBROADCAST_INTERVAL: Duration = Duration::from_secs(30);

/// A block hash registered in a process-wide requested-set; deregisters itself
/// on drop so an entry is always released on every flow exit path
pub struct RequestScope {
    set: Arc<Mutex<HashSet<Hash>>>,
    pub req: Hash,
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.set.lock().remove(&self.req);
    }
}

/// A process-wide set preventing concurrent duplicate downloads from different peers
#[derive(Clone, Default)]
pub struct SharedRequests {
    set: Arc<Mutex<HashSet<Hash>>>,
}

impl SharedRequests {
    /// Atomically registers the hash; `None` means another flow already
    /// requested it and this caller must skip the download
    pub fn add_if_not_exists(&self, hash: Hash) -> Option<RequestScope> {
        if self.set.lock().insert(hash) {
            Some(RequestScope { set: self.set.clone(), req: hash })
        } else {
            None
        }
    }
}

/// Process-wide shared state consulted by all per-peer flows
pub struct FlowContext {
    pub config: Arc<Config>,
    pub consensus_manager: Arc<ConsensusManager>,
    pub mempool: Arc<Mempool>,
    pub address_manager: Arc<Mutex<AddressManager>>,
    pub hub: Hub,

    /// This node's random per-run identity, advertised in version messages
    pub node_id: [u8; 16],

    pub shared_requested_blocks: SharedRequests,
    pub shared_requested_transactions: SharedRequests,

    /// 0 = idle, 1 = an IBD is running. Set/unset strictly via
    /// [`FlowContext::try_start_ibd`] and the returned guard.
    is_in_ibd: AtomicU32,

    orphan_blocks: Mutex<IndexMap<Hash, Block>>,
    peers: RwLock<IndexMap<Uuid, Arc<Peer>>>,

    /// IDs of transactions submitted locally, rebroadcast periodically
    local_transaction_ids: Mutex<HashSet<TransactionId>>,

    /// Per-peer IBD trigger channels, registered by each peer's IBD flow
    ibd_triggers: Mutex<HashMap<Uuid, UnboundedSender<Hash>>>,
}

/// Guard marking an IBD as running; dropping it marks it done. Unsetting an
/// already-unset flag indicates a logic bug and aborts the process.
pub struct IbdRunningGuard {
    indicator: Arc<FlowContext>,
}

impl Drop for IbdRunningGuard {
    fn drop(&mut self) {
        let result = self.indicator.is_in_ibd.compare_exchange(1, 0, Ordering::SeqCst, Ordering::SeqCst);
        assert!(result.is_ok(), "the IBD running flag was unset twice");
    }
}

impl FlowContext {
    pub fn new(
        config: Arc<Config>,
        consensus_manager: Arc<ConsensusManager>,
        mempool: Arc<Mempool>,
        address_manager: Arc<Mutex<AddressManager>>,
        hub: Hub,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            consensus_manager,
            mempool,
            address_manager,
            hub,
            node_id: rand::thread_rng().r#gen(),
            shared_requested_blocks: Default::default(),
            shared_requested_transactions: Default::default(),
            is_in_ibd: AtomicU32::new(0),
            orphan_blocks: Mutex::new(IndexMap::new()),
            peers: RwLock::new(IndexMap::new()),
            local_transaction_ids: Mutex::new(HashSet::new()),
            ibd_triggers: Mutex::new(HashMap::new()),
        })
    }

    pub fn consensus(&self) -> DynConsensus {
        self.consensus_manager.consensus()
    }

    pub fn is_ibd_running(&self) -> bool {
        self.is_in_ibd.load(Ordering::SeqCst) == 1
    }

    /// Tries to acquire the single IBD slot (CAS 0 -> 1)
    pub fn try_start_ibd(self: &Arc<Self>) -> Option<IbdRunningGuard> {
        if self.is_in_ibd.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            Some(IbdRunningGuard { indicator: self.clone() })
        } else {
            None
        }
    }

    /// Requests the IBD flow of the given peer to attempt a sync towards the
    /// advertised selected tip
    pub fn trigger_ibd(&self, peer_key: Uuid, peer_selected_tip: Hash) {
        if let Some(sender) = self.ibd_triggers.lock().get(&peer_key) {
            let _ = sender.send(peer_selected_tip);
        }
    }

    pub(crate) fn register_ibd_trigger(&self, peer_key: Uuid, sender: UnboundedSender<Hash>) {
        self.ibd_triggers.lock().insert(peer_key, sender);
    }

    pub(crate) fn unregister_ibd_trigger(&self, peer_key: Uuid) {
        self.ibd_triggers.lock().remove(&peer_key);
    }

    // -- Orphan block pool --

    pub fn is_known_orphan(&self, hash: Hash) -> bool {
        self.orphan_blocks.lock().contains_key(&hash)
    }

    pub fn add_orphan(&self, block: Block) {
        let mut orphans = self.orphan_blocks.lock();
        if orphans.len() >= MAX_ORPHAN_BLOCKS {
            let victim = rand::thread_rng().gen_range(0..orphans.len());
            orphans.swap_remove_index(victim);
        }
        orphans.insert(block.hash(), block);
    }

    /// The missing direct parents of a known orphan
    pub fn orphan_missing_parents(&self, consensus: &dyn ConsensusApi, hash: Hash) -> Vec<Hash> {
        let orphans = self.orphan_blocks.lock();
        let Some(block) = orphans.get(&hash) else { return Vec::new() };
        block.header.parents.iter().copied().filter(|parent| !consensus.block_exists(*parent) && !orphans.contains_key(parent)).collect()
    }

    /// Attempts insertion of any orphans whose parents were satisfied by the
    /// acceptance of `root`, cascading recursively. Returns the blocks which
    /// entered the DAG.
    pub fn unorphan_blocks(&self, consensus: &dyn ConsensusApi, root: Hash) -> Vec<Block> {
        let mut unorphaned = Vec::new();
        let mut queue = vec![root];
        while let Some(parent) = queue.pop() {
            let candidates: Vec<Block> = {
                let orphans = self.orphan_blocks.lock();
                orphans
                    .values()
                    .filter(|block| block.header.parents.contains(&parent))
                    .filter(|block| block.header.parents.iter().all(|p| consensus.block_exists(*p)))
                    .cloned()
                    .collect()
            };
            for block in candidates {
                let hash = block.hash();
                self.orphan_blocks.lock().shift_remove(&hash);
                match consensus.validate_and_insert_block(block.clone()) {
                    Ok(_) => {
                        queue.push(hash);
                        unorphaned.push(block);
                    }
                    Err(err) => {
                        log::debug!("orphan block {hash} was rejected during unorphaning: {err}");
                    }
                }
            }
        }
        unorphaned
    }

    // -- Peer registry --

    pub fn register_peer(&self, peer: Arc<Peer>) {
        self.peers.write().insert(peer.key(), peer);
    }

    pub fn unregister_peer(&self, key: Uuid) {
        self.peers.write().shift_remove(&key);
    }

    pub fn peer(&self, key: Uuid) -> Option<Arc<Peer>> {
        self.peers.read().get(&key).cloned()
    }

    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().values().cloned().collect()
    }

    // -- Post-insertion fan-out --

    /// Handles a block which entered the DAG: updates the mempool, relays the
    /// promoted transactions and broadcasts the block inv to all ready peers
    pub async fn on_new_block(&self, consensus: &dyn ConsensusApi, block: &Block, source: Option<Uuid>) {
        let hash = block.hash();
        // Unorphaned descendants are broadcast as well
        let unorphaned = self.unorphan_blocks(consensus, hash);

        for inserted in std::iter::once(block).chain(unorphaned.iter()) {
            match self.mempool.handle_new_block_transactions(consensus, &inserted.transactions) {
                Ok(promoted) => {
                    let ids: Vec<TransactionId> = promoted.iter().map(|descriptor| descriptor.id()).collect();
                    self.broadcast_transactions(ids, None).await;
                }
                Err(err) => log::warn!("mempool failed handling block {}: {}", inserted.hash(), err),
            }
            self.hub.broadcast(Message::InvRelayBlock(inserted.hash()), source).await;
        }
    }

    /// Marks a transaction as locally originated for periodic rebroadcast
    pub fn register_local_transaction(&self, id: TransactionId) {
        self.local_transaction_ids.lock().insert(id);
    }

    /// Broadcasts transaction invs in capped batches
    pub async fn broadcast_transactions(&self, ids: Vec<TransactionId>, source: Option<Uuid>) {
        for chunk in ids.chunks(norn_p2p_lib::wire::message::MAX_INV_PER_TX_INV_MSG) {
            if chunk.is_empty() {
                continue;
            }
            self.hub.broadcast(Message::InvTransactions(chunk.to_vec()), source).await;
        }
    }

    /// Spawns the periodic rebroadcast task for locally originated transactions
    pub fn start_transaction_rebroadcast_task(self: &Arc<Self>) {
        let ctx = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TRANSACTION_REBROADCAST_INTERVAL);
            loop {
                ticker.tick().await;
                let ids: Vec<TransactionId> = {
                    let mut local = ctx.local_transaction_ids.lock();
                    // Drop entries the mempool no longer tracks (mined or evicted)
                    local.retain(|id| ctx.mempool.has_transaction(*id, false));
                    local.iter().copied().collect()
                };
                ctx.broadcast_transactions(ids, None).await;
            }
        });
    }

    /// Decides whether a relay block with unknown parents should be handled as
    /// an orphan or trigger an IBD: the block's declared blue score must be
    /// within [`MAX_ORPHAN_BLUE_SCORE_DIFF`] of the local virtual
    pub fn is_block_in_orphan_resolution_range(&self, consensus: &dyn ConsensusApi, block: &Block) -> bool {
        let Some(coinbase) = block.transactions.first() else { return false };
        let Ok(coinbase_data) = norn_consensus_core::coinbase::deserialize_coinbase_payload(&coinbase.payload) else {
            return false;
        };
        let virtual_blue_score = consensus.get_virtual_blue_score();
        coinbase_data.blue_score.abs_diff(virtual_blue_score) <= MAX_ORPHAN_BLUE_SCORE_DIFF
    }

    /// Handles a flow-level protocol error: banning peers on misbehavior (with
    /// a final `Reject` note), plain disconnect otherwise
    pub async fn on_flow_error(&self, peer_router: &Arc<norn_p2p_lib::Router>, err: &ProtocolError) {
        match err {
            ProtocolError::ConnectionClosed => {}
            _ => log::info!("P2P, flow error from peer {}: {}", peer_router.net_address(), err),
        }
        if err.should_ban() {
            peer_router.try_enqueue(Message::Reject { reason: err.to_string() });
            self.address_manager.lock().ban(peer_router.net_address().ip);
        }
        peer_router.close();
    }

    pub fn local_time(&self) -> u64 {
        unix_now()
    }
}
