use norn_consensus_core::{
    api::ConsensusApi,
    block::{Block, BlockTemplate},
    coinbase::MinerData,
    errors::consensus::ConsensusResult,
    tx::{Transaction, TransactionId},
};
use norn_core::time::unix_now;
use norn_hashes::Hash;
use norn_mempool::model::TransactionDescriptor;
use norn_p2p_flows::FlowContext;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Reasons a submitted block is turned down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBlockRejectReason {
    /// The node is syncing and cannot judge the block yet
    IsInIBD,
    BlockInvalid,
}

#[derive(Debug, Clone)]
pub struct ConnectedPeerInfo {
    pub address: String,
    pub user_agent: String,
    pub is_outbound: bool,
    pub selected_tip: Hash,
    pub time_offset: i64,
}

/// The window over which the block-add rate is measured for the `is_synced`
/// template heuristic
const BLOCK_RATE_WINDOW_MILLIS: u64 = 60_000;

/// The in-process operations surface consumed by RPC frontends and the miner.
/// Wire encodings are the frontends' concern; the semantics live here.
pub struct OpsService {
    ctx: Arc<FlowContext>,
    recent_block_times: Mutex<VecDeque<u64>>,
}

impl OpsService {
    pub fn new(ctx: Arc<FlowContext>) -> Arc<Self> {
        Arc::new(Self { ctx, recent_block_times: Mutex::new(VecDeque::new()) })
    }

    /// Validates and inserts a locally mined block, then relays it
    pub async fn submit_block(&self, block: Block) -> Result<(), SubmitBlockRejectReason> {
        if self.ctx.is_ibd_running() {
            return Err(SubmitBlockRejectReason::IsInIBD);
        }
        let consensus = self.ctx.consensus();
        match consensus.validate_and_insert_block(block.clone()) {
            Ok(_) => {
                self.note_block_added();
                self.ctx.on_new_block(consensus.as_ref(), &block, None).await;
                Ok(())
            }
            Err(err) => {
                log::warn!("submitted block {} was rejected: {}", block.hash(), err);
                Err(SubmitBlockRejectReason::BlockInvalid)
            }
        }
    }

    /// Validates a locally submitted transaction, inserts it into the mempool
    /// and schedules it for relay
    pub async fn submit_transaction(&self, transaction: Transaction) -> Result<TransactionId, norn_mempool::errors::RuleError> {
        let id = transaction.id();
        let consensus = self.ctx.consensus();
        let accepted = self.ctx.mempool.validate_and_insert_transaction(consensus.as_ref(), transaction, false)?;
        self.ctx.register_local_transaction(id);
        let ids: Vec<TransactionId> = accepted.iter().map(|descriptor| descriptor.id()).collect();
        self.ctx.broadcast_transactions(ids, None).await;
        Ok(id)
    }

    /// Builds a block template paying to the given script, with the mempool's
    /// best transactions included
    pub fn get_block_template(&self, miner_data: MinerData) -> ConsensusResult<(BlockTemplate, bool)> {
        let consensus = self.ctx.consensus();
        // Leave room for the coinbase within the block mass budget
        let available_mass = self.ctx.config.params.max_block_mass - 10_000;
        let txs = self.ctx.mempool.block_candidate_transactions(available_mass);
        let template = consensus.build_block_template(miner_data, txs.iter().map(|tx| (**tx).clone()).collect())?;
        Ok((template, self.is_synced(consensus.as_ref())))
    }

    /// The template is mineable when the selected tip is fresh, or while blocks
    /// are arriving at (or above) the expected network rate, indicating the
    /// node is keeping up
    fn is_synced(&self, consensus: &dyn ConsensusApi) -> bool {
        if consensus.is_nearly_synced() {
            return true;
        }
        let now = unix_now();
        let rate = {
            let mut times = self.recent_block_times.lock();
            while times.front().is_some_and(|t| *t + BLOCK_RATE_WINDOW_MILLIS < now) {
                times.pop_front();
            }
            times.len() as f64 * 1000.0 / BLOCK_RATE_WINDOW_MILLIS as f64
        };
        rate > self.ctx.config.params.bps() * 1.05
    }

    pub fn note_block_added(&self) {
        self.recent_block_times.lock().push_back(unix_now());
    }

    pub fn get_block(&self, hash: Hash) -> Option<Block> {
        self.ctx.consensus().get_block(hash).ok()
    }

    pub fn get_mempool_entries(&self) -> Vec<TransactionDescriptor> {
        self.ctx.mempool.get_all_transactions()
    }

    pub fn get_connected_peer_info(&self) -> Vec<ConnectedPeerInfo> {
        self.ctx
            .peers()
            .iter()
            .map(|peer| {
                let properties = peer.properties();
                ConnectedPeerInfo {
                    address: peer.net_address().to_string(),
                    user_agent: properties.user_agent.clone(),
                    is_outbound: peer.is_outbound(),
                    selected_tip: peer.selected_tip(),
                    time_offset: properties.time_offset,
                }
            })
            .collect()
    }
}
