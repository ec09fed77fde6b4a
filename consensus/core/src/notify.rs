use crate::block::Block;
use crate::tx::TransactionId;
use norn_hashes::Hash;
use std::sync::Arc;

/// Consensus events delivered to subscribers (mempool, RPC listeners) strictly
/// after the DAG write lock is released.
#[derive(Debug, Clone)]
pub enum Notification {
    BlockAdded(BlockAddedNotification),
    ChainChanged(ChainChangedNotification),
    FinalityConflict(FinalityConflictNotification),
    FinalityConflictResolved(FinalityConflictResolvedNotification),
    PruningPointUtxoSetOverride(PruningPointUtxoSetOverrideNotification),
}

#[derive(Debug, Clone)]
pub struct BlockAddedNotification {
    pub block: Block,
}

#[derive(Debug, Clone)]
pub struct ChainChangedNotification {
    /// Chain blocks removed from the virtual selected parent chain, in
    /// high-to-low order
    pub removed_chain_block_hashes: Arc<Vec<Hash>>,
    /// Chain blocks added to the virtual selected parent chain, in
    /// low-to-high order
    pub added_chain_block_hashes: Arc<Vec<Hash>>,
    /// IDs of transactions accepted by the newly added chain blocks
    pub accepted_transaction_ids: Arc<Vec<TransactionId>>,
}

#[derive(Debug, Clone)]
pub struct FinalityConflictNotification {
    pub violating_block_hash: Hash,
}

#[derive(Debug, Clone)]
pub struct FinalityConflictResolvedNotification {
    pub finality_block_hash: Hash,
}

#[derive(Debug, Clone, Default)]
pub struct PruningPointUtxoSetOverrideNotification {}
