use norn_consensus_core::tx::{MutableTransaction, Transaction, TransactionId};
use std::sync::Arc;

/// A transaction inside one of the mempool pools, along with its insertion time
#[derive(Clone)]
pub struct MempoolTransaction {
    pub mtx: MutableTransaction,
    /// Unix milliseconds at insertion; drives orphan expiry
    pub added_at: u64,
}

impl MempoolTransaction {
    pub fn new(mtx: MutableTransaction, added_at: u64) -> Self {
        Self { mtx, added_at }
    }

    pub fn id(&self) -> TransactionId {
        self.mtx.id()
    }

    pub fn tx(&self) -> &Arc<Transaction> {
        &self.mtx.tx
    }
}

/// A summary of an accepted transaction served to miners and RPC clients
#[derive(Clone, Debug)]
pub struct TransactionDescriptor {
    pub transaction: Arc<Transaction>,
    pub fee: u64,
    pub mass: u64,
    /// `fee * 10^6 / mass`, the miner's selection priority key
    pub fee_per_mass: u64,
}

impl TransactionDescriptor {
    pub fn id(&self) -> TransactionId {
        self.transaction.id()
    }
}
