use crate::model::stores::ghostdag::GhostdagData;
use norn_consensus_core::tx::TransactionId;
use norn_consensus_core::utxo::utxo_diff::UtxoDiff;
use norn_database::prelude::{CachedDbItem, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use norn_multiset::Multiset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The full state of the virtual block: the hypothetical block whose parents
/// are the current DAG tips.
#[derive(Clone, Serialize, Deserialize)]
pub struct VirtualState {
    pub parents: Vec<Hash>,
    pub ghostdag_data: GhostdagData,
    /// The expected difficulty bits of a new block built over the virtual
    pub bits: u32,
    pub past_median_time: u64,
    /// The acceptance diff of the virtual's mergeset vs. the selected parent's past UTXO
    pub utxo_diff: UtxoDiff,
    /// IDs of the transactions accepted by the virtual, in consensus order
    pub accepted_tx_ids: Vec<TransactionId>,
    /// Total fees paid by the accepted transactions
    pub accepted_fees: u64,
    /// The ECMH multiset of the full virtual UTXO set
    pub multiset: Multiset,
}

impl VirtualState {
    pub fn selected_parent(&self) -> Hash {
        self.ghostdag_data.selected_parent
    }

    pub fn blue_score(&self) -> u64 {
        self.ghostdag_data.blue_score
    }
}

pub trait VirtualStateStoreReader {
    fn get(&self) -> Result<Arc<VirtualState>, StoreError>;
}

pub trait VirtualStateStore: VirtualStateStoreReader {
    fn set(&mut self, writer: impl DbWriter, state: Arc<VirtualState>) -> Result<(), StoreError>;
}

const STORE_KEY: &[u8] = b"virtual-state";

#[derive(Clone)]
pub struct DbVirtualStateStore {
    access: CachedDbItem<Arc<VirtualState>>,
}

impl DbVirtualStateStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbItem::new(db, STORE_KEY.to_vec()) }
    }

    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        match self.access.read() {
            Ok(_) => Ok(true),
            Err(StoreError::KeyNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

impl VirtualStateStoreReader for DbVirtualStateStore {
    fn get(&self) -> Result<Arc<VirtualState>, StoreError> {
        self.access.read()
    }
}

impl VirtualStateStore for DbVirtualStateStore {
    fn set(&mut self, writer: impl DbWriter, state: Arc<VirtualState>) -> Result<(), StoreError> {
        self.access.write(writer, &state)
    }
}
