use norn_hashes::Hash;
use norn_multiset::Multiset;

use crate::{
    block::{Block, BlockInfo, BlockInsertionResult, BlockTemplate},
    coinbase::MinerData,
    errors::{
        block::BlockProcessResult,
        consensus::ConsensusResult,
        pruning::PruningImportResult,
        tx::TxResult,
    },
    sync_info::SyncInfo,
    tx::{MutableTransaction, Transaction, TransactionOutpoint, UtxoEntry},
    BlockHashSet, BlueWorkType,
};

/// Abstracts the consensus external API
#[allow(unused_variables)]
pub trait ConsensusApi: Send + Sync {
    fn build_block_template(&self, miner_data: MinerData, txs: Vec<Transaction>) -> ConsensusResult<BlockTemplate> {
        unimplemented!()
    }

    fn validate_and_insert_block(&self, block: Block) -> BlockProcessResult<BlockInsertionResult> {
        unimplemented!()
    }

    /// Inserts a block belonging to a pruning point anticone, trusting the
    /// externally provided GHOSTDAG and multiset metadata instead of computing
    /// them locally
    fn validate_and_insert_trusted_block(
        &self,
        block: Block,
        blue_score: u64,
        blue_work: BlueWorkType,
        multiset: Multiset,
    ) -> BlockProcessResult<()> {
        unimplemented!()
    }

    /// The ECMH multiset of the virtual UTXO as of the given block
    fn get_utxo_multiset(&self, hash: Hash) -> Option<Multiset> {
        unimplemented!()
    }

    /// Populates the mempool transaction with maximally found UTXO entry data and proceeds to full transaction
    /// validation if all are found. If validation is successful, `transaction.calculated_fee` is expected to be populated
    fn validate_mempool_transaction_and_populate(&self, transaction: &mut MutableTransaction) -> TxResult<()> {
        unimplemented!()
    }

    fn calculate_transaction_mass(&self, transaction: &Transaction) -> u64 {
        unimplemented!()
    }

    fn get_block(&self, hash: Hash) -> ConsensusResult<Block> {
        unimplemented!()
    }

    fn get_block_info(&self, hash: Hash) -> BlockInfo {
        unimplemented!()
    }

    fn get_virtual_selected_parent(&self) -> Hash {
        unimplemented!()
    }

    fn get_virtual_blue_score(&self) -> u64 {
        unimplemented!()
    }

    fn get_virtual_past_median_time(&self) -> u64 {
        unimplemented!()
    }

    fn get_virtual_parents(&self) -> BlockHashSet {
        unimplemented!()
    }

    fn get_headers_selected_tip(&self) -> Hash {
        unimplemented!()
    }

    fn get_sync_info(&self) -> SyncInfo {
        unimplemented!()
    }

    /// Returns whether this consensus is considered synced or close to being synced.
    /// This info is used to determine if it's ok to use a block template from this node for mining purposes.
    fn is_nearly_synced(&self) -> bool {
        unimplemented!()
    }

    fn block_exists(&self, hash: Hash) -> bool {
        unimplemented!()
    }

    fn get_blue_work(&self, hash: Hash) -> ConsensusResult<BlueWorkType> {
        unimplemented!()
    }

    /// Builds an exponentially-spaced chain block locator from `low` up to `high`
    fn create_block_locator_from_pruning_point(&self, high: Hash, limit: usize) -> ConsensusResult<Vec<Hash>> {
        unimplemented!()
    }

    /// Returns the highest hash from `locator` which is a known chain block
    fn find_highest_shared_block(&self, locator: &[Hash]) -> ConsensusResult<Hash> {
        unimplemented!()
    }

    /// Returns hashes of blocks in the future of `low` and the past of `high`
    /// (inclusive of `high`), in topological order, skipping bodies we do not have
    fn get_hashes_between(&self, low: Hash, high: Hash, max_blocks: usize) -> ConsensusResult<Vec<Hash>> {
        unimplemented!()
    }

    fn get_pruning_point(&self) -> Hash {
        unimplemented!()
    }

    /// Returns the pruning point anticone (including the pruning point itself)
    /// together with the UTXO diff metadata needed by an importing node
    fn get_pruning_point_anticone(&self) -> ConsensusResult<Vec<Hash>> {
        unimplemented!()
    }

    fn get_virtual_utxos(&self, from_outpoint: Option<TransactionOutpoint>, chunk_size: usize) -> Vec<(TransactionOutpoint, UtxoEntry)> {
        unimplemented!()
    }

    fn is_valid_pruning_point(&self, hash: Hash) -> bool {
        unimplemented!()
    }

    /// Feeds a chunk of an imported pruning point UTXO set, updating the
    /// incremental multiset commitment
    fn append_imported_pruning_point_utxos(&self, utxoset_chunk: &[(TransactionOutpoint, UtxoEntry)], current_multiset: &mut Multiset) {
        unimplemented!()
    }

    /// Finalizes an imported pruning point UTXO set by verifying the commitment
    fn import_pruning_point_utxo_set(&self, new_pruning_point: Hash, imported_utxo_multiset: &mut Multiset) -> PruningImportResult<()> {
        unimplemented!()
    }

    fn validate_and_insert_imported_pruning_point(&self, new_pruning_point: Hash) -> PruningImportResult<()> {
        unimplemented!()
    }
}

/// A dynamic reference to a consensus instance
pub type DynConsensus = std::sync::Arc<dyn ConsensusApi>;
