//!
//! Utilities for building consensus instances and valid blocks in tests and
//! simulations. The block builder runs the same acceptance computation the
//! validator runs, then grinds the nonce, so produced blocks pass full validation.
//!
use super::Consensus;
use norn_consensus_core::{
    api::ConsensusApi,
    block::{Block, BlockInsertionResult},
    coinbase::MinerData,
    config::{params::Params, Config},
    errors::block::{BlockProcessResult, RuleError},
    tx::Transaction,
};
use norn_database::prelude::{create_temp_db, DbLifetime};
use norn_hashes::Hash;
use norn_math::Uint256;
use std::sync::Arc;

pub struct TestConsensus {
    pub consensus: Arc<Consensus>,
    params: Params,
    _db_lifetime: DbLifetime,
}

impl TestConsensus {
    pub fn new(params: Params) -> Self {
        let (db_lifetime, db) = create_temp_db();
        let config = Arc::new(Config::new(params.clone()));
        let consensus = Arc::new(Consensus::new(db, config));
        Self { consensus, params, _db_lifetime: db_lifetime }
    }

    pub fn genesis_hash(&self) -> Hash {
        self.consensus.genesis_hash()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Builds a block over the given parents carrying the given transactions,
    /// with commitments computed the same way validation recomputes them
    pub fn build_block_with_parents(&self, parents: Vec<Hash>, txs: Vec<Transaction>) -> BlockProcessResult<Block> {
        self.build_block_with_miner_data(parents, txs, MinerData::default())
    }

    pub fn build_block_with_miner_data(
        &self,
        parents: Vec<Hash>,
        txs: Vec<Transaction>,
        miner_data: MinerData,
    ) -> BlockProcessResult<Block> {
        let inner = self.consensus.inner.read();
        let (state, _) = inner.compute_virtual_state(&parents)?;
        let coinbase = inner
            .coinbase_manager
            .build_coinbase_transaction(state.blue_score(), state.accepted_fees, miner_data)
            .map_err(RuleError::BadCoinbasePayload)?;

        let mut transactions = vec![coinbase];
        transactions.extend(txs);

        let hash_merkle_root = norn_merkle::calc_merkle_root(transactions.iter().map(|tx| tx.hash()));
        let accepted_id_merkle_root = norn_merkle::calc_merkle_root(state.accepted_tx_ids.iter().copied());
        let utxo_commitment = state.multiset.finalize();
        // Keep the simulated block rate on target so the difficulty stays flat
        let selected_parent_timestamp = inner.headers_store_timestamp(state.selected_parent());
        let timestamp = state.past_median_time.max(selected_parent_timestamp) + self.params.target_time_per_block;

        let mut header = norn_consensus_core::header::Header::new(
            norn_consensus_core::constants::BLOCK_VERSION,
            parents,
            hash_merkle_root,
            accepted_id_merkle_root,
            utxo_commitment,
            timestamp,
            state.bits,
            0,
        );
        // Grind the nonce; on low-difficulty nets a couple of attempts suffice
        let target = Uint256::from_compact_target_bits(header.bits).unwrap();
        while Uint256::from(header.hash) > target {
            header.nonce += 1;
            header.finalize();
        }
        Ok(Block::new(header, transactions))
    }

    /// Builds a block over the given parents and inserts it
    pub fn add_block_with_parents(&self, parents: Vec<Hash>) -> BlockProcessResult<BlockInsertionResult> {
        let block = self.build_block_with_parents(parents, vec![])?;
        self.consensus.validate_and_insert_block(block)
    }

    /// Builds and inserts a chain of empty blocks over `from`, returning the tip
    pub fn add_chain(&self, from: Hash, length: usize) -> Hash {
        let mut tip = from;
        for _ in 0..length {
            let block = self.build_block_with_parents(vec![tip], vec![]).unwrap();
            tip = block.hash();
            self.consensus.validate_and_insert_block(block).unwrap();
        }
        tip
    }
}

impl super::ConsensusInner {
    fn headers_store_timestamp(&self, hash: Hash) -> u64 {
        use crate::model::stores::headers::HeaderStoreReader;
        self.headers_store.get_timestamp(hash).unwrap()
    }
}
