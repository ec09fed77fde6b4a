use super::ConsensusInner;
use crate::model::stores::{
    acceptance_data::{AcceptanceDataStore, AcceptanceDataStoreReader},
    block_transactions::{BlockTransactionsStore, BlockTransactionsStoreReader},
    ghostdag::{GhostdagData, GhostdagStore, GhostdagStoreReader},
    headers::{HeaderStore, HeaderStoreReader},
    pruning::PruningStore,
    reachability::StagingReachabilityStore,
    relations::RelationsStore,
    statuses::StatusesStore,
    subnetworks::{SubnetworkData, SubnetworksStore, SubnetworksStoreReader},
    tips::TipsStore,
    utxo_diffs::{UtxoDiffsStore, UtxoDiffsStoreReader},
    utxo_multisets::{UtxoMultisetsStore, UtxoMultisetsStoreReader},
    utxo_set::{UtxoSetStore, UtxoSetStoreReader},
    virtual_state::{VirtualState, VirtualStateStore},
};
use crate::processes::reachability::inquirer as reachability;
use norn_consensus_core::{
    block::{Block, BlockInsertionResult, BlockTemplate},
    blockstatus::BlockStatus,
    coinbase::MinerData,
    errors::{
        block::{BlockProcessResult, RuleError},
        consensus::{ConsensusError, ConsensusResult},
        pruning::{PruningImportError, PruningImportResult},
        tx::{TxResult, TxRuleError},
    },
    notify::{BlockAddedNotification, ChainChangedNotification, Notification},
    subnets::SUBNETWORK_ID_REGISTRY,
    tx::{MutableTransaction, Transaction, TransactionId, TransactionOutpoint, UtxoEntry, ValidatedTransaction},
    utxo::{
        utxo_diff::UtxoDiff,
        utxo_view::{compose_one_diff_layer, UtxoView},
    },
    BlueWorkType,
};
use norn_core::time::unix_now;
use norn_database::prelude::{BatchDbWriter, DirectDbWriter};
use norn_hashes::Hash;
use norn_merkle::calc_merkle_root;
use norn_multiset::Multiset;
use rocksdb::WriteBatch;
use std::collections::HashSet;
use std::sync::Arc;

/// Canonical byte form of a UTXO entry fed into the ECMH multiset
pub(super) fn serialize_utxo(outpoint: &TransactionOutpoint, entry: &UtxoEntry) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(85 + entry.script_public_key.len());
    bytes.extend(outpoint.transaction_id.as_bytes());
    bytes.extend(outpoint.index.to_le_bytes());
    bytes.extend(entry.block_blue_score.to_le_bytes());
    bytes.extend(entry.amount.to_le_bytes());
    bytes.push(entry.is_coinbase as u8);
    bytes.extend(&entry.script_public_key);
    bytes
}

/// The outcome of simulating the acceptance step of a (possibly virtual) block
pub(super) struct AcceptanceResult {
    /// The acceptance diff vs. the selected parent's past UTXO state
    pub accepted_diff: UtxoDiff,
    /// Accepted transaction IDs in consensus order
    pub accepted_ids: Vec<TransactionId>,
    /// Total fees paid by the accepted transactions
    pub total_fees: u64,
    /// The multiset of the full UTXO state after the acceptance
    pub multiset: Multiset,
}

/// The fully validated body context of a new block, ready for commit
pub(super) struct BodyContext {
    pub acceptance: AcceptanceResult,
    /// The diff from the current virtual UTXO to the selected parent's past state
    pub restore_diff: UtxoDiff,
}

impl ConsensusInner {
    /// Computes the diff transforming the current virtual UTXO set into the
    /// past UTXO state of `target` (the state right after applying `target`'s
    /// acceptance), by composing stored per-block diffs along the chain.
    pub(super) fn restore_utxo_diff(&self, target: Hash) -> UtxoDiff {
        if !self.virtual_state_store.is_initialized().unwrap() {
            return UtxoDiff::default();
        }
        let virtual_state = self.virtual_state();
        // Unwind the virtual's own acceptance diff
        let mut diff = virtual_state.utxo_diff.reversed();
        // Unwind chain blocks down to a chain ancestor of the target
        let mut current = virtual_state.selected_parent();
        while !reachability::is_chain_ancestor_of(&self.reachability_store, current, target).unwrap() {
            diff.with_diff_in_place(&self.utxo_diffs_store.get(current).unwrap().reversed()).unwrap();
            current = self.ghostdag_store.get_selected_parent(current).unwrap();
        }
        // Replay chain blocks up from the ancestor to the target
        let mut ascending = Vec::new();
        let mut cursor = target;
        while cursor != current {
            ascending.push(cursor);
            cursor = self.ghostdag_store.get_selected_parent(cursor).unwrap();
        }
        for block in ascending.into_iter().rev() {
            diff.with_diff_in_place(&self.utxo_diffs_store.get(block).unwrap()).unwrap();
        }
        diff
    }

    /// Simulates the acceptance step of a block with the given GHOSTDAG data:
    /// applies the mergeset transactions onto the selected parent's past UTXO
    /// in consensus order, skipping transactions which fail contextually
    /// (the red-blue merge step).
    pub(super) fn compute_acceptance_data(
        &self,
        ghostdag_data: &GhostdagData,
        restore_diff: &UtxoDiff,
        pov_past_median_time: u64,
    ) -> BlockProcessResult<AcceptanceResult> {
        let pov_blue_score = ghostdag_data.blue_score;

        // All mergeset bodies must be available; missing ones are reported as
        // retryable so the caller can request them
        let missing: Vec<Hash> = ghostdag_data
            .consensus_ordered_mergeset()
            .filter(|hash| !self.block_transactions_store.has(*hash).unwrap())
            .collect();
        if !missing.is_empty() {
            return Err(RuleError::MissingParents(missing));
        }

        let mut accepted_diff = UtxoDiff::default();
        let mut accepted_ids = Vec::new();
        let mut total_fees: u64 = 0;

        for merged_block in ghostdag_data.consensus_ordered_mergeset() {
            let transactions = self.block_transactions_store.get(merged_block).unwrap();
            for tx in transactions.iter() {
                if tx.is_coinbase() {
                    // Mergeset coinbases are accepted unconditionally; their
                    // amounts were validated when their block was inserted
                    let validated = ValidatedTransaction::new_coinbase(tx);
                    accepted_diff.add_transaction(&validated, pov_blue_score).unwrap();
                    accepted_ids.push(tx.id());
                    continue;
                }
                // Populate the tx inputs against the evolving acceptance view
                let view = compose_one_diff_layer(
                    compose_one_diff_layer(&self.virtual_utxo_store, restore_diff),
                    &accepted_diff,
                );
                let Some(entries) = tx.inputs.iter().map(|input| view.get(&input.previous_outpoint)).collect::<Option<Vec<_>>>()
                else {
                    // A missing outpoint means the tx conflicts with an already
                    // accepted one; it stays unaccepted
                    continue;
                };
                let populated = norn_consensus_core::tx::PopulatedTransaction::new(tx, entries);
                match self.transaction_validator.validate_populated_transaction_and_get_fee(&populated, pov_blue_score, pov_past_median_time)
                {
                    Ok(fee) => {
                        accepted_diff.add_transaction(&populated, pov_blue_score).unwrap();
                        accepted_ids.push(tx.id());
                        total_fees += fee;
                    }
                    Err(_) => continue,
                }
            }
        }

        // The multiset after this block: the selected parent's multiset with
        // the acceptance diff folded in
        let mut multiset = if ghostdag_data.selected_parent == self.genesis_hash || !self.virtual_state_store.is_initialized().unwrap() {
            self.utxo_multisets_store.get(self.genesis_hash).unwrap_or_default()
        } else {
            self.utxo_multisets_store.get(ghostdag_data.selected_parent).unwrap()
        };
        for (outpoint, entry) in accepted_diff.remove.iter() {
            multiset.remove_element(&serialize_utxo(outpoint, entry));
        }
        for (outpoint, entry) in accepted_diff.add.iter() {
            multiset.add_element(&serialize_utxo(outpoint, entry));
        }

        Ok(AcceptanceResult { accepted_diff, accepted_ids, total_fees, multiset })
    }

    /// Validates the block body against its computed DAG context, including
    /// the commitments which bind the header to the acceptance outcome
    pub(super) fn validate_block_body(
        &self,
        block: &Block,
        ghostdag_data: &GhostdagData,
        past_median_time: u64,
    ) -> BlockProcessResult<BodyContext> {
        let header = &block.header;
        let transactions = &block.transactions;

        if transactions.is_empty() {
            return Err(RuleError::FirstTxNotCoinbase);
        }
        if !transactions[0].is_coinbase() {
            return Err(RuleError::FirstTxNotCoinbase);
        }
        if let Some(index) = transactions.iter().skip(1).position(|tx| tx.is_coinbase()) {
            return Err(RuleError::MultipleCoinbases(index + 1));
        }

        let merkle_root = calc_merkle_root(transactions.iter().map(|tx| tx.hash()));
        if merkle_root != header.hash_merkle_root {
            return Err(RuleError::BadMerkleRoot(header.hash_merkle_root, merkle_root));
        }

        // Uniqueness and intra-block double spends
        let mut ids = HashSet::with_capacity(transactions.len());
        let mut spent_outpoints = HashSet::new();
        for tx in transactions.iter() {
            if !ids.insert(tx.id()) {
                return Err(RuleError::DuplicateTransactions(tx.id()));
            }
            for input in tx.inputs.iter() {
                if !spent_outpoints.insert(input.previous_outpoint) {
                    return Err(RuleError::DoubleSpendInSameBlock(input.previous_outpoint));
                }
            }
        }

        // Per-transaction stateless validation plus block limits
        let mut total_mass: u64 = 0;
        for tx in transactions.iter() {
            self.transaction_validator
                .validate_tx_in_isolation(tx)
                .map_err(|err| RuleError::TxInContextFailed(tx.id(), err))?;
            self.check_subnetwork_gas(tx).map_err(|err| RuleError::TxInContextFailed(tx.id(), err))?;
            total_mass += self.transaction_validator.calc_tx_mass(tx);
        }
        if total_mass > self.config.params.max_block_mass {
            return Err(RuleError::ExceedsMassLimit(total_mass, self.config.params.max_block_mass));
        }

        // Coinbase payload must declare the block's blue score and exact reward
        let coinbase_data = self.coinbase_manager.deserialize_coinbase_payload(&transactions[0])?;
        if coinbase_data.blue_score != ghostdag_data.blue_score {
            return Err(RuleError::BadCoinbaseBlueScore(coinbase_data.blue_score, ghostdag_data.blue_score));
        }

        // Acceptance simulation over the selected parent's past UTXO
        let restore_diff = self.restore_utxo_diff(ghostdag_data.selected_parent);
        let acceptance = self.compute_acceptance_data(ghostdag_data, &restore_diff, past_median_time)?;

        let accepted_root = calc_merkle_root(acceptance.accepted_ids.iter().copied());
        if accepted_root != header.accepted_id_merkle_root {
            return Err(RuleError::BadAcceptedIDMerkleRoot(header.accepted_id_merkle_root, accepted_root));
        }

        let commitment = acceptance.multiset.finalize();
        if commitment != header.utxo_commitment {
            return Err(RuleError::InvalidUTXOCommitment(header.utxo_commitment, commitment));
        }

        let expected_reward = self.coinbase_manager.calc_block_subsidy(ghostdag_data.blue_score) + acceptance.total_fees;
        let coinbase_paid: u64 = transactions[0].outputs.iter().map(|output| output.value).sum();
        if coinbase_paid != expected_reward {
            return Err(RuleError::BadCoinbaseAmount(coinbase_paid, expected_reward));
        }

        // The block's own transactions must be contextually valid against its
        // past UTXO (after acceptance). Their effects apply only once a future
        // block accepts them.
        let view = compose_one_diff_layer(compose_one_diff_layer(&self.virtual_utxo_store, &restore_diff), &acceptance.accepted_diff);
        for tx in transactions.iter().skip(1) {
            let entries = tx
                .inputs
                .iter()
                .map(|input| view.get(&input.previous_outpoint))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    RuleError::TxInContextFailed(tx.id(), TxRuleError::MissingTxOutpoints(tx.inputs[0].previous_outpoint))
                })?;
            let populated = norn_consensus_core::tx::PopulatedTransaction::new(tx, entries);
            self.transaction_validator
                .validate_populated_transaction_and_get_fee(&populated, ghostdag_data.blue_score, past_median_time)
                .map_err(|err| RuleError::TxInContextFailed(tx.id(), err))?;
        }

        Ok(BodyContext { acceptance, restore_diff })
    }

    fn check_subnetwork_gas(&self, tx: &Transaction) -> TxResult<()> {
        if tx.subnetwork_id.is_builtin_or_native() {
            return Ok(());
        }
        match self.subnetworks_store.get(tx.subnetwork_id) {
            Ok(data) => {
                if tx.gas > data.gas_limit {
                    Err(TxRuleError::GasExceedsSubnetworkLimit(tx.gas, data.gas_limit))
                } else {
                    Ok(())
                }
            }
            Err(_) => Err(TxRuleError::UnknownSubnetwork(tx.subnetwork_id)),
        }
    }

    /// Commits a fully validated block and (optionally) advances the virtual.
    /// This phase must not fail: storage errors at this point are fatal.
    pub(super) fn commit_block(
        &mut self,
        block: &Block,
        ghostdag_data: &GhostdagData,
        body_context: BodyContext,
        status: BlockStatus,
        update_virtual: bool,
    ) -> (BlockInsertionResult, Vec<Notification>) {
        let hash = block.hash();
        let mut batch = WriteBatch::default();
        let ghostdag_data = Arc::new(ghostdag_data.clone());

        self.headers_store.insert(BatchDbWriter::new(&mut batch), hash, block.header.clone()).unwrap();
        self.relations_store
            .insert(BatchDbWriter::new(&mut batch), hash, Arc::new(block.header.parents.clone()))
            .unwrap();
        self.ghostdag_store.insert(BatchDbWriter::new(&mut batch), hash, ghostdag_data.clone()).unwrap();
        self.block_transactions_store.insert(BatchDbWriter::new(&mut batch), hash, block.transactions.clone()).unwrap();
        self.acceptance_data_store
            .insert(BatchDbWriter::new(&mut batch), hash, Arc::new(body_context.acceptance.accepted_ids.clone()))
            .unwrap();
        self.utxo_diffs_store
            .insert(BatchDbWriter::new(&mut batch), hash, Arc::new(body_context.acceptance.accepted_diff.clone()))
            .unwrap();
        self.utxo_multisets_store.insert(BatchDbWriter::new(&mut batch), hash, body_context.acceptance.multiset.clone()).unwrap();
        self.statuses_store.set(BatchDbWriter::new(&mut batch), hash, status).unwrap();

        // Reachability is staged and committed within the same write batch
        let mut staging = StagingReachabilityStore::new(&self.reachability_store);
        reachability::add_block(
            &mut staging,
            hash,
            ghostdag_data.selected_parent,
            &mut ghostdag_data.unordered_mergeset_without_selected_parent(),
        )
        .unwrap();
        staging.commit(&mut batch).unwrap();

        // Register subnetworks introduced by accepted registry transactions
        let accepted_set: HashSet<TransactionId> = body_context.acceptance.accepted_ids.iter().copied().collect();
        for merged_block in ghostdag_data.consensus_ordered_mergeset() {
            for tx in self.block_transactions_store.get(merged_block).unwrap().iter() {
                if tx.subnetwork_id == SUBNETWORK_ID_REGISTRY && accepted_set.contains(&tx.id()) && tx.payload.len() >= 8 {
                    let gas_limit = u64::from_le_bytes(tx.payload[..8].try_into().unwrap());
                    let gas_limit = gas_limit.min(self.config.params.max_subnetwork_gas_limit);
                    let id = norn_consensus_core::subnets::SubnetworkId::from_bytes(
                        tx.payload.get(8..28).and_then(|slice| slice.try_into().ok()).unwrap_or_default(),
                    );
                    self.subnetworks_store.insert(BatchDbWriter::new(&mut batch), id, SubnetworkData { gas_limit }).unwrap();
                }
            }
        }

        if self.ghostdag_store.get_blue_work(self.headers_selected_tip).unwrap() < ghostdag_data.blue_work {
            self.headers_selected_tip = hash;
        }

        let mut notifications = vec![Notification::BlockAdded(BlockAddedNotification { block: block.clone() })];
        let mut result = BlockInsertionResult::default();

        if update_virtual {
            let old_virtual_state = self.virtual_state();
            let new_tips = self.tips_store.add_tip(BatchDbWriter::new(&mut batch), hash, &block.header.parents).unwrap();
            let (new_virtual_state, cumulative_diff) =
                self.compute_virtual_state(&new_tips).expect("committed blocks imply a consistent virtual state");

            let chain_path = self.chain_path(old_virtual_state.selected_parent(), new_virtual_state.selected_parent());
            self.virtual_utxo_store.write_diff(BatchDbWriter::new(&mut batch), &cumulative_diff).unwrap();
            self.virtual_state_store.set(BatchDbWriter::new(&mut batch), Arc::new(new_virtual_state)).unwrap();

            if !chain_path.is_empty() {
                let accepted_transaction_ids: Vec<TransactionId> = chain_path
                    .added
                    .iter()
                    .flat_map(|chain_block| self.acceptance_data_store.get(*chain_block).unwrap().iter().copied().collect::<Vec<_>>())
                    .collect();
                notifications.push(Notification::ChainChanged(ChainChangedNotification {
                    removed_chain_block_hashes: Arc::new(chain_path.removed.clone()),
                    added_chain_block_hashes: Arc::new(chain_path.added.clone()),
                    accepted_transaction_ids: Arc::new(accepted_transaction_ids.clone()),
                }));
                result = BlockInsertionResult { chain_path, accepted_transaction_ids };
            }
        }

        self.db.write(batch).unwrap();
        (result, notifications)
    }

    /// Computes the state of the virtual block over the given parents (the
    /// current tips). Also returns the cumulative diff from the current virtual
    /// UTXO set to the new one.
    pub(super) fn compute_virtual_state(&self, parents: &[Hash]) -> BlockProcessResult<(VirtualState, UtxoDiff)> {
        let ghostdag_data = self.ghostdag_manager.ghostdag(
            &self.ghostdag_store,
            &self.relations_store,
            &self.reachability_store,
            &self.headers_store,
            parents,
        );
        let restore_diff = self.restore_utxo_diff(ghostdag_data.selected_parent);
        let past_median_time = self.past_median_time(ghostdag_data.selected_parent);
        let acceptance = self.compute_acceptance_data(&ghostdag_data, &restore_diff, past_median_time)?;
        let bits = self.expected_difficulty_bits(ghostdag_data.selected_parent);
        let cumulative_diff =
            restore_diff.with_diff(&acceptance.accepted_diff).expect("the acceptance diff extends the restore diff");
        let state = VirtualState {
            parents: parents.to_vec(),
            ghostdag_data,
            bits,
            past_median_time,
            utxo_diff: acceptance.accepted_diff,
            accepted_tx_ids: acceptance.accepted_ids,
            accepted_fees: acceptance.total_fees,
            multiset: acceptance.multiset,
        };
        Ok((state, cumulative_diff))
    }

    /// Builds a block template over the current virtual state
    pub(super) fn build_block_template(&self, miner_data: MinerData, txs: Vec<Transaction>) -> ConsensusResult<BlockTemplate> {
        let virtual_state = self.virtual_state();
        let coinbase = self
            .coinbase_manager
            .build_coinbase_transaction(virtual_state.blue_score(), virtual_state.accepted_fees, miner_data.clone())
            .map_err(|_| ConsensusError::General("failed building a coinbase transaction"))?;

        let mut transactions = vec![coinbase];
        transactions.extend(txs);

        let hash_merkle_root = calc_merkle_root(transactions.iter().map(|tx| tx.hash()));
        let accepted_id_merkle_root = calc_merkle_root(virtual_state.accepted_tx_ids.iter().copied());
        let utxo_commitment = virtual_state.multiset.finalize();
        let selected_parent_timestamp = self.headers_store.get_timestamp(virtual_state.selected_parent()).unwrap();
        let selected_parent_blue_score = self.ghostdag_store.get_blue_score(virtual_state.selected_parent()).unwrap();

        let header = norn_consensus_core::header::Header::new(
            norn_consensus_core::constants::BLOCK_VERSION,
            virtual_state.parents.clone(),
            hash_merkle_root,
            accepted_id_merkle_root,
            utxo_commitment,
            unix_now().max(virtual_state.past_median_time + 1),
            virtual_state.bits,
            0,
        );
        Ok(BlockTemplate {
            block: Block::new(header, transactions),
            miner_data,
            selected_parent_timestamp,
            selected_parent_blue_score,
        })
    }

    /// Populates a mempool transaction from the virtual UTXO set and validates
    /// it from the virtual's point of view
    pub(super) fn validate_mempool_transaction_and_populate(&self, mutable_tx: &mut MutableTransaction) -> TxResult<()> {
        self.transaction_validator.validate_tx_in_isolation(&mutable_tx.tx)?;
        self.check_subnetwork_gas(&mutable_tx.tx)?;

        let virtual_state = self.virtual_state();
        let mut missing = None;
        for (index, input) in mutable_tx.tx.inputs.iter().enumerate() {
            if mutable_tx.entries[index].is_some() {
                continue;
            }
            match UtxoView::get(&self.virtual_utxo_store, &input.previous_outpoint) {
                Some(entry) => mutable_tx.entries[index] = Some(entry),
                None => missing = Some(input.previous_outpoint),
            }
        }
        if let Some(outpoint) = missing {
            return Err(TxRuleError::MissingTxOutpoints(outpoint));
        }

        // Validate from the point of view of the next virtual block
        let fee = self.transaction_validator.validate_populated_transaction_and_get_fee(
            &mutable_tx.as_verifiable(),
            virtual_state.blue_score() + 1,
            virtual_state.past_median_time,
        )?;
        mutable_tx.calculated_fee = Some(fee);
        mutable_tx.calculated_mass = Some(self.transaction_validator.calc_tx_mass(&mutable_tx.tx));
        Ok(())
    }

    /// Inserts a block from a pruning point anticone, trusting the externally
    /// provided GHOSTDAG metadata instead of computing it locally
    pub(super) fn validate_and_insert_trusted_block(
        &mut self,
        block: Block,
        blue_score: u64,
        blue_work: BlueWorkType,
        multiset: Multiset,
    ) -> BlockProcessResult<()> {
        use crate::model::stores::ghostdag::HashKTypeMap;
        use norn_consensus_core::blockhash::ORIGIN;
        use norn_consensus_core::BlockHashMap;

        let hash = block.hash();
        if self.status_option(hash).is_some() {
            return Err(RuleError::DuplicateBlock);
        }
        self.check_proof_of_work(block.header.hash, block.header.bits)?;

        // Anchor the block to its highest known parent, or to the origin when
        // its entire past lies beyond the imported horizon
        let known_parents: Vec<Hash> =
            block.header.parents.iter().copied().filter(|parent| self.status_option(*parent).is_some()).collect();
        let tree_parent = known_parents
            .iter()
            .copied()
            .max_by_key(|parent| self.ghostdag_store.get_blue_work(*parent).unwrap())
            .unwrap_or(ORIGIN);

        let mut batch = WriteBatch::default();
        let relation_parents = if known_parents.is_empty() { vec![ORIGIN] } else { known_parents };
        self.headers_store.insert(BatchDbWriter::new(&mut batch), hash, block.header.clone()).unwrap();
        self.relations_store.insert(BatchDbWriter::new(&mut batch), hash, Arc::new(relation_parents)).unwrap();
        self.block_transactions_store.insert(BatchDbWriter::new(&mut batch), hash, block.transactions.clone()).unwrap();
        self.statuses_store.set(BatchDbWriter::new(&mut batch), hash, BlockStatus::StatusUTXOPendingVerification).unwrap();
        // The declared multiset anchors future blocks built over this one; the
        // acceptance diff itself is unknown beyond the imported horizon
        self.utxo_multisets_store.insert(BatchDbWriter::new(&mut batch), hash, multiset).unwrap();
        self.utxo_diffs_store.insert(BatchDbWriter::new(&mut batch), hash, Arc::new(UtxoDiff::default())).unwrap();

        let ghostdag_data = GhostdagData::new(
            blue_score,
            blue_work,
            tree_parent,
            Default::default(),
            Default::default(),
            HashKTypeMap::new(BlockHashMap::new()),
        );
        self.ghostdag_store.insert(BatchDbWriter::new(&mut batch), hash, Arc::new(ghostdag_data)).unwrap();

        let mut staging = StagingReachabilityStore::new(&self.reachability_store);
        reachability::add_block(&mut staging, hash, tree_parent, &mut std::iter::empty()).unwrap();
        staging.commit(&mut batch).unwrap();

        if self.ghostdag_store.get_blue_work(self.headers_selected_tip).unwrap() < blue_work {
            self.headers_selected_tip = hash;
        }
        self.db.write(batch).unwrap();
        Ok(())
    }

    pub(super) fn validate_and_insert_imported_pruning_point(&mut self, new_pruning_point: Hash) -> PruningImportResult<()> {
        let Some(status) = self.status_option(new_pruning_point) else {
            return Err(PruningImportError::PruningValidationError(new_pruning_point));
        };
        if !status.has_block_header() {
            return Err(PruningImportError::PruningValidationError(new_pruning_point));
        }
        // A pruning point override must represent more accumulated work than
        // the locally known selected chain
        let virtual_state = self.virtual_state();
        let pruning_blue_work = self.ghostdag_store.get_blue_work(new_pruning_point).unwrap();
        let local_blue_work = self.ghostdag_store.get_blue_work(virtual_state.selected_parent()).unwrap();
        if pruning_blue_work <= local_blue_work && virtual_state.selected_parent() != self.genesis_hash {
            return Err(PruningImportError::PruningImportFinalityViolation(new_pruning_point));
        }
        self.pending_pruning_point = Some(new_pruning_point);
        Ok(())
    }

    pub(super) fn import_pruning_point_utxo_set(
        &mut self,
        new_pruning_point: Hash,
        imported_utxo_multiset: &mut Multiset,
    ) -> PruningImportResult<()> {
        if self.pending_pruning_point != Some(new_pruning_point) {
            return Err(PruningImportError::NoImportInProgress);
        }
        let header = self
            .headers_store
            .get_header(new_pruning_point)
            .map_err(|_| PruningImportError::PruningValidationError(new_pruning_point))?;
        let commitment = imported_utxo_multiset.finalize();
        if commitment != header.utxo_commitment {
            self.pending_pruning_point = None;
            return Err(PruningImportError::ImportedMultisetHashMismatch(commitment, header.utxo_commitment));
        }

        // Swap the virtual UTXO set with the imported one
        self.virtual_utxo_store.clear().unwrap();
        let writer = DirectDbWriter::new(self.db.clone());
        let imported: Vec<(TransactionOutpoint, UtxoEntry)> = self.imported_utxo_store.iter_from(None, usize::MAX);
        self.virtual_utxo_store.write_many(writer, &imported).unwrap();

        let mut batch = WriteBatch::default();
        let pruning_gd = self.ghostdag_store.get_data(new_pruning_point).unwrap();

        // Anchor the virtual on the pruning point: the imported set already
        // reflects the pruning point's acceptance state per its commitment
        let mut virtual_gd = GhostdagData::new_with_selected_parent(new_pruning_point, self.ghostdag_manager.k);
        virtual_gd.finalize_score_and_work(pruning_gd.blue_score + 1, pruning_gd.blue_work);
        let virtual_state = VirtualState {
            parents: vec![new_pruning_point],
            ghostdag_data: virtual_gd,
            bits: header.bits,
            past_median_time: header.timestamp,
            utxo_diff: UtxoDiff::default(),
            accepted_tx_ids: Vec::new(),
            accepted_fees: 0,
            multiset: imported_utxo_multiset.clone(),
        };

        self.acceptance_data_store
            .insert(BatchDbWriter::new(&mut batch), new_pruning_point, Arc::new(Vec::new()))
            .unwrap();
        self.statuses_store.set(BatchDbWriter::new(&mut batch), new_pruning_point, BlockStatus::StatusUTXOValid).unwrap();
        self.pruning_store.set(BatchDbWriter::new(&mut batch), new_pruning_point).unwrap();
        self.tips_store.init(BatchDbWriter::new(&mut batch), new_pruning_point).unwrap();
        self.virtual_state_store.set(BatchDbWriter::new(&mut batch), Arc::new(virtual_state)).unwrap();
        self.db.write(batch).unwrap();

        self.pending_pruning_point = None;
        Ok(())
    }
}
