pub mod config;
pub mod errors;
pub mod model;

use config::Config;
use errors::{RuleError, RuleResult};
use indexmap::IndexMap;
use model::{MempoolTransaction, TransactionDescriptor};
use norn_consensus_core::{
    api::ConsensusApi,
    constants::UNACCEPTED_BLUE_SCORE,
    errors::tx::TxRuleError as ConsensusTxRuleError,
    tx::{MutableTransaction, Transaction, TransactionId, TransactionOutpoint, UtxoEntry},
    utxo::utxo_collection::UtxoCollection,
};
use norn_core::time::unix_now;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

// Standard pay-to-pubkey form markers, shared with the consensus script engine
const OP_DATA_32: u8 = 0x20;
const OP_CHECKSIG: u8 = 0xac;
const STANDARD_SCRIPT_PUBLIC_KEY_LEN: usize = 34;

/// The mempool: holds transactions valid against the virtual UTXO (`ready`),
/// transactions depending on other mempool transactions (`depends`), and
/// orphans with missing outpoints. All pools live behind a single mutex;
/// critical sections perform no I/O beyond consensus UTXO lookups.
pub struct Mempool {
    config: Config,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Transactions whose inputs are all found in the committed (virtual) UTXO set
    ready: IndexMap<TransactionId, MempoolTransaction>,
    /// Transactions with at least one input created by another mempool transaction
    depends: IndexMap<TransactionId, MempoolTransaction>,
    /// Transactions with at least one input unknown to both the committed UTXO
    /// and the mempool overlay
    orphans: IndexMap<TransactionId, MempoolTransaction>,
    /// Outputs created by `ready`/`depends` transactions and not yet spent within the mempool
    mempool_utxo: UtxoCollection,
    /// Outpoints spent by `ready`/`depends` transactions
    spent_outpoints: HashMap<TransactionOutpoint, TransactionId>,
    last_orphan_scan: u64,
}

impl Mempool {
    pub fn new(config: Config) -> Self {
        Self { config, inner: Mutex::new(Inner::default()) }
    }

    /// Validates a transaction against the mempool and consensus state and
    /// inserts it into the matching pool. Returns descriptors for the
    /// transaction itself plus any orphans the insertion redeemed. An accepted
    /// orphan yields an empty list.
    pub fn validate_and_insert_transaction(
        &self,
        consensus: &dyn ConsensusApi,
        transaction: Transaction,
        allow_orphan: bool,
    ) -> RuleResult<Vec<TransactionDescriptor>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = unix_now();
        self.expire_orphans_if_due(inner, now);

        let mtx = MutableTransaction::from_tx(transaction);
        let mut accepted = Vec::new();
        match self.insert_transaction(inner, consensus, mtx, allow_orphan, now)? {
            Some(descriptor) => {
                let redeemer = descriptor.id();
                accepted.push(descriptor);
                accepted.extend(self.process_redeemed_orphans(inner, consensus, redeemer, now));
            }
            None => {
                // The transaction went into the orphan pool
            }
        }
        Ok(accepted)
    }

    /// Updates the mempool after a block was added to the DAG: removes the
    /// block's transactions, drops pool transactions double-spending against
    /// it, and attempts to accept orphans the block may have fulfilled.
    /// Returns descriptors for promoted orphans.
    pub fn handle_new_block_transactions(
        &self,
        consensus: &dyn ConsensusApi,
        block_transactions: &[Transaction],
    ) -> RuleResult<Vec<TransactionDescriptor>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = unix_now();

        for tx in block_transactions.iter().filter(|tx| !tx.is_coinbase()) {
            self.remove_transaction(inner, tx.id());
            inner.orphans.shift_remove(&tx.id());
        }

        // Re-validate the remaining pool transactions; entries resolving
        // against the pre-block state or conflicting with the block are
        // dropped here. Chained transactions may need their parent re-inserted
        // first, hence the retry rounds.
        let mut pending: VecDeque<MempoolTransaction> =
            inner.ready.drain(..).chain(inner.depends.drain(..)).map(|(_, tx)| tx).collect();
        inner.mempool_utxo.clear();
        inner.spent_outpoints.clear();
        loop {
            let mut retry = VecDeque::new();
            let round_size = pending.len();
            while let Some(pool_tx) = pending.pop_front() {
                let mut mtx = pool_tx.mtx.clone();
                mtx.clear_entries();
                match self.insert_transaction(inner, consensus, mtx, false, pool_tx.added_at) {
                    Ok(_) => {}
                    Err(RuleError::RejectMissingOutpoints(_)) => retry.push_back(pool_tx),
                    Err(err) => log::debug!("dropping mempool transaction after block: {err}"),
                }
            }
            if retry.is_empty() || retry.len() == round_size {
                break;
            }
            pending = retry;
        }

        // The block may have landed parents of orphans
        let mut promoted = Vec::new();
        let orphan_ids: Vec<TransactionId> = inner.orphans.keys().copied().collect();
        for orphan_id in orphan_ids {
            let Some(orphan) = inner.orphans.shift_remove(&orphan_id) else { continue };
            let mut mtx = orphan.mtx;
            mtx.clear_entries();
            match self.insert_transaction(inner, consensus, mtx, true, orphan.added_at) {
                Ok(Some(descriptor)) => {
                    let redeemer = descriptor.id();
                    promoted.push(descriptor);
                    promoted.extend(self.process_redeemed_orphans(inner, consensus, redeemer, now));
                }
                Ok(None) => {}
                Err(err) => log::debug!("dropping orphan transaction after block: {err}"),
            }
        }

        self.expire_orphans_if_due(inner, now);
        Ok(promoted)
    }

    pub fn get_all_transactions(&self) -> Vec<TransactionDescriptor> {
        let inner = self.inner.lock();
        inner.ready.values().chain(inner.depends.values()).map(descriptor_of).collect()
    }

    /// Selects ready transactions for a block template, highest fee rate first,
    /// greedily packing up to `available_mass`
    pub fn block_candidate_transactions(&self, available_mass: u64) -> Vec<Arc<Transaction>> {
        let inner = self.inner.lock();
        let mut candidates: Vec<&MempoolTransaction> = inner.ready.values().collect();
        candidates.sort_by_key(|tx| std::cmp::Reverse(tx.mtx.calculated_fee_per_mass().unwrap_or_default()));
        let mut remaining = available_mass;
        let mut selected = Vec::new();
        for candidate in candidates {
            let mass = candidate.mtx.calculated_mass.unwrap_or_default();
            if mass <= remaining {
                remaining -= mass;
                selected.push(candidate.tx().clone());
            }
        }
        selected
    }

    pub fn has_transaction(&self, transaction_id: TransactionId, include_orphans: bool) -> bool {
        let inner = self.inner.lock();
        inner.ready.contains_key(&transaction_id)
            || inner.depends.contains_key(&transaction_id)
            || (include_orphans && inner.orphans.contains_key(&transaction_id))
    }

    /// Returns the mempool transaction already spending the given outpoint, if any
    pub fn check_spend(&self, outpoint: &TransactionOutpoint) -> Option<TransactionId> {
        self.inner.lock().spent_outpoints.get(outpoint).copied()
    }

    pub fn transaction_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.ready.len() + inner.depends.len()
    }

    pub fn orphan_count(&self) -> usize {
        self.inner.lock().orphans.len()
    }

    /// The full admission pipeline for a single transaction. Returns
    /// `Ok(None)` when the transaction was parked in the orphan pool.
    fn insert_transaction(
        &self,
        inner: &mut Inner,
        consensus: &dyn ConsensusApi,
        mut mtx: MutableTransaction,
        allow_orphan: bool,
        mut added_at: u64,
    ) -> RuleResult<Option<TransactionDescriptor>> {
        let id = mtx.id();

        if inner.ready.contains_key(&id) || inner.depends.contains_key(&id) {
            return Err(RuleError::RejectDuplicate(id));
        }
        if let Some(parked) = inner.orphans.get(&id) {
            // An already-orphaned id is a rejection only for callers which do
            // not tolerate orphans; otherwise the parked transaction is
            // re-evaluated since its parents may have arrived meanwhile. The
            // original insertion time is kept so resubmissions do not extend
            // the orphan TTL.
            if !allow_orphan {
                return Err(RuleError::RejectDuplicateOrphan(id));
            }
            added_at = parked.added_at;
            inner.orphans.shift_remove(&id);
        }

        // Double-spend detection against the mempool, then population from the
        // mempool UTXO overlay
        let mut depends_on_mempool = false;
        for (index, input) in mtx.tx.inputs.iter().enumerate() {
            if let Some(spender) = inner.spent_outpoints.get(&input.previous_outpoint) {
                return Err(RuleError::RejectDoubleSpend(input.previous_outpoint, *spender));
            }
            if let Some(entry) = inner.mempool_utxo.get(&input.previous_outpoint) {
                mtx.entries[index] = Some(entry.clone());
                depends_on_mempool = true;
            }
        }

        // Consensus-side population and validation against the virtual UTXO
        match consensus.validate_mempool_transaction_and_populate(&mut mtx) {
            Ok(()) => {}
            Err(ConsensusTxRuleError::MissingTxOutpoints(_)) => {
                return if allow_orphan {
                    self.insert_orphan(inner, consensus, mtx, added_at)?;
                    Ok(None)
                } else {
                    Err(RuleError::RejectMissingOutpoints(id))
                };
            }
            Err(err) => return Err(RuleError::RejectInvalid(err)),
        }

        if !self.config.accept_non_standard {
            self.check_transaction_standard(&mtx)?;
        }
        // The relay fee floor is not a standardness policy and applies regardless
        self.check_transaction_fee(&mtx)?;

        // Register the transaction in its pool and in the UTXO overlay
        let outputs_blue_score = UNACCEPTED_BLUE_SCORE;
        for input in mtx.tx.inputs.iter() {
            inner.spent_outpoints.insert(input.previous_outpoint, id);
            inner.mempool_utxo.remove(&input.previous_outpoint);
        }
        for (index, output) in mtx.tx.outputs.iter().enumerate() {
            inner.mempool_utxo.insert(
                TransactionOutpoint::new(id, index as u32),
                UtxoEntry::new(output.value, output.script_public_key.clone(), outputs_blue_score, false),
            );
        }

        let pool_tx = MempoolTransaction::new(mtx, added_at);
        let descriptor = descriptor_of(&pool_tx);
        if depends_on_mempool {
            inner.depends.insert(id, pool_tx);
        } else {
            inner.ready.insert(id, pool_tx);
        }
        Ok(Some(descriptor))
    }

    fn insert_orphan(
        &self,
        inner: &mut Inner,
        consensus: &dyn ConsensusApi,
        mtx: MutableTransaction,
        added_at: u64,
    ) -> RuleResult<()> {
        let id = mtx.id();
        let mass = consensus.calculate_transaction_mass(&mtx.tx);
        if mass > self.config.maximum_orphan_transaction_mass {
            return Err(RuleError::RejectOrphanTooLarge(id, mass, self.config.maximum_orphan_transaction_mass));
        }
        // Random eviction bounds the pool against orphan flooding
        while inner.orphans.len() >= self.config.maximum_orphan_transaction_count {
            let victim = rand::thread_rng().gen_range(0..inner.orphans.len());
            let (victim_id, _) = inner.orphans.swap_remove_index(victim).unwrap();
            log::debug!("orphan pool is full, evicted {victim_id}");
        }
        inner.orphans.insert(id, MempoolTransaction::new(mtx, added_at));
        Ok(())
    }

    /// Recursively accepts orphans which spend outputs of the newly accepted
    /// transaction; orphans turning out invalid are discarded
    fn process_redeemed_orphans(
        &self,
        inner: &mut Inner,
        consensus: &dyn ConsensusApi,
        redeemer: TransactionId,
        now: u64,
    ) -> Vec<TransactionDescriptor> {
        let mut accepted = Vec::new();
        let mut queue = VecDeque::from([redeemer]);
        while let Some(parent_id) = queue.pop_front() {
            let dependent_ids: Vec<TransactionId> = inner
                .orphans
                .iter()
                .filter(|(_, orphan)| orphan.mtx.has_parent(parent_id))
                .map(|(id, _)| *id)
                .collect();
            for orphan_id in dependent_ids {
                let Some(orphan) = inner.orphans.shift_remove(&orphan_id) else { continue };
                let mut mtx = orphan.mtx;
                mtx.clear_entries();
                match self.insert_transaction(inner, consensus, mtx, true, now) {
                    Ok(Some(descriptor)) => {
                        queue.push_back(descriptor.id());
                        accepted.push(descriptor);
                    }
                    Ok(None) => {} // Still an orphan: requeued internally
                    Err(err) => log::debug!("discarded redeemed orphan {orphan_id}: {err}"),
                }
            }
        }
        accepted
    }

    fn check_transaction_standard(&self, mtx: &MutableTransaction) -> RuleResult<()> {
        for (index, output) in mtx.tx.outputs.iter().enumerate() {
            let script = &output.script_public_key;
            if script.len() != STANDARD_SCRIPT_PUBLIC_KEY_LEN || script[0] != OP_DATA_32 || script[script.len() - 1] != OP_CHECKSIG {
                return Err(RuleError::RejectNonstandard(index));
            }
            if output.value < self.config.dust_threshold {
                return Err(RuleError::RejectDust(index, output.value));
            }
        }
        Ok(())
    }

    /// The minimum relay fee check; unlike standardness it is never waived
    fn check_transaction_fee(&self, mtx: &MutableTransaction) -> RuleResult<()> {
        let fee = mtx.calculated_fee.expect("fee is populated by consensus validation");
        let mass = mtx.calculated_mass.expect("mass is populated by consensus validation");
        let minimum_fee = self.config.minimum_relay_transaction_fee * mass / 1000;
        if fee == 0 || fee < minimum_fee {
            return Err(RuleError::RejectInsufficientFee(fee, minimum_fee));
        }
        Ok(())
    }

    /// Removes a transaction from the ready/depends pools together with its
    /// overlay footprint
    fn remove_transaction(&self, inner: &mut Inner, id: TransactionId) {
        let Some(removed) = inner.ready.shift_remove(&id).or_else(|| inner.depends.shift_remove(&id)) else {
            return;
        };
        for input in removed.tx().inputs.iter() {
            if inner.spent_outpoints.get(&input.previous_outpoint) == Some(&id) {
                inner.spent_outpoints.remove(&input.previous_outpoint);
            }
        }
        for index in 0..removed.tx().outputs.len() {
            inner.mempool_utxo.remove(&TransactionOutpoint::new(id, index as u32));
        }
    }

    /// Scans for expired orphans at most once per scan interval
    fn expire_orphans_if_due(&self, inner: &mut Inner, now: u64) {
        if now < inner.last_orphan_scan + self.config.orphan_expire_scan_interval_milliseconds {
            return;
        }
        inner.last_orphan_scan = now;
        let ttl = self.config.orphan_expire_milliseconds;
        inner.orphans.retain(|id, orphan| {
            let keep = orphan.added_at + ttl > now;
            if !keep {
                log::debug!("expired orphan transaction {id}");
            }
            keep
        });
    }
}

fn descriptor_of(pool_tx: &MempoolTransaction) -> TransactionDescriptor {
    TransactionDescriptor {
        transaction: pool_tx.tx().clone(),
        fee: pool_tx.mtx.calculated_fee.unwrap_or_default(),
        mass: pool_tx.mtx.calculated_mass.unwrap_or_default(),
        fee_per_mass: pool_tx.mtx.calculated_fee_per_mass().unwrap_or_default(),
    }
}
