pub mod test_consensus;
mod virtual_processor;

use crate::constants::{perf, SIG_CACHE_SIZE};
use crate::model::stores::{
    acceptance_data::{AcceptanceDataStore, DbAcceptanceDataStore},
    block_transactions::{BlockTransactionsStore, BlockTransactionsStoreReader, DbBlockTransactionsStore},
    ghostdag::{DbGhostdagStore, GhostdagStore, GhostdagStoreReader},
    headers::{DbHeaderStore, HeaderStore, HeaderStoreReader},
    pruning::{DbPruningStore, PruningStore, PruningStoreReader},
    reachability::DbReachabilityStore,
    relations::{DbRelationsStore, RelationsStore, RelationsStoreReader},
    statuses::{DbStatusesStore, StatusesStore, StatusesStoreReader},
    subnetworks::DbSubnetworksStore,
    tips::{DbTipsStore, TipsStore},
    utxo_diffs::{DbUtxoDiffsStore, UtxoDiffsStore},
    utxo_multisets::{DbUtxoMultisetsStore, UtxoMultisetsStore},
    utxo_set::{DbUtxoSetStore, UtxoSetStore, UtxoSetStoreReader, VIRTUAL_UTXO_SET_PREFIX},
    virtual_state::{DbVirtualStateStore, VirtualState, VirtualStateStore, VirtualStateStoreReader},
    DB,
};
use crate::processes::{
    coinbase::CoinbaseManager,
    difficulty::{calc_work, DifficultyBlock, DifficultyManager},
    ghostdag::protocol::GhostdagManager,
    past_median_time::PastMedianTimeManager,
    reachability::inquirer as reachability,
    sync::create_block_locator,
    transaction_validator::TransactionValidator,
};
use norn_consensus_core::{
    api::ConsensusApi,
    block::{Block, BlockInfo, BlockInsertionResult, BlockTemplate},
    blockhash::ORIGIN,
    blockstatus::BlockStatus,
    coinbase::MinerData,
    config::Config,
    constants::{BLOCK_VERSION, MAX_BLOCK_PARENTS},
    errors::{
        block::{BlockProcessResult, RuleError},
        consensus::{ConsensusError, ConsensusResult},
        pruning::PruningImportResult,
        tx::TxResult,
    },
    notify::{Notification, PruningPointUtxoSetOverrideNotification},
    sync_info::{SyncInfo, SyncState},
    tx::{MutableTransaction, Transaction, TransactionOutpoint, UtxoEntry},
    utxo::utxo_diff::UtxoDiff,
    BlockHashSet, BlueWorkType, ChainPath,
};
use norn_core::time::unix_now;
use norn_hashes::Hash;
use norn_multiset::Multiset;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Number of locator hashes a single locator is limited to
const LOCATOR_LIMIT: usize = 64;

/// The consensus DAG engine. All state transitions happen under a single
/// writer lock (`inner`), while info queries share the read lock. Notifications
/// are dispatched strictly after the write lock is released.
pub struct Consensus {
    inner: RwLock<ConsensusInner>,
    notification_senders: Mutex<Vec<crossbeam_channel::Sender<Notification>>>,
    pub config: Arc<Config>,
}

pub(crate) struct ConsensusInner {
    pub(crate) db: Arc<DB>,
    pub(crate) config: Arc<Config>,

    // Stores
    pub(crate) statuses_store: DbStatusesStore,
    pub(crate) relations_store: DbRelationsStore,
    pub(crate) reachability_store: DbReachabilityStore,
    pub(crate) ghostdag_store: DbGhostdagStore,
    pub(crate) headers_store: DbHeaderStore,
    pub(crate) block_transactions_store: DbBlockTransactionsStore,
    pub(crate) tips_store: DbTipsStore,
    pub(crate) utxo_diffs_store: DbUtxoDiffsStore,
    pub(crate) utxo_multisets_store: DbUtxoMultisetsStore,
    pub(crate) acceptance_data_store: DbAcceptanceDataStore,
    pub(crate) subnetworks_store: DbSubnetworksStore,
    pub(crate) virtual_state_store: DbVirtualStateStore,
    pub(crate) virtual_utxo_store: DbUtxoSetStore,
    pub(crate) imported_utxo_store: DbUtxoSetStore,
    pub(crate) pruning_store: DbPruningStore,

    // Managers
    pub(crate) ghostdag_manager: GhostdagManager,
    pub(crate) difficulty_manager: DifficultyManager,
    pub(crate) past_median_time_manager: PastMedianTimeManager,
    pub(crate) coinbase_manager: CoinbaseManager,
    pub(crate) transaction_validator: TransactionValidator,

    pub(crate) genesis_hash: Hash,
    pub(crate) headers_selected_tip: Hash,
    /// A pruning point candidate going through the import protocol
    pub(crate) pending_pruning_point: Option<Hash>,
}

const IMPORTED_UTXO_SET_PREFIX: &[u8] = b"imported-utxo-set";

impl Consensus {
    pub fn new(db: Arc<DB>, config: Arc<Config>) -> Self {
        let params = &config.params;
        let genesis_block = params.genesis.build_block();
        let genesis_hash = genesis_block.hash();

        let mut inner = ConsensusInner {
            statuses_store: DbStatusesStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE),
            relations_store: DbRelationsStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE),
            reachability_store: DbReachabilityStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE),
            ghostdag_store: DbGhostdagStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE),
            headers_store: DbHeaderStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE),
            block_transactions_store: DbBlockTransactionsStore::new(db.clone()),
            tips_store: DbTipsStore::new(db.clone()),
            utxo_diffs_store: DbUtxoDiffsStore::new(db.clone()),
            utxo_multisets_store: DbUtxoMultisetsStore::new(db.clone()),
            acceptance_data_store: DbAcceptanceDataStore::new(db.clone()),
            subnetworks_store: DbSubnetworksStore::new(db.clone()),
            virtual_state_store: DbVirtualStateStore::new(db.clone()),
            virtual_utxo_store: DbUtxoSetStore::new(db.clone(), VIRTUAL_UTXO_SET_PREFIX),
            imported_utxo_store: DbUtxoSetStore::new(db.clone(), IMPORTED_UTXO_SET_PREFIX),
            pruning_store: DbPruningStore::new(db.clone()),
            ghostdag_manager: GhostdagManager::new(genesis_hash, params.ghostdag_k),
            difficulty_manager: DifficultyManager::new(
                params.difficulty_window_size,
                params.target_time_per_block,
                params.max_difficulty_target,
                params.genesis.bits,
            ),
            past_median_time_manager: PastMedianTimeManager::new(params.past_median_time_window_size(), params.genesis.timestamp),
            coinbase_manager: CoinbaseManager::new(params.base_subsidy, params.subsidy_halving_interval),
            transaction_validator: TransactionValidator::new(
                params.max_tx_mass,
                params.coinbase_maturity,
                params.mass_per_tx_byte,
                params.mass_per_script_pub_key_byte,
                params.mass_per_sig_op,
                SIG_CACHE_SIZE,
            ),
            genesis_hash,
            headers_selected_tip: genesis_hash,
            pending_pruning_point: None,
            db,
            config: config.clone(),
        };
        inner.init(genesis_block);
        inner.headers_selected_tip = inner.resolve_headers_selected_tip();

        Self { inner: RwLock::new(inner), notification_senders: Mutex::new(Vec::new()), config }
    }

    /// Registers a new notification listener. Events are dispatched in the
    /// order blocks were committed.
    pub fn register_notification_listener(&self) -> crossbeam_channel::Receiver<Notification> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.notification_senders.lock().push(sender);
        receiver
    }

    fn notify(&self, notification: Notification) {
        // Drop listeners whose receiving side was closed
        self.notification_senders.lock().retain(|sender| sender.send(notification.clone()).is_ok());
    }

    pub fn genesis_hash(&self) -> Hash {
        self.inner.read().genesis_hash
    }
}

impl ConsensusApi for Consensus {
    fn validate_and_insert_block(&self, block: Block) -> BlockProcessResult<BlockInsertionResult> {
        let (result, notifications) = self.inner.write().validate_and_insert_block(block)?;
        for notification in notifications {
            self.notify(notification);
        }
        Ok(result)
    }

    fn validate_and_insert_trusted_block(
        &self,
        block: Block,
        blue_score: u64,
        blue_work: BlueWorkType,
        multiset: Multiset,
    ) -> BlockProcessResult<()> {
        self.inner.write().validate_and_insert_trusted_block(block, blue_score, blue_work, multiset)
    }

    fn get_utxo_multiset(&self, hash: Hash) -> Option<Multiset> {
        use crate::model::stores::utxo_multisets::UtxoMultisetsStoreReader;
        self.inner.read().utxo_multisets_store.get(hash).ok()
    }

    fn build_block_template(&self, miner_data: MinerData, txs: Vec<Transaction>) -> ConsensusResult<BlockTemplate> {
        self.inner.read().build_block_template(miner_data, txs)
    }

    fn validate_mempool_transaction_and_populate(&self, transaction: &mut MutableTransaction) -> TxResult<()> {
        self.inner.read().validate_mempool_transaction_and_populate(transaction)
    }

    fn calculate_transaction_mass(&self, transaction: &Transaction) -> u64 {
        self.inner.read().transaction_validator.calc_tx_mass(transaction)
    }

    fn get_block(&self, hash: Hash) -> ConsensusResult<Block> {
        let inner = self.inner.read();
        let header = inner.headers_store.get_header(hash).map_err(|_| ConsensusError::BlockNotFound(hash))?;
        let transactions = inner.block_transactions_store.get(hash).map_err(|_| ConsensusError::BlockNotFound(hash))?;
        Ok(Block::from_arcs(header, transactions))
    }

    fn get_block_info(&self, hash: Hash) -> BlockInfo {
        let inner = self.inner.read();
        let Some(status) = inner.status_option(hash) else {
            return BlockInfo::missing();
        };
        let (blue_score, blue_work) = match inner.ghostdag_store.get_data(hash) {
            Ok(data) => (Some(data.blue_score), Some(data.blue_work)),
            Err(_) => (None, None),
        };
        BlockInfo { exists: true, status: Some(status), blue_score, blue_work }
    }

    fn get_virtual_selected_parent(&self) -> Hash {
        self.inner.read().virtual_state().selected_parent()
    }

    fn get_virtual_blue_score(&self) -> u64 {
        self.inner.read().virtual_state().blue_score()
    }

    fn get_virtual_past_median_time(&self) -> u64 {
        self.inner.read().virtual_state().past_median_time
    }

    fn get_virtual_parents(&self) -> BlockHashSet {
        self.inner.read().virtual_state().parents.iter().copied().collect()
    }

    fn get_headers_selected_tip(&self) -> Hash {
        self.inner.read().headers_selected_tip
    }

    fn get_sync_info(&self) -> SyncInfo {
        let inner = self.inner.read();
        let virtual_state = inner.virtual_state();
        let headers_tip_blue_score = inner.ghostdag_store.get_blue_score(inner.headers_selected_tip).unwrap_or_default();
        let state = if inner.pending_pruning_point.is_some() {
            SyncState::MissingUtxoSet
        } else if headers_tip_blue_score > virtual_state.blue_score() + inner.config.params.pruning_depth {
            SyncState::HeadersFirst
        } else {
            SyncState::Relay
        };
        SyncInfo { state, headers_selected_tip_blue_score: headers_tip_blue_score, virtual_blue_score: virtual_state.blue_score() }
    }

    fn is_nearly_synced(&self) -> bool {
        let inner = self.inner.read();
        let virtual_state = inner.virtual_state();
        let sink_timestamp = inner.headers_store.get_timestamp(virtual_state.selected_parent()).unwrap_or_default();
        // The template is usable if the selected tip is at most 5 minutes old
        sink_timestamp + 300_000 > unix_now()
    }

    fn block_exists(&self, hash: Hash) -> bool {
        self.inner.read().status_option(hash).is_some_and(|status| status.is_valid())
    }

    fn get_blue_work(&self, hash: Hash) -> ConsensusResult<BlueWorkType> {
        self.inner.read().ghostdag_store.get_blue_work(hash).map_err(|_| ConsensusError::BlockNotFound(hash))
    }

    fn create_block_locator_from_pruning_point(&self, high: Hash, limit: usize) -> ConsensusResult<Vec<Hash>> {
        let inner = self.inner.read();
        let low = inner.pruning_store.pruning_point().unwrap_or(inner.genesis_hash);
        if !inner.statuses_store.has(high).unwrap_or(false) {
            return Err(ConsensusError::BlockNotFound(high));
        }
        create_block_locator(&inner.ghostdag_store, low, high, limit.min(LOCATOR_LIMIT)).map_err(|_| ConsensusError::BlockNotFound(high))
    }

    fn find_highest_shared_block(&self, locator: &[Hash]) -> ConsensusResult<Hash> {
        let inner = self.inner.read();
        for hash in locator.iter() {
            if inner.status_option(*hash).is_some_and(|status| status.has_block_body()) {
                return Ok(*hash);
            }
        }
        Err(ConsensusError::General("no shared block with the provided locator"))
    }

    fn get_hashes_between(&self, low: Hash, high: Hash, max_blocks: usize) -> ConsensusResult<Vec<Hash>> {
        self.inner.read().get_hashes_between(low, high, max_blocks)
    }

    fn get_pruning_point(&self) -> Hash {
        let inner = self.inner.read();
        inner.pruning_store.pruning_point().unwrap_or(inner.genesis_hash)
    }

    fn get_pruning_point_anticone(&self) -> ConsensusResult<Vec<Hash>> {
        let inner = self.inner.read();
        let pruning_point = inner.pruning_store.pruning_point().unwrap_or(inner.genesis_hash);
        let virtual_state = inner.virtual_state();
        // All blocks which are not in the pruning point's past and not in its
        // future form its anticone; include the pruning point itself first
        let mut anticone = vec![pruning_point];
        for hash in inner.get_hashes_between(inner.genesis_hash, virtual_state.selected_parent(), usize::MAX)? {
            if hash == pruning_point {
                continue;
            }
            if !inner.is_dag_ancestor_of(hash, pruning_point) && !inner.is_dag_ancestor_of(pruning_point, hash) {
                anticone.push(hash);
            }
        }
        Ok(anticone)
    }

    fn get_virtual_utxos(&self, from_outpoint: Option<TransactionOutpoint>, chunk_size: usize) -> Vec<(TransactionOutpoint, UtxoEntry)> {
        self.inner.read().virtual_utxo_store.iter_from(from_outpoint, chunk_size)
    }

    fn is_valid_pruning_point(&self, hash: Hash) -> bool {
        self.inner.read().status_option(hash).is_some_and(|status| status.has_block_header())
    }

    fn append_imported_pruning_point_utxos(&self, utxoset_chunk: &[(TransactionOutpoint, UtxoEntry)], current_multiset: &mut Multiset) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let writer = norn_database::prelude::DirectDbWriter::new(inner.db.clone());
        inner.imported_utxo_store.write_many(writer, utxoset_chunk).unwrap();
        for (outpoint, entry) in utxoset_chunk {
            current_multiset.add_element(&virtual_processor::serialize_utxo(outpoint, entry));
        }
    }

    fn import_pruning_point_utxo_set(&self, new_pruning_point: Hash, imported_utxo_multiset: &mut Multiset) -> PruningImportResult<()> {
        let result = self.inner.write().import_pruning_point_utxo_set(new_pruning_point, imported_utxo_multiset);
        if result.is_ok() {
            self.notify(Notification::PruningPointUtxoSetOverride(PruningPointUtxoSetOverrideNotification {}));
        }
        result
    }

    fn validate_and_insert_imported_pruning_point(&self, new_pruning_point: Hash) -> PruningImportResult<()> {
        self.inner.write().validate_and_insert_imported_pruning_point(new_pruning_point)
    }
}

impl ConsensusInner {
    /// Performs one-time genesis initialization for an empty database
    fn init(&mut self, genesis_block: Block) {
        use norn_database::prelude::DirectDbWriter;

        if self.tips_store.is_initialized() {
            return;
        }
        let genesis_hash = genesis_block.hash();
        let writer = || DirectDbWriter::new(self.db.clone());

        reachability::init(&mut self.reachability_store).unwrap();
        self.relations_store.insert(writer(), ORIGIN, Default::default()).unwrap();
        self.relations_store.insert(writer(), genesis_hash, Arc::new(vec![ORIGIN])).unwrap();
        reachability::add_block(&mut self.reachability_store, genesis_hash, ORIGIN, &mut std::iter::empty()).unwrap();

        let mut genesis_gd = self.ghostdag_manager.genesis_ghostdag_data();
        genesis_gd.blue_work = calc_work(genesis_block.header.bits);
        let genesis_gd = Arc::new(genesis_gd);
        self.ghostdag_store.insert(writer(), genesis_hash, genesis_gd.clone()).unwrap();
        self.headers_store.insert(writer(), genesis_hash, genesis_block.header.clone()).unwrap();
        self.block_transactions_store.insert(writer(), genesis_hash, genesis_block.transactions.clone()).unwrap();
        self.statuses_store.set(writer(), genesis_hash, BlockStatus::StatusUTXOValid).unwrap();
        self.utxo_diffs_store.insert(writer(), genesis_hash, Arc::new(UtxoDiff::default())).unwrap();
        self.utxo_multisets_store.insert(writer(), genesis_hash, Multiset::new()).unwrap();
        self.acceptance_data_store
            .insert(writer(), genesis_hash, Arc::new(vec![genesis_block.coinbase_transaction().id()]))
            .unwrap();
        self.pruning_store.set(writer(), genesis_hash).unwrap();
        self.tips_store.init(writer(), genesis_hash).unwrap();

        let virtual_state = self.compute_virtual_state(&[genesis_hash]).expect("the empty DAG state is consistent");
        self.virtual_state_store.set(writer(), Arc::new(virtual_state)).unwrap();
    }

    pub(crate) fn virtual_state(&self) -> Arc<VirtualState> {
        self.virtual_state_store.get().unwrap()
    }

    pub(crate) fn status_option(&self, hash: Hash) -> Option<BlockStatus> {
        use norn_database::prelude::StoreResultExtensions;
        self.statuses_store.get(hash).unwrap_option()
    }

    fn resolve_headers_selected_tip(&self) -> Hash {
        // The virtual selected parent is always a valid headers tip fallback
        self.virtual_state().selected_parent()
    }

    pub(crate) fn is_dag_ancestor_of(&self, this: Hash, queried: Hash) -> bool {
        reachability::is_dag_ancestor_of(&self.reachability_store, this, queried).unwrap()
    }

    /// Full block validation and insertion; returns the insertion result
    /// together with the notifications to dispatch after lock release
    fn validate_and_insert_block(&mut self, block: Block) -> BlockProcessResult<(BlockInsertionResult, Vec<Notification>)> {
        let header = &block.header;
        let hash = header.hash;

        // ---- Isolation checks ----
        match self.status_option(hash) {
            Some(BlockStatus::StatusInvalid) => return Err(RuleError::KnownInvalid),
            Some(_) => return Err(RuleError::DuplicateBlock),
            None => {}
        }
        if header.version != BLOCK_VERSION {
            return Err(RuleError::WrongBlockVersion(header.version, BLOCK_VERSION));
        }
        if header.parents.is_empty() {
            return Err(RuleError::NoParents);
        }
        if header.parents.len() > MAX_BLOCK_PARENTS {
            return Err(RuleError::TooManyParents(header.parents.len(), MAX_BLOCK_PARENTS));
        }
        let max_allowed_time = unix_now() + self.config.params.timestamp_max_future_skew();
        if header.timestamp > max_allowed_time {
            return Err(RuleError::TimeTooFarIntoTheFuture(header.timestamp, max_allowed_time));
        }
        self.check_proof_of_work(header.hash, header.bits)?;

        // ---- Contextual checks ----
        let mut missing_parents = Vec::new();
        for parent in header.parents.iter() {
            match self.status_option(*parent) {
                None => missing_parents.push(*parent),
                Some(BlockStatus::StatusInvalid) => {
                    self.mark_invalid(hash);
                    return Err(RuleError::KnownInvalid);
                }
                Some(_) => {}
            }
        }
        if !missing_parents.is_empty() {
            return Err(RuleError::MissingParents(missing_parents));
        }

        let ghostdag_data = self.ghostdag_manager.ghostdag(
            &self.ghostdag_store,
            &self.relations_store,
            &self.reachability_store,
            &self.headers_store,
            &header.parents,
        );
        if ghostdag_data.mergeset_size() as u64 > self.config.params.mergeset_size_limit {
            return Err(RuleError::MergesetTooBig(ghostdag_data.mergeset_size() as u64, self.config.params.mergeset_size_limit));
        }

        let selected_parent = ghostdag_data.selected_parent;
        let expected_bits = self.expected_difficulty_bits(selected_parent);
        if header.bits != expected_bits {
            self.mark_invalid(hash);
            return Err(RuleError::UnexpectedDifficulty(header.bits, expected_bits));
        }
        let past_median_time = self.past_median_time(selected_parent);
        if header.timestamp <= past_median_time {
            self.mark_invalid(hash);
            return Err(RuleError::TimeTooOld(header.timestamp, past_median_time));
        }

        // ---- Body and UTXO context validation ----
        match self.validate_block_body(&block, &ghostdag_data, past_median_time) {
            Ok(body_context) => {
                // Finality: the selected chain must not reorg deeper than the finality depth
                let virtual_state = self.virtual_state();
                let chain_path = self.chain_path(virtual_state.selected_parent(), selected_parent);
                if chain_path.removed.len() as u64 > self.config.params.finality_depth {
                    self.commit_block(&block, &ghostdag_data, body_context, BlockStatus::StatusDisqualifiedFromChain, false);
                    return Err(RuleError::FinalityViolation);
                }
                let (result, notifications) = self.commit_block(&block, &ghostdag_data, body_context, BlockStatus::StatusUTXOValid, true);
                Ok((result, notifications))
            }
            Err(rule_error) => {
                // Missing data (e.g. absent mergeset bodies) is retryable and
                // must not permanently invalidate the block
                if !matches!(rule_error, RuleError::MissingParents(_)) {
                    self.mark_invalid(hash);
                }
                Err(rule_error)
            }
        }
    }

    fn check_proof_of_work(&self, hash: Hash, bits: u32) -> BlockProcessResult<()> {
        let Some(target) = norn_math::Uint256::from_compact_target_bits(bits) else {
            return Err(RuleError::InvalidPoW);
        };
        if target > self.config.params.max_difficulty_target {
            return Err(RuleError::InvalidPoW);
        }
        if norn_math::Uint256::from(hash) > target {
            return Err(RuleError::InvalidPoW);
        }
        Ok(())
    }

    fn mark_invalid(&mut self, hash: Hash) {
        use norn_database::prelude::DirectDbWriter;
        self.statuses_store.set(DirectDbWriter::new(self.db.clone()), hash, BlockStatus::StatusInvalid).unwrap();
    }

    /// Collects a difficulty/median-time window along the selected parent
    /// chain starting at `from` (inclusive), with each chain block's non-chain
    /// mergeset blues included
    pub(crate) fn window(&self, from: Hash, size: usize) -> Vec<(Hash, u64, u32)> {
        let mut window = Vec::with_capacity(size);
        let mut current = from;
        loop {
            let header = self.headers_store.get_header(current).unwrap();
            window.push((current, header.timestamp, header.bits));
            if window.len() == size || current == self.genesis_hash {
                break;
            }
            let data = self.ghostdag_store.get_data(current).unwrap();
            if data.selected_parent == ORIGIN {
                // Blocks imported past the pruning horizon have no further past
                break;
            }
            for hash in data.mergeset_blues.iter().skip(1) {
                if window.len() == size {
                    break;
                }
                let blue_header = self.headers_store.get_header(*hash).unwrap();
                window.push((*hash, blue_header.timestamp, blue_header.bits));
            }
            current = data.selected_parent;
        }
        window
    }

    pub(crate) fn expected_difficulty_bits(&self, selected_parent: Hash) -> u32 {
        let window = self.window(selected_parent, self.difficulty_manager.window_size());
        let samples: Vec<DifficultyBlock> =
            window.iter().map(|(_, timestamp, bits)| DifficultyBlock { timestamp: *timestamp, bits: *bits }).collect();
        self.difficulty_manager.calc_required_bits(&samples)
    }

    pub(crate) fn past_median_time(&self, selected_parent: Hash) -> u64 {
        let window = self.window(selected_parent, self.past_median_time_manager.window_size());
        self.past_median_time_manager.calc_past_median_time(window.into_iter().map(|(_, timestamp, _)| timestamp).collect())
    }

    /// Returns hashes in the future of `low` and past of `high` (inclusive),
    /// ordered topologically (ascending blue work)
    fn get_hashes_between(&self, low: Hash, high: Hash, max_blocks: usize) -> ConsensusResult<Vec<Hash>> {
        use crate::processes::ghostdag::ordering::SortableBlock;
        use std::collections::VecDeque;

        if self.status_option(high).is_none() {
            return Err(ConsensusError::BlockNotFound(high));
        }
        let mut visited = BlockHashSet::new();
        let mut collected = Vec::new();
        let mut queue = VecDeque::from([high]);
        while let Some(current) = queue.pop_front() {
            if current == low || current == ORIGIN || !visited.insert(current) {
                continue;
            }
            // Only blocks in the future of `low` are collected; any block with
            // an ancestor in that future is in it as well, so pruning the
            // traversal here cannot miss relevant blocks
            if !self.is_dag_ancestor_of(low, current) {
                continue;
            }
            collected.push(SortableBlock::new(current, self.ghostdag_store.get_blue_work(current).unwrap()));
            queue.extend(self.relations_store.get_parents(current).unwrap().iter());
        }
        collected.sort();
        Ok(collected.into_iter().map(|sortable| sortable.hash).take(max_blocks).collect())
    }

    /// Computes the selected-parent chain path from `from` to `to`:
    /// removed blocks high-to-low, added blocks low-to-high
    pub(crate) fn chain_path(&self, from: Hash, to: Hash) -> ChainPath {
        let mut removed = Vec::new();
        let mut added = Vec::new();
        let mut high = from;
        let mut low = to;
        // Walk both chain heads down to their common chain ancestor
        while !reachability::is_chain_ancestor_of(&self.reachability_store, high, low).unwrap_or(false) {
            removed.push(high);
            high = self.ghostdag_store.get_selected_parent(high).unwrap();
        }
        while low != high {
            added.push(low);
            low = self.ghostdag_store.get_selected_parent(low).unwrap();
        }
        added.reverse();
        ChainPath::new(added, removed)
    }
}
