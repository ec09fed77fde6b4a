use crate::{blockstatus::BlockStatus, coinbase::MinerData, header::Header, tx::Transaction, tx::TransactionId, BlueWorkType, ChainPath};
use norn_hashes::Hash;
use std::sync::Arc;

/// A block consisting of a header and a (possibly empty) transaction list.
/// The first transaction, when present, is the coinbase.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: Arc<Header>,
    pub transactions: Arc<Vec<Transaction>>,
}

impl Block {
    pub fn new(header: Header, txs: Vec<Transaction>) -> Self {
        Self { header: Arc::new(header), transactions: Arc::new(txs) }
    }

    pub fn from_arcs(header: Arc<Header>, transactions: Arc<Vec<Transaction>>) -> Self {
        Self { header, transactions }
    }

    pub fn from_header(header: Header) -> Self {
        Self { header: Arc::new(header), transactions: Arc::new(Vec::new()) }
    }

    pub fn is_header_only(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    /// The coinbase transaction; panics for header-only blocks
    pub fn coinbase_transaction(&self) -> &Transaction {
        &self.transactions[crate::tx::COINBASE_TRANSACTION_INDEX]
    }
}

/// The result of a successful block insertion
#[derive(Debug, Default)]
pub struct BlockInsertionResult {
    /// The virtual selected parent chain change caused by the block, empty if
    /// the block did not affect the selected chain
    pub chain_path: ChainPath,
    /// IDs of transactions newly accepted by the virtual chain
    pub accepted_transaction_ids: Vec<TransactionId>,
}

/// Summarized block data served to info queries
#[derive(Debug, Clone, Default)]
pub struct BlockInfo {
    pub exists: bool,
    pub status: Option<BlockStatus>,
    pub blue_score: Option<u64>,
    pub blue_work: Option<BlueWorkType>,
}

impl BlockInfo {
    pub fn missing() -> Self {
        Default::default()
    }

    pub fn has_body(&self) -> bool {
        self.status.is_some_and(|s| s.has_block_body())
    }
}

/// A block built for an external miner, with the context needed to judge its freshness
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub miner_data: MinerData,
    pub selected_parent_timestamp: u64,
    pub selected_parent_blue_score: u64,
}
