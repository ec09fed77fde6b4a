use crate::constants::perf;
use norn_consensus_core::tx::Transaction;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

pub trait BlockTransactionsStoreReader {
    fn get(&self, hash: Hash) -> Result<Arc<Vec<Transaction>>, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait BlockTransactionsStore: BlockTransactionsStoreReader {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, transactions: Arc<Vec<Transaction>>) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"block-transactions";

#[derive(Clone)]
pub struct DbBlockTransactionsStore {
    access: CachedDbAccess<Hash, Arc<Vec<Transaction>>>,
}

impl DbBlockTransactionsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, perf::LARGE_DATA_CACHE_SIZE, STORE_PREFIX.to_vec()) }
    }
}

impl BlockTransactionsStoreReader for DbBlockTransactionsStore {
    fn get(&self, hash: Hash) -> Result<Arc<Vec<Transaction>>, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl BlockTransactionsStore for DbBlockTransactionsStore {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, transactions: Arc<Vec<Transaction>>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(writer, hash, transactions)?;
        Ok(())
    }
}
