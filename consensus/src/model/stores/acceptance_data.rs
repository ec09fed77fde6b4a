use crate::constants::perf;
use norn_consensus_core::tx::TransactionId;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

/// The ordered list of transaction IDs each chain block accepts
pub trait AcceptanceDataStoreReader {
    fn get(&self, hash: Hash) -> Result<Arc<Vec<TransactionId>>, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait AcceptanceDataStore: AcceptanceDataStoreReader {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, accepted_ids: Arc<Vec<TransactionId>>) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"acceptance-data";

#[derive(Clone)]
pub struct DbAcceptanceDataStore {
    access: CachedDbAccess<Hash, Arc<Vec<TransactionId>>>,
}

impl DbAcceptanceDataStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, perf::DEFAULT_CACHE_SIZE, STORE_PREFIX.to_vec()) }
    }
}

impl AcceptanceDataStoreReader for DbAcceptanceDataStore {
    fn get(&self, hash: Hash) -> Result<Arc<Vec<TransactionId>>, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl AcceptanceDataStore for DbAcceptanceDataStore {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, accepted_ids: Arc<Vec<TransactionId>>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(writer, hash, accepted_ids)?;
        Ok(())
    }
}
