use norn_consensus_core::blockstatus::BlockStatus;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

pub trait StatusesStoreReader {
    fn get(&self, hash: Hash) -> Result<BlockStatus, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait StatusesStore: StatusesStoreReader {
    /// Statuses, unlike other stores, are mutable by nature and can be set more than once
    fn set(&mut self, writer: impl DbWriter, hash: Hash, status: BlockStatus) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"block-statuses";

#[derive(Clone)]
pub struct DbStatusesStore {
    access: CachedDbAccess<Hash, BlockStatus>,
}

impl DbStatusesStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { access: CachedDbAccess::new(db, cache_size, STORE_PREFIX.to_vec()) }
    }
}

impl StatusesStoreReader for DbStatusesStore {
    fn get(&self, hash: Hash) -> Result<BlockStatus, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl StatusesStore for DbStatusesStore {
    fn set(&mut self, writer: impl DbWriter, hash: Hash, status: BlockStatus) -> Result<(), StoreError> {
        self.access.write(writer, hash, status)
    }
}
