use crate::constants::perf;
use norn_consensus_core::utxo::utxo_diff::UtxoDiff;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

/// Per-block UTXO diff vs. the past UTXO of the block's selected parent
pub trait UtxoDiffsStoreReader {
    fn get(&self, hash: Hash) -> Result<Arc<UtxoDiff>, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait UtxoDiffsStore: UtxoDiffsStoreReader {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, diff: Arc<UtxoDiff>) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"utxo-diffs";

#[derive(Clone)]
pub struct DbUtxoDiffsStore {
    access: CachedDbAccess<Hash, Arc<UtxoDiff>>,
}

impl DbUtxoDiffsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, perf::LARGE_DATA_CACHE_SIZE, STORE_PREFIX.to_vec()) }
    }
}

impl UtxoDiffsStoreReader for DbUtxoDiffsStore {
    fn get(&self, hash: Hash) -> Result<Arc<UtxoDiff>, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl UtxoDiffsStore for DbUtxoDiffsStore {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, diff: Arc<UtxoDiff>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(writer, hash, diff)?;
        Ok(())
    }
}
