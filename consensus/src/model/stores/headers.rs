use norn_consensus_core::header::Header;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

pub trait HeaderStoreReader {
    fn get_header(&self, hash: Hash) -> Result<Arc<Header>, StoreError>;
    fn get_timestamp(&self, hash: Hash) -> Result<u64, StoreError>;
    fn get_bits(&self, hash: Hash) -> Result<u32, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait HeaderStore: HeaderStoreReader {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, header: Arc<Header>) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"block-headers";

#[derive(Clone)]
pub struct DbHeaderStore {
    access: CachedDbAccess<Hash, Arc<Header>>,
}

impl DbHeaderStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { access: CachedDbAccess::new(db, cache_size, STORE_PREFIX.to_vec()) }
    }

    pub fn count(&self) -> usize {
        self.access.iterator().count()
    }
}

impl HeaderStoreReader for DbHeaderStore {
    fn get_header(&self, hash: Hash) -> Result<Arc<Header>, StoreError> {
        self.access.read(hash)
    }

    fn get_timestamp(&self, hash: Hash) -> Result<u64, StoreError> {
        Ok(self.access.read(hash)?.timestamp)
    }

    fn get_bits(&self, hash: Hash) -> Result<u32, StoreError> {
        Ok(self.access.read(hash)?.bits)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl HeaderStore for DbHeaderStore {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, header: Arc<Header>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(writer, hash, header)?;
        Ok(())
    }
}
