use crate::constants::perf;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use norn_multiset::Multiset;
use std::sync::Arc;

/// The ECMH multiset of the virtual UTXO as of each chain block
pub trait UtxoMultisetsStoreReader {
    fn get(&self, hash: Hash) -> Result<Multiset, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait UtxoMultisetsStore: UtxoMultisetsStoreReader {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, multiset: Multiset) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"utxo-multisets";

#[derive(Clone)]
pub struct DbUtxoMultisetsStore {
    access: CachedDbAccess<Hash, Multiset>,
}

impl DbUtxoMultisetsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, perf::DEFAULT_CACHE_SIZE, STORE_PREFIX.to_vec()) }
    }
}

impl UtxoMultisetsStoreReader for DbUtxoMultisetsStore {
    fn get(&self, hash: Hash) -> Result<Multiset, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl UtxoMultisetsStore for DbUtxoMultisetsStore {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, multiset: Multiset) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(writer, hash, multiset)?;
        Ok(())
    }
}
