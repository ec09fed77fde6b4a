use norn_database::prelude::{CachedDbItem, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

pub trait PruningStoreReader {
    fn pruning_point(&self) -> Result<Hash, StoreError>;
}

pub trait PruningStore: PruningStoreReader {
    fn set(&mut self, writer: impl DbWriter, pruning_point: Hash) -> Result<(), StoreError>;
}

const STORE_KEY: &[u8] = b"pruning-point";

#[derive(Clone)]
pub struct DbPruningStore {
    access: CachedDbItem<Hash>,
}

impl DbPruningStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbItem::new(db, STORE_KEY.to_vec()) }
    }
}

impl PruningStoreReader for DbPruningStore {
    fn pruning_point(&self) -> Result<Hash, StoreError> {
        self.access.read()
    }
}

impl PruningStore for DbPruningStore {
    fn set(&mut self, writer: impl DbWriter, pruning_point: Hash) -> Result<(), StoreError> {
        self.access.write(writer, &pruning_point)
    }
}
