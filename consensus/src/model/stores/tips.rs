use norn_consensus_core::blockhash::BlockHashes;
use norn_database::prelude::{CachedDbItem, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

pub trait TipsStoreReader {
    fn get(&self) -> Result<BlockHashes, StoreError>;
}

pub trait TipsStore: TipsStoreReader {
    /// Adds a new tip, removing any of its direct parents from the tip set.
    /// Returns the updated tips.
    fn add_tip(&mut self, writer: impl DbWriter, new_tip: Hash, new_tip_parents: &[Hash]) -> Result<BlockHashes, StoreError>;

    fn init(&mut self, writer: impl DbWriter, initial_tip: Hash) -> Result<(), StoreError>;
}

const STORE_KEY: &[u8] = b"dag-tips";

#[derive(Clone)]
pub struct DbTipsStore {
    access: CachedDbItem<BlockHashes>,
}

impl DbTipsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbItem::new(db, STORE_KEY.to_vec()) }
    }

    pub fn is_initialized(&self) -> bool {
        self.access.read().is_ok()
    }
}

impl TipsStoreReader for DbTipsStore {
    fn get(&self) -> Result<BlockHashes, StoreError> {
        self.access.read()
    }
}

impl TipsStore for DbTipsStore {
    fn add_tip(&mut self, writer: impl DbWriter, new_tip: Hash, new_tip_parents: &[Hash]) -> Result<BlockHashes, StoreError> {
        let current = self.access.read()?;
        let new_tips: Vec<Hash> =
            current.iter().copied().filter(|tip| !new_tip_parents.contains(tip)).chain(std::iter::once(new_tip)).collect();
        let new_tips = BlockHashes::new(new_tips);
        self.access.write(writer, &new_tips)?;
        Ok(new_tips)
    }

    fn init(&mut self, writer: impl DbWriter, initial_tip: Hash) -> Result<(), StoreError> {
        self.access.write(writer, &BlockHashes::new(vec![initial_tip]))
    }
}
