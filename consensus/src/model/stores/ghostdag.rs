use norn_consensus_core::blockhash::BlockHashes;
use norn_consensus_core::{BlockHashMap, BlueWorkType};
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type HashKTypeMap = Arc<BlockHashMap<u8>>;

/// The output of the GHOSTDAG protocol for a single block
#[derive(Clone, Serialize, Deserialize)]
pub struct GhostdagData {
    pub blue_score: u64,
    pub blue_work: BlueWorkType,
    pub selected_parent: Hash,
    pub mergeset_blues: BlockHashes,
    pub mergeset_reds: BlockHashes,
    /// For each blue in the mergeset: the size of its blue anticone from this
    /// block's worldview
    pub blues_anticone_sizes: HashKTypeMap,
}

impl GhostdagData {
    pub fn new(
        blue_score: u64,
        blue_work: BlueWorkType,
        selected_parent: Hash,
        mergeset_blues: BlockHashes,
        mergeset_reds: BlockHashes,
        blues_anticone_sizes: HashKTypeMap,
    ) -> Self {
        Self { blue_score, blue_work, selected_parent, mergeset_blues, mergeset_reds, blues_anticone_sizes }
    }

    pub fn new_with_selected_parent(selected_parent: Hash, k: u8) -> Self {
        let mut mergeset_blues: Vec<Hash> = Vec::with_capacity((k + 1) as usize);
        let mut blues_anticone_sizes: BlockHashMap<u8> = BlockHashMap::with_capacity(k as usize);
        // The selected parent is always the first blue of its merging block,
        // and its blue anticone within the mergeset is empty by definition
        mergeset_blues.push(selected_parent);
        blues_anticone_sizes.insert(selected_parent, 0);

        Self {
            blue_score: Default::default(),
            blue_work: Default::default(),
            selected_parent,
            mergeset_blues: BlockHashes::new(mergeset_blues),
            mergeset_reds: Default::default(),
            blues_anticone_sizes: HashKTypeMap::new(blues_anticone_sizes),
        }
    }

    /// The mergeset size (blues + reds, selected parent included)
    pub fn mergeset_size(&self) -> usize {
        self.mergeset_blues.len() + self.mergeset_reds.len()
    }

    /// Iterates the mergeset in consensus order: selected parent first, then
    /// the remaining blues, then the reds
    pub fn consensus_ordered_mergeset(&self) -> impl Iterator<Item = Hash> + '_ {
        self.mergeset_blues.iter().cloned().chain(self.mergeset_reds.iter().cloned())
    }

    /// Iterates the mergeset without the selected parent, blues before reds
    pub fn unordered_mergeset_without_selected_parent(&self) -> impl Iterator<Item = Hash> + '_ {
        self.mergeset_blues.iter().skip(1).cloned().chain(self.mergeset_reds.iter().cloned())
    }

    pub fn add_blue(&mut self, block: Hash, blue_anticone_size: u8, block_blues_anticone_sizes: &BlockHashMap<u8>) {
        BlockHashes::make_mut(&mut self.mergeset_blues).push(block);
        let blues_anticone_sizes = HashKTypeMap::make_mut(&mut self.blues_anticone_sizes);
        blues_anticone_sizes.insert(block, blue_anticone_size);
        // The newly added blue enlarges the anticone of each blue it does not reach
        for (blue, size) in block_blues_anticone_sizes {
            blues_anticone_sizes.insert(*blue, size + 1);
        }
    }

    pub fn add_red(&mut self, block: Hash) {
        BlockHashes::make_mut(&mut self.mergeset_reds).push(block);
    }

    pub fn finalize_score_and_work(&mut self, blue_score: u64, blue_work: BlueWorkType) {
        self.blue_score = blue_score;
        self.blue_work = blue_work;
    }
}

pub trait GhostdagStoreReader {
    fn get_blue_score(&self, hash: Hash) -> Result<u64, StoreError>;
    fn get_blue_work(&self, hash: Hash) -> Result<BlueWorkType, StoreError>;
    fn get_selected_parent(&self, hash: Hash) -> Result<Hash, StoreError>;
    fn get_mergeset_blues(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn get_mergeset_reds(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn get_blues_anticone_sizes(&self, hash: Hash) -> Result<HashKTypeMap, StoreError>;
    fn get_data(&self, hash: Hash) -> Result<Arc<GhostdagData>, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

pub trait GhostdagStore: GhostdagStoreReader {
    /// Insert GHOSTDAG data for block `hash`. The store assumes data is only
    /// written once per block.
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, data: Arc<GhostdagData>) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"block-ghostdag-data";

#[derive(Clone)]
pub struct DbGhostdagStore {
    access: CachedDbAccess<Hash, Arc<GhostdagData>>,
}

impl DbGhostdagStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { access: CachedDbAccess::new(db, cache_size, STORE_PREFIX.to_vec()) }
    }
}

impl GhostdagStoreReader for DbGhostdagStore {
    fn get_blue_score(&self, hash: Hash) -> Result<u64, StoreError> {
        Ok(self.access.read(hash)?.blue_score)
    }

    fn get_blue_work(&self, hash: Hash) -> Result<BlueWorkType, StoreError> {
        Ok(self.access.read(hash)?.blue_work)
    }

    fn get_selected_parent(&self, hash: Hash) -> Result<Hash, StoreError> {
        Ok(self.access.read(hash)?.selected_parent)
    }

    fn get_mergeset_blues(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(BlockHashes::clone(&self.access.read(hash)?.mergeset_blues))
    }

    fn get_mergeset_reds(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(BlockHashes::clone(&self.access.read(hash)?.mergeset_reds))
    }

    fn get_blues_anticone_sizes(&self, hash: Hash) -> Result<HashKTypeMap, StoreError> {
        Ok(HashKTypeMap::clone(&self.access.read(hash)?.blues_anticone_sizes))
    }

    fn get_data(&self, hash: Hash) -> Result<Arc<GhostdagData>, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }
}

impl GhostdagStore for DbGhostdagStore {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, data: Arc<GhostdagData>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(writer, hash, data)?;
        Ok(())
    }
}

/// An in-memory implementation, used by tests and staging consensus instances
#[derive(Default)]
pub struct MemoryGhostdagStore {
    map: parking_lot::RwLock<BlockHashMap<Arc<GhostdagData>>>,
}

impl MemoryGhostdagStore {
    pub fn new() -> Self {
        Default::default()
    }

    fn read_entry(&self, hash: Hash) -> Result<Arc<GhostdagData>, StoreError> {
        match self.map.read().get(&hash) {
            Some(data) => Ok(Arc::clone(data)),
            None => Err(StoreError::KeyNotFound(norn_database::prelude::DbKey::new(STORE_PREFIX, hash))),
        }
    }
}

impl GhostdagStoreReader for MemoryGhostdagStore {
    fn get_blue_score(&self, hash: Hash) -> Result<u64, StoreError> {
        Ok(self.read_entry(hash)?.blue_score)
    }

    fn get_blue_work(&self, hash: Hash) -> Result<BlueWorkType, StoreError> {
        Ok(self.read_entry(hash)?.blue_work)
    }

    fn get_selected_parent(&self, hash: Hash) -> Result<Hash, StoreError> {
        Ok(self.read_entry(hash)?.selected_parent)
    }

    fn get_mergeset_blues(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(BlockHashes::clone(&self.read_entry(hash)?.mergeset_blues))
    }

    fn get_mergeset_reds(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(BlockHashes::clone(&self.read_entry(hash)?.mergeset_reds))
    }

    fn get_blues_anticone_sizes(&self, hash: Hash) -> Result<HashKTypeMap, StoreError> {
        Ok(HashKTypeMap::clone(&self.read_entry(hash)?.blues_anticone_sizes))
    }

    fn get_data(&self, hash: Hash) -> Result<Arc<GhostdagData>, StoreError> {
        self.read_entry(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        Ok(self.map.read().contains_key(&hash))
    }
}

impl GhostdagStore for MemoryGhostdagStore {
    fn insert(&mut self, _writer: impl DbWriter, hash: Hash, data: Arc<GhostdagData>) -> Result<(), StoreError> {
        if self.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.map.write().insert(hash, data);
        Ok(())
    }
}
