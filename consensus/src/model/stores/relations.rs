use norn_consensus_core::blockhash::BlockHashes;
use norn_consensus_core::BlockHashMap;
use norn_database::prelude::{CachedDbAccess, DbKey, DbWriter, StoreError, DB};
use norn_hashes::Hash;
use std::sync::Arc;

/// Reader API for block relations (direct DAG parents/children)
pub trait RelationsStoreReader {
    fn get_parents(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

/// Write API for block relations. The insert is expected to register the new
/// block as a child of each of its parents.
pub trait RelationsStore: RelationsStoreReader {
    fn insert(&mut self, writer: impl DbWriter, hash: Hash, parents: BlockHashes) -> Result<(), StoreError>;
}

const PARENTS_PREFIX: &[u8] = b"block-parents";
const CHILDREN_PREFIX: &[u8] = b"block-children";

#[derive(Clone)]
pub struct DbRelationsStore {
    parents_access: CachedDbAccess<Hash, BlockHashes>,
    children_access: CachedDbAccess<Hash, BlockHashes>,
}

impl DbRelationsStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            parents_access: CachedDbAccess::new(Arc::clone(&db), cache_size, PARENTS_PREFIX.to_vec()),
            children_access: CachedDbAccess::new(db, cache_size, CHILDREN_PREFIX.to_vec()),
        }
    }

    pub fn counts(&self) -> Result<usize, StoreError> {
        Ok(self.parents_access.iterator().count())
    }
}

impl RelationsStoreReader for DbRelationsStore {
    fn get_parents(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        self.parents_access.read(hash)
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        self.children_access.read(hash)
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.parents_access.has(hash)
    }
}

impl RelationsStore for DbRelationsStore {
    /// Inserts `parents` into the store for `hash` and registers `hash` as a
    /// child of each parent. Assumes all parents are already in the store.
    fn insert(&mut self, mut writer: impl DbWriter, hash: Hash, parents: BlockHashes) -> Result<(), StoreError> {
        if self.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.parents_access.write(&mut writer, hash, BlockHashes::clone(&parents))?;
        // The new block starts with an empty children list
        self.children_access.write(&mut writer, hash, BlockHashes::new(Vec::new()))?;
        for parent in parents.iter().cloned() {
            let mut children = (*self.get_children(parent)?).clone();
            children.push(hash);
            self.children_access.write(&mut writer, parent, BlockHashes::new(children))?;
        }
        Ok(())
    }
}

/// An in-memory relations store, used by tests and staging consensus instances
#[derive(Default)]
pub struct MemoryRelationsStore {
    parents_map: BlockHashMap<BlockHashes>,
    children_map: BlockHashMap<BlockHashes>,
}

impl MemoryRelationsStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl RelationsStoreReader for MemoryRelationsStore {
    fn get_parents(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        match self.parents_map.get(&hash) {
            Some(parents) => Ok(BlockHashes::clone(parents)),
            None => Err(StoreError::KeyNotFound(DbKey::new(PARENTS_PREFIX, hash))),
        }
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        match self.children_map.get(&hash) {
            Some(children) => Ok(BlockHashes::clone(children)),
            None => Err(StoreError::KeyNotFound(DbKey::new(CHILDREN_PREFIX, hash))),
        }
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        Ok(self.parents_map.contains_key(&hash))
    }
}

impl RelationsStore for MemoryRelationsStore {
    fn insert(&mut self, _writer: impl DbWriter, hash: Hash, parents: BlockHashes) -> Result<(), StoreError> {
        if self.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.parents_map.insert(hash, BlockHashes::clone(&parents));
        self.children_map.insert(hash, BlockHashes::new(Vec::new()));
        for parent in parents.iter().cloned() {
            let mut children = (*self.get_children(parent)?).clone();
            children.push(hash);
            self.children_map.insert(parent, BlockHashes::new(children));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norn_database::prelude::MemoryWriter;

    #[test]
    fn test_memory_relations_store() {
        let mut store = MemoryRelationsStore::new();
        let origin = Hash::from_u64_word(1);
        store.insert(MemoryWriter, origin, BlockHashes::new(vec![])).unwrap();
        store.insert(MemoryWriter, 2.into(), BlockHashes::new(vec![origin])).unwrap();
        store.insert(MemoryWriter, 3.into(), BlockHashes::new(vec![origin])).unwrap();

        assert_eq!(store.get_parents(2.into()).unwrap().as_slice(), [origin]);
        let children = store.get_children(origin).unwrap();
        assert_eq!(children.as_slice(), [Hash::from(2), Hash::from(3)]);
        assert!(store.insert(MemoryWriter, 2.into(), BlockHashes::new(vec![origin])).is_err());
    }
}
