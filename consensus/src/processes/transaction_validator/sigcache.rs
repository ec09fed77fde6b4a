use norn_database::prelude::Cache;
use norn_hashes::Hash;

/// Key uniquely identifying a signature check
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct SigCacheKey {
    pub signing_hash: Hash,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

/// Caches outcomes of signature verifications so repeated validation of the
/// same transaction (mempool admission followed by block validation) only pays
/// the elliptic curve cost once.
#[derive(Clone)]
pub struct SigCache {
    cache: Cache<SigCacheKey, bool>,
}

impl SigCache {
    pub fn new(size: u64) -> Self {
        Self { cache: Cache::new(size) }
    }

    pub fn get(&self, key: &SigCacheKey) -> Option<bool> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: SigCacheKey, valid: bool) {
        self.cache.insert(key, valid);
    }
}
