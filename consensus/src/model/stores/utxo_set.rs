use crate::constants::perf;
use norn_consensus_core::tx::{TransactionId, TransactionIndexType, TransactionOutpoint, UtxoEntry};
use norn_consensus_core::utxo::{utxo_diff::ImmutableUtxoDiff, utxo_view::UtxoView};
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use norn_hashes::HASH_SIZE;
use std::sync::Arc;

/// Binary key form of a transaction outpoint: `tx_id || index (LE)`
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct UtxoKey([u8; UTXO_KEY_SIZE]);

pub const UTXO_KEY_SIZE: usize = HASH_SIZE + std::mem::size_of::<TransactionIndexType>();

impl AsRef<[u8]> for UtxoKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<TransactionOutpoint> for UtxoKey {
    fn from(outpoint: TransactionOutpoint) -> Self {
        let mut bytes = [0; UTXO_KEY_SIZE];
        bytes[..HASH_SIZE].copy_from_slice(&outpoint.transaction_id.as_bytes());
        bytes[HASH_SIZE..].copy_from_slice(&outpoint.index.to_le_bytes());
        Self(bytes)
    }
}

impl From<UtxoKey> for TransactionOutpoint {
    fn from(key: UtxoKey) -> Self {
        TransactionOutpoint::new(
            TransactionId::from_slice(&key.0[..HASH_SIZE]),
            TransactionIndexType::from_le_bytes(key.0[HASH_SIZE..].try_into().unwrap()),
        )
    }
}

pub trait UtxoSetStoreReader {
    fn get(&self, outpoint: &TransactionOutpoint) -> Result<UtxoEntry, StoreError>;
    fn has(&self, outpoint: &TransactionOutpoint) -> Result<bool, StoreError>;
    /// Iterates entries ordered by binary key, starting strictly after
    /// `from_outpoint` when provided
    fn iter_from(&self, from_outpoint: Option<TransactionOutpoint>, limit: usize) -> Vec<(TransactionOutpoint, UtxoEntry)>;
}

pub trait UtxoSetStore: UtxoSetStoreReader {
    /// Updates the store according to the diff: removing and adding entries correspondingly
    fn write_diff(&mut self, writer: impl DbWriter, diff: &impl ImmutableUtxoDiff) -> Result<(), StoreError>;
    fn write_many(&mut self, writer: impl DbWriter, utxos: &[(TransactionOutpoint, UtxoEntry)]) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

pub const VIRTUAL_UTXO_SET_PREFIX: &[u8] = b"virtual-utxo-set";

#[derive(Clone)]
pub struct DbUtxoSetStore {
    db: Arc<DB>,
    access: CachedDbAccess<UtxoKey, UtxoEntry>,
    prefix: Vec<u8>,
}

impl DbUtxoSetStore {
    pub fn new(db: Arc<DB>, prefix: &[u8]) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(db, perf::DEFAULT_CACHE_SIZE, prefix.to_vec()),
            prefix: prefix.to_vec(),
        }
    }
}

impl UtxoSetStoreReader for DbUtxoSetStore {
    fn get(&self, outpoint: &TransactionOutpoint) -> Result<UtxoEntry, StoreError> {
        self.access.read(UtxoKey::from(*outpoint))
    }

    fn has(&self, outpoint: &TransactionOutpoint) -> Result<bool, StoreError> {
        self.access.has(UtxoKey::from(*outpoint))
    }

    fn iter_from(&self, from_outpoint: Option<TransactionOutpoint>, limit: usize) -> Vec<(TransactionOutpoint, UtxoEntry)> {
        let skip_key = from_outpoint.map(UtxoKey::from);
        self.access
            .iterator()
            .filter_map(|result| result.ok())
            .filter_map(|(key_bytes, entry)| {
                let key = UtxoKey(key_bytes.as_ref().try_into().ok()?);
                Some((key, entry))
            })
            .filter(|(key, _)| skip_key.is_none_or(|skip| key.0 > skip.0))
            .take(limit)
            .map(|(key, entry)| (TransactionOutpoint::from(key), entry))
            .collect()
    }
}

impl UtxoSetStore for DbUtxoSetStore {
    fn write_diff(&mut self, mut writer: impl DbWriter, diff: &impl ImmutableUtxoDiff) -> Result<(), StoreError> {
        for outpoint in diff.removed().keys() {
            self.access.delete(&mut writer, UtxoKey::from(*outpoint))?;
        }
        for (outpoint, entry) in diff.added().iter() {
            self.access.write(&mut writer, UtxoKey::from(*outpoint), entry.clone())?;
        }
        Ok(())
    }

    fn write_many(&mut self, mut writer: impl DbWriter, utxos: &[(TransactionOutpoint, UtxoEntry)]) -> Result<(), StoreError> {
        for (outpoint, entry) in utxos.iter() {
            self.access.write(&mut writer, UtxoKey::from(*outpoint), entry.clone())?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        // Deleting via iteration keeps the operation within the normal writer path
        let keys: Vec<TransactionOutpoint> = self.iter_from(None, usize::MAX).into_iter().map(|(outpoint, _)| outpoint).collect();
        let mut writer = norn_database::prelude::DirectDbWriter::new(self.db.clone());
        for outpoint in keys {
            self.access.delete(&mut writer, UtxoKey::from(outpoint))?;
        }
        // The store was re-created fresh with the same prefix so drop lingering cache entries
        self.access = CachedDbAccess::new(self.db.clone(), perf::DEFAULT_CACHE_SIZE, self.prefix.clone());
        Ok(())
    }
}

impl UtxoView for DbUtxoSetStore {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        UtxoSetStoreReader::get(self, outpoint).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norn_database::prelude::{open_db, DirectDbWriter};

    #[test]
    fn test_utxo_key_roundtrip() {
        let outpoint = TransactionOutpoint::new(77.into(), 3);
        let key = UtxoKey::from(outpoint);
        assert_eq!(TransactionOutpoint::from(key), outpoint);
    }

    #[test]
    fn test_write_diff_and_iterate() {
        use norn_consensus_core::utxo::utxo_diff::UtxoDiff;

        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path().to_path_buf(), 1);
        let mut store = DbUtxoSetStore::new(db.clone(), VIRTUAL_UTXO_SET_PREFIX);

        let mut diff = UtxoDiff::default();
        for i in 0..5u64 {
            diff.add.insert(TransactionOutpoint::new(i.into(), 0), UtxoEntry::new(i * 10, vec![], 0, false));
        }
        store.write_diff(DirectDbWriter::new(db.clone()), &diff).unwrap();

        assert!(store.has(&TransactionOutpoint::new(3.into(), 0)).unwrap());
        let all = store.iter_from(None, usize::MAX);
        assert_eq!(all.len(), 5);

        // Chunked iteration resumes after the given outpoint without repeating it
        let first_chunk = store.iter_from(None, 2);
        let second_chunk = store.iter_from(Some(first_chunk.last().unwrap().0), usize::MAX);
        assert_eq!(first_chunk.len() + second_chunk.len(), 5);
        assert!(first_chunk.iter().all(|(op, _)| !second_chunk.iter().any(|(op2, _)| op2 == op)));

        let mut removal = UtxoDiff::default();
        removal.remove.insert(TransactionOutpoint::new(3.into(), 0), UtxoEntry::new(30, vec![], 0, false));
        store.write_diff(DirectDbWriter::new(db), &removal).unwrap();
        assert!(!store.has(&TransactionOutpoint::new(3.into(), 0)).unwrap());
    }
}
