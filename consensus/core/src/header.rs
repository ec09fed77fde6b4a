use crate::hashing;
use borsh::{BorshDeserialize, BorshSerialize};
use norn_hashes::Hash;
use serde::{Deserialize, Serialize};

/// A block header. The `hash` field caches the double-SHA256 of the canonical
/// encoding and must be refreshed via [`Header::finalize`] after any mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub hash: Hash, // Cached hash
    pub version: u16,
    pub parents: Vec<Hash>,
    /// Merkle root over the hashes of the block's own transactions
    pub hash_merkle_root: Hash,
    /// Merkle root over the IDs of the transactions this block accepts
    pub accepted_id_merkle_root: Hash,
    /// ECMH commitment to the virtual UTXO set after this block
    pub utxo_commitment: Hash,
    /// Timestamp is in milliseconds
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
}

impl Header {
    pub fn new(
        version: u16,
        parents: Vec<Hash>,
        hash_merkle_root: Hash,
        accepted_id_merkle_root: Hash,
        utxo_commitment: Hash,
        timestamp: u64,
        bits: u32,
        nonce: u64,
    ) -> Self {
        let mut header = Self {
            hash: Default::default(),
            version,
            parents,
            hash_merkle_root,
            accepted_id_merkle_root,
            utxo_commitment,
            timestamp,
            bits,
            nonce,
        };
        header.finalize();
        header
    }

    /// Recomputes the cached header hash from the current field values
    pub fn finalize(&mut self) {
        self.hash = hashing::header::hash(self);
    }

    pub fn direct_parents(&self) -> &[Hash] {
        &self.parents
    }

    /// Genesis headers are the only headers with no parents
    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }
}
