use crate::header::Header;
use norn_hashes::{Hash, HasherBase};

/// Returns the header hash: double-SHA256 over the canonical wire encoding
/// `version(i32) || num_parents(u8) || parents || hash_merkle_root ||
/// accepted_id_merkle_root || utxo_commitment || timestamp(i64) || bits(u32) || nonce(u64)`.
/// Panics if the header carries more than 255 parents, which block validation
/// rejects beforehand.
pub fn hash(header: &Header) -> Hash {
    let mut hasher = norn_hashes::BlockHash::new();
    hasher
        .update((header.version as i32).to_le_bytes())
        .update(u8::try_from(header.parents.len()).expect("verified by the caller").to_le_bytes());
    for parent in header.parents.iter() {
        hasher.update(parent);
    }
    hasher
        .update(header.hash_merkle_root)
        .update(header.accepted_id_merkle_root)
        .update(header.utxo_commitment)
        .update((header.timestamp as i64).to_le_bytes())
        .update(header.bits.to_le_bytes())
        .update(header.nonce.to_le_bytes());
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockhash;

    #[test]
    fn test_header_hashing() {
        let header = Header::new(1, vec![1.into()], Default::default(), Default::default(), Default::default(), 234, 23, 567);
        assert_ne!(blockhash::NONE, header.hash);

        let mut other = Header::new(1, vec![1.into()], Default::default(), Default::default(), Default::default(), 234, 23, 568);
        assert_ne!(header.hash, other.hash);
        other.nonce = 567;
        other.finalize();
        assert_eq!(header.hash, other.hash);
    }

    #[test]
    fn test_hash_commits_to_parent_order() {
        let a = Header::new(1, vec![1.into(), 2.into()], Default::default(), Default::default(), Default::default(), 234, 23, 0);
        let b = Header::new(1, vec![2.into(), 1.into()], Default::default(), Default::default(), Default::default(), 234, 23, 0);
        assert_ne!(a.hash, b.hash);
    }
}
