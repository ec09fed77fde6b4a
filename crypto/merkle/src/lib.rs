use norn_hashes::{Hash, Hasher, HasherBase, MerkleBranchHash, ZERO_HASH};

pub fn calc_merkle_root(hashes: impl ExactSizeIterator<Item = Hash>) -> Hash {
    if hashes.len() == 0 {
        return ZERO_HASH;
    }
    let next_pot = hashes.len().next_power_of_two();
    let vec_len = 2 * next_pot - 1;

    let mut merkles = vec![None; vec_len];
    for (i, hash) in hashes.enumerate() {
        merkles[i] = Some(hash);
    }
    let mut offset = next_pot;
    for i in (0..vec_len - 1).step_by(2) {
        if merkles[i].is_none() {
            merkles[offset] = None;
        } else {
            merkles[offset] = Some(merkle_hash(merkles[i].unwrap(), merkles[i + 1].unwrap_or(ZERO_HASH)));
        }
        offset += 1
    }
    merkles.last().unwrap().unwrap()
}

pub fn merkle_hash(left: Hash, right: Hash) -> Hash {
    let mut hasher = MerkleBranchHash::new();
    hasher.update(left).update(right);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use norn_hashes::TransactionHash;
    use std::iter;

    fn make_hash(data: &[u8]) -> Hash {
        TransactionHash::hash(data)
    }

    #[test]
    fn test_empty_returns_zero_hash() {
        assert_eq!(calc_merkle_root(iter::empty()), ZERO_HASH);
    }

    #[test]
    fn test_single_entry_returns_hash() {
        let entry = make_hash(b"single_entry");
        assert_eq!(calc_merkle_root(iter::once(entry)), entry);
    }

    #[test]
    fn test_two_entries_returns_hash_of_both() {
        let h1 = make_hash(b"entry1");
        let h2 = make_hash(b"entry2");
        assert_eq!(calc_merkle_root([h1, h2].into_iter()), merkle_hash(h1, h2));
    }

    #[test]
    fn test_three_entries() {
        // Level 0: h1, h2, h3, None
        // Level 1: hash(h1,h2), hash(h3,ZERO)
        // Level 2: hash(hash(h1,h2), hash(h3,ZERO))
        let h1 = make_hash(b"h1");
        let h2 = make_hash(b"h2");
        let h3 = make_hash(b"h3");

        let root = calc_merkle_root([h1, h2, h3].into_iter());
        let expected = merkle_hash(merkle_hash(h1, h2), merkle_hash(h3, ZERO_HASH));
        assert_eq!(root, expected);
    }

    #[test]
    fn test_order_sensitivity() {
        let h1 = make_hash(b"h1");
        let h2 = make_hash(b"h2");
        assert_ne!(calc_merkle_root([h1, h2].into_iter()), calc_merkle_root([h2, h1].into_iter()));
    }
}
