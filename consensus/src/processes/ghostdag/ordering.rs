use norn_consensus_core::BlueWorkType;
use norn_hashes::Hash;
use std::cmp::Ordering;

/// A block hash paired with its blue work, ordered by `(blue_work, hash)`.
/// Defines the canonical ordering of mergeset candidates.
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct SortableBlock {
    pub hash: Hash,
    pub blue_work: BlueWorkType,
}

impl SortableBlock {
    pub fn new(hash: Hash, blue_work: BlueWorkType) -> Self {
        Self { hash, blue_work }
    }
}

impl PartialOrd for SortableBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.blue_work.cmp(&other.blue_work).then_with(|| self.hash.cmp(&other.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sortable_block_order() {
        let a = SortableBlock::new(2.into(), 10.into());
        let b = SortableBlock::new(1.into(), 11.into());
        let c = SortableBlock::new(1.into(), 10.into());
        assert!(a < b);
        assert!(c < a); // Equal work ties break by hash
        let mut v = vec![a.clone(), b.clone(), c.clone()];
        v.sort();
        assert_eq!(v, vec![c, a, b]);
    }
}
