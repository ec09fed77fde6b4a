use crate::tx::*;
use std::collections::HashMap;

pub type UtxoCollection = HashMap<TransactionOutpoint, UtxoEntry>;

pub trait UtxoCollectionExtensions {
    /// Checks if the `outpoint` key exists with an entry that holds `entry.block_blue_score == blue_score`
    fn contains_with_blue_score(&self, outpoint: &TransactionOutpoint, blue_score: u64) -> bool;

    /// Adds all entries from `other` to `self`.
    /// Note that this means that values from `other` might override values of `self`.
    fn add_many(&mut self, other: &Self);

    /// Removes all elements in `other` from `self`. Equivalent to `self - other` in set theory.
    fn remove_many(&mut self, other: &Self);

    /// Returns whether the intersection between the two collections is not empty.
    fn intersects(&self, other: &Self) -> bool;

    /// Returns the first outpoint in the intersection of the two collections for which
    /// `rule(outpoint, self_entry, other_entry)` does not hold, if any.
    fn intersects_with_rule(&self, other: &Self, rule: impl Fn(&TransactionOutpoint, &UtxoEntry, &UtxoEntry) -> bool) -> Option<TransactionOutpoint>;
}

impl UtxoCollectionExtensions for UtxoCollection {
    fn contains_with_blue_score(&self, outpoint: &TransactionOutpoint, blue_score: u64) -> bool {
        if let Some(entry) = self.get(outpoint) {
            entry.block_blue_score == blue_score
        } else {
            false
        }
    }

    fn add_many(&mut self, other: &Self) {
        for (k, v) in other.iter() {
            self.insert(*k, v.clone());
        }
    }

    fn remove_many(&mut self, other: &Self) {
        for k in other.keys() {
            self.remove(k);
        }
    }

    fn intersects(&self, other: &Self) -> bool {
        // We prefer iterating over the smaller set
        let (keys, other) = if self.len() <= other.len() { (self.keys(), other) } else { (other.keys(), self) };
        for k in keys {
            if other.contains_key(k) {
                return true;
            }
        }
        false
    }

    fn intersects_with_rule(&self, other: &Self, rule: impl Fn(&TransactionOutpoint, &UtxoEntry, &UtxoEntry) -> bool) -> Option<TransactionOutpoint> {
        let (smaller, larger, swapped) =
            if self.len() <= other.len() { (self, other, false) } else { (other, self, true) };
        for (outpoint, entry) in smaller.iter() {
            if let Some(other_entry) = larger.get(outpoint) {
                let (self_entry, other_entry) = if swapped { (other_entry, entry) } else { (entry, other_entry) };
                if !rule(outpoint, self_entry, other_entry) {
                    return Some(*outpoint);
                }
            }
        }
        None
    }
}

/// Splits the intersection of `this` and `other` (entries sharing blue score) into `intersection`,
/// while entries of `this` outside the intersection are accumulated into `remainder`.
pub fn intersection_with_remainder_having_blue_score_in_place(
    this: &UtxoCollection,
    other: &UtxoCollection,
    intersection: &mut UtxoCollection,
    remainder: &mut UtxoCollection,
) {
    for (outpoint, entry) in this.iter() {
        if other.contains_with_blue_score(outpoint, entry.block_blue_score) {
            intersection.insert(*outpoint, entry.clone());
        } else {
            remainder.insert(*outpoint, entry.clone());
        }
    }
}

/// Accumulates into `result` the entries of `this` which are not present in `other`
/// with the same blue score.
pub fn subtraction_having_blue_score_in_place(this: &UtxoCollection, other: &UtxoCollection, result: &mut UtxoCollection) {
    for (outpoint, entry) in this.iter() {
        if !other.contains_with_blue_score(outpoint, entry.block_blue_score) {
            result.insert(*outpoint, entry.clone());
        }
    }
}

/// Like [`subtraction_having_blue_score_in_place`], but also accumulates the intersection into `remainder`.
pub fn subtraction_with_remainder_having_blue_score_in_place(
    this: &UtxoCollection,
    other: &UtxoCollection,
    result: &mut UtxoCollection,
    remainder: &mut UtxoCollection,
) {
    for (outpoint, entry) in this.iter() {
        if !other.contains_with_blue_score(outpoint, entry.block_blue_score) {
            result.insert(*outpoint, entry.clone());
        } else {
            remainder.insert(*outpoint, entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_algebra() {
        let op = |n: u64| TransactionOutpoint::new(n.into(), 0);
        let entry = |score: u64| UtxoEntry::new(10, vec![], score, false);

        let mut a = UtxoCollection::new();
        a.insert(op(1), entry(5));
        a.insert(op(2), entry(5));
        let mut b = UtxoCollection::new();
        b.insert(op(2), entry(5));
        b.insert(op(3), entry(7));

        assert!(a.intersects(&b));
        assert!(a.contains_with_blue_score(&op(1), 5));
        assert!(!a.contains_with_blue_score(&op(1), 6));

        let mut result = UtxoCollection::new();
        subtraction_having_blue_score_in_place(&a, &b, &mut result);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&op(1)));

        let mut intersection = UtxoCollection::new();
        let mut remainder = UtxoCollection::new();
        intersection_with_remainder_having_blue_score_in_place(&a, &b, &mut intersection, &mut remainder);
        assert!(intersection.contains_key(&op(2)));
        assert!(remainder.contains_key(&op(1)));
    }
}
