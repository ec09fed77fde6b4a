use super::{utxo_collection::UtxoCollection, utxo_diff::ImmutableUtxoDiff};
use crate::tx::{TransactionOutpoint, UtxoEntry};

/// An abstraction for read-only queries over a UTXO collection
pub trait UtxoView {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry>;
}

impl UtxoView for UtxoCollection {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        std::collections::HashMap::get(self, outpoint).cloned()
    }
}

impl<T: UtxoView> UtxoView for &T {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        (*self).get(outpoint)
    }
}

/// Composes a UTXO view from a base UTXO view and a UTXO diff.
/// Note: can be used to compose any number of diff layers by nesting instances
pub struct ComposedUtxoView<V: UtxoView, D: ImmutableUtxoDiff> {
    base: V,
    diff: D,
}

impl<V: UtxoView, D: ImmutableUtxoDiff> ComposedUtxoView<V, D> {
    pub fn new(base: V, diff: D) -> Self {
        Self { base, diff }
    }
}

impl<V: UtxoView, D: ImmutableUtxoDiff> UtxoView for ComposedUtxoView<V, D> {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        // First check diff added entries
        if let Some(entry) = self.diff.added().get(outpoint) {
            return Some(entry.clone());
        }
        // If not in added, but in removed, then considered removed
        if self.diff.removed().contains_key(outpoint) {
            return None;
        }
        // Fallback to the base view
        self.base.get(outpoint)
    }
}

pub fn compose_one_diff_layer<B: UtxoView, D: ImmutableUtxoDiff>(base: B, diff: D) -> ComposedUtxoView<B, D> {
    ComposedUtxoView::new(base, diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utxo::utxo_diff::UtxoDiff;

    #[test]
    fn test_composed_view() {
        let op = |n: u64| TransactionOutpoint::new(n.into(), 0);
        let entry = |v: u64| UtxoEntry::new(v, vec![], 0, false);

        let mut base = UtxoCollection::new();
        base.insert(op(1), entry(10));
        base.insert(op(2), entry(20));

        let mut diff = UtxoDiff::default();
        diff.remove.insert(op(2), entry(20));
        diff.add.insert(op(3), entry(30));

        let view = compose_one_diff_layer(&base, &diff);
        assert_eq!(view.get(&op(1)).unwrap().amount, 10);
        assert!(view.get(&op(2)).is_none());
        assert_eq!(view.get(&op(3)).unwrap().amount, 30);
    }
}
