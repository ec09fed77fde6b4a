use super::{interval::Interval, tree::add_tree_block, Result};
use crate::errors::ReachabilityError;
use crate::model::stores::reachability::{ReachabilityStore, ReachabilityStoreReader};
use norn_consensus_core::blockhash::ORIGIN;
use norn_hashes::Hash;

/// Initializes the reachability store with the `origin` root node, which all
/// locally known blocks are in the future of.
pub fn init(store: &mut dyn ReachabilityStore) -> Result<()> {
    if store.has(ORIGIN)? {
        return Ok(());
    }
    store.insert(ORIGIN, norn_consensus_core::blockhash::NONE, Interval::maximal(), 0)?;
    Ok(())
}

/// Adds `new_block` to the reachability index with `selected_parent` as its
/// tree parent. `mergeset_iterator` must iterate the new block's mergeset
/// (its past minus the past of the selected parent, the selected parent excluded),
/// whose future covering sets are updated to cover the new block.
pub fn add_block(
    store: &mut dyn ReachabilityStore,
    new_block: Hash,
    selected_parent: Hash,
    mergeset_iterator: &mut impl Iterator<Item = Hash>,
) -> Result<()> {
    add_tree_block(store, new_block, selected_parent)?;
    for merged_block in mergeset_iterator {
        insert_to_future_covering_set(store, merged_block, new_block)?;
    }
    Ok(())
}

/// Returns whether `this` is a chain ancestor of `queried` (i.e. `this` is on
/// the selected-parent tree path from `queried` to the root, `this == queried`
/// included). An O(1) interval containment check.
pub fn is_chain_ancestor_of(store: &dyn ReachabilityStoreReader, this: Hash, queried: Hash) -> Result<bool> {
    Ok(store.get_interval(this)?.contains(store.get_interval(queried)?))
}

/// Returns whether `this` is a strict chain ancestor of `queried`
pub fn is_strict_chain_ancestor_of(store: &dyn ReachabilityStoreReader, this: Hash, queried: Hash) -> Result<bool> {
    Ok(store.get_interval(this)?.strictly_contains(store.get_interval(queried)?))
}

/// Returns whether `this` is a DAG ancestor of `queried` (`this ∈ past(queried)`,
/// with `this == queried` included). Covers non-tree DAG edges via the future
/// covering set in O(log n).
pub fn is_dag_ancestor_of(store: &dyn ReachabilityStoreReader, this: Hash, queried: Hash) -> Result<bool> {
    if is_chain_ancestor_of(store, this, queried)? {
        return Ok(true);
    }
    let fcs = store.get_future_covering_set(this)?;
    match binary_search_descendant(store, &fcs, queried)? {
        SearchOutput::Found(_, _) => Ok(true),
        SearchOutput::NotFound(_) => Ok(false),
    }
}

/// Returns the child of `ancestor` which is also a chain ancestor of `descendant`,
/// i.e. the next block on the chain path from `ancestor` towards `descendant`.
pub fn get_next_chain_ancestor(store: &dyn ReachabilityStoreReader, descendant: Hash, ancestor: Hash) -> Result<Hash> {
    if descendant == ancestor {
        // The next ancestor does not exist
        return Err(ReachabilityError::BadQuery);
    }
    if !is_strict_chain_ancestor_of(store, ancestor, descendant)? {
        // `ancestor` isn't an ancestor of `descendant`, so no such child exists
        return Err(ReachabilityError::BadQuery);
    }
    get_next_chain_ancestor_unchecked(store, descendant, ancestor)
}

/// Note: it is the callers responsibility to make sure that `ancestor` is a
/// strict chain ancestor of `descendant`
pub fn get_next_chain_ancestor_unchecked(store: &dyn ReachabilityStoreReader, descendant: Hash, ancestor: Hash) -> Result<Hash> {
    let children = store.get_children(ancestor)?;
    match binary_search_descendant(store, &children, descendant)? {
        SearchOutput::Found(hash, _) => Ok(hash),
        SearchOutput::NotFound(_) => Err(ReachabilityError::DataInconsistency),
    }
}

fn insert_to_future_covering_set(store: &mut dyn ReachabilityStore, block: Hash, fci: Hash) -> Result<()> {
    let fcs = store.get_future_covering_set(block)?;
    match binary_search_descendant(store, &fcs, fci)? {
        // The new block is already covered by a previous tree block in the
        // future of `block`
        SearchOutput::Found(_, _) => Ok(()),
        SearchOutput::NotFound(insertion_index) => {
            store.insert_future_covering_item(block, fci, insertion_index)?;
            Ok(())
        }
    }
}

enum SearchOutput {
    Found(Hash, usize),
    NotFound(usize),
}

/// Binary searches `ordered_hashes` (ordered by interval start, with disjoint
/// intervals) for a hash which is a chain ancestor of `descendant`. Returns
/// the found item and index, or the insertion index keeping the order.
fn binary_search_descendant(
    store: &dyn ReachabilityStoreReader,
    ordered_hashes: &[Hash],
    descendant: Hash,
) -> Result<SearchOutput> {
    if cfg!(debug_assertions) {
        assert_hashes_ordered(store, ordered_hashes);
    }
    let descendant_start = store.get_interval(descendant)?.start;
    // The partition point is the first hash whose interval starts after the descendant's
    let mut low = 0usize;
    let mut high = ordered_hashes.len();
    while low < high {
        let mid = (low + high) / 2;
        if store.get_interval(ordered_hashes[mid])?.start <= descendant_start {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    if low > 0 && is_chain_ancestor_of(store, ordered_hashes[low - 1], descendant)? {
        Ok(SearchOutput::Found(ordered_hashes[low - 1], low - 1))
    } else {
        Ok(SearchOutput::NotFound(low))
    }
}

fn assert_hashes_ordered(store: &dyn ReachabilityStoreReader, ordered_hashes: &[Hash]) {
    let intervals: Vec<Interval> = ordered_hashes.iter().map(|c| store.get_interval(*c).unwrap()).collect();
    debug_assert!(intervals.as_slice().windows(2).all(|w| w[0].end < w[1].start))
}
