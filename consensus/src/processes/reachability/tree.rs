//!
//! Tree-related functions internal to the module
//!
use super::{interval::Interval, reindex::ReindexOperationContext, Result};
use crate::model::stores::reachability::ReachabilityStore;
use norn_hashes::Hash;

/// The interval portion of `node` available for child allocations. The last
/// slot is reserved for the node itself, keeping child intervals strict
/// sub-intervals of their parent.
pub fn interval_children_capacity(store: &dyn ReachabilityStore, node: Hash) -> Result<Interval> {
    Ok(store.get_interval(node)?.decrease_end(1))
}

/// The remaining free capacity of `node`, following the interval of its last child
pub fn interval_remaining_after(store: &dyn ReachabilityStore, node: Hash) -> Result<Interval> {
    let capacity = interval_children_capacity(store, node)?;
    match store.get_children(node)?.last() {
        Some(last_child) => {
            let last_interval = store.get_interval(*last_child)?;
            Ok(Interval::new(last_interval.end + 1, capacity.end))
        }
        None => Ok(capacity),
    }
}

pub fn add_tree_block(store: &mut dyn ReachabilityStore, new_block: Hash, parent: Hash) -> Result<()> {
    // Get the remaining interval capacity
    let remaining = interval_remaining_after(store, parent)?;
    // Append the new child to `parent.children`
    let parent_height = store.append_child(parent, new_block)?;
    if remaining.is_empty() {
        // Init with the empty interval.
        // Note: internal logic relies on interval being this specific interval
        //       which comes exactly at the end of current capacity
        store.insert(new_block, parent, remaining, parent_height + 1)?;

        // Reallocate the exhausted ancestor subtree
        let mut ctx = ReindexOperationContext::new(store);
        ctx.reindex_intervals(new_block)?;
    } else {
        // Allocate half of the remaining space, but never an empty interval
        let allocated = if remaining.size() == 1 { remaining } else { remaining.split_half().0 };
        store.insert(new_block, parent, allocated, parent_height + 1)?;
    };
    Ok(())
}
