use super::{tree::interval_children_capacity, Result};
use crate::errors::ReachabilityError;
use crate::model::stores::reachability::ReachabilityStore;
use norn_consensus_core::{blockhash::BlockHashExtensions, BlockHashMap};
use norn_hashes::Hash;
use std::collections::VecDeque;

pub(super) struct ReindexOperationContext<'a> {
    store: &'a mut dyn ReachabilityStore,
    subtree_sizes: BlockHashMap<u64>,
}

impl<'a> ReindexOperationContext<'a> {
    pub(super) fn new(store: &'a mut dyn ReachabilityStore) -> Self {
        Self { store, subtree_sizes: BlockHashMap::new() }
    }

    /// Traverses up the tree from the new leaf until an ancestor with
    /// sufficient interval capacity is found, then reallocates that ancestor's
    /// entire subtree. The overall cost is amortized logarithmic since interval
    /// allocations halve the available space at each tree level.
    pub(super) fn reindex_intervals(&mut self, new_child: Hash) -> Result<()> {
        let mut current = new_child;
        loop {
            self.count_subtree_sizes(current)?;
            let current_interval = self.store.get_interval(current)?;
            if current_interval.size() >= self.subtree_sizes[&current] {
                break;
            }

            let parent = self.store.get_parent(current)?;
            if parent.is_none() {
                // The exhausted subtree is the whole tree, meaning more than
                // ~2^64 blocks were added. Reaching this is not realistically
                // possible, hence considered fatal.
                return Err(ReachabilityError::DataOverflow(format!(
                    "tree root interval exhausted while reindexing over block {current}"
                )));
            }
            current = parent;
        }

        self.propagate_interval(current)
    }

    /// Counts the size of each subtree under `block` and caches the results.
    /// Implemented iteratively since the tree is expected to be (linearly) deep.
    fn count_subtree_sizes(&mut self, block: Hash) -> Result<()> {
        if self.subtree_sizes.contains_key(&block) {
            return Ok(());
        }

        // BFS ordering guarantees children appear after their parent, so a
        // reversed scan accumulates child counts before they are consumed
        let order = self.bfs_order(block)?;
        for node in order.into_iter().rev() {
            let children = self.store.get_children(node)?;
            let mut size = 1u64;
            for child in children.iter() {
                size += self.subtree_sizes[child];
            }
            self.subtree_sizes.insert(node, size);
        }
        Ok(())
    }

    /// Reallocates the intervals of the entire subtree under `block` within
    /// `block`'s current interval, distributing slack proportionally to
    /// subtree sizes. Relative ordering of siblings is preserved, keeping
    /// future covering sets sorted.
    fn propagate_interval(&mut self, block: Hash) -> Result<()> {
        self.count_subtree_sizes(block)?;
        for node in self.bfs_order(block)? {
            let children = self.store.get_children(node)?;
            if children.is_empty() {
                continue;
            }
            let capacity = interval_children_capacity(self.store, node)?;
            let sizes: Vec<u64> = children.iter().map(|child| self.subtree_sizes[child]).collect();
            let allocations = capacity.split_proportional(&sizes);
            for (child, allocation) in children.iter().zip(allocations) {
                self.store.set_interval(*child, allocation)?;
            }
        }
        Ok(())
    }

    fn bfs_order(&self, block: Hash) -> Result<Vec<Hash>> {
        let mut order = Vec::new();
        let mut queue = VecDeque::from([block]);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            queue.extend(self.store.get_children(current)?.iter());
        }
        Ok(order)
    }
}
