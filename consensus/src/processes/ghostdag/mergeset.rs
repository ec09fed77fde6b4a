use crate::model::stores::reachability::ReachabilityStoreReader;
use crate::model::stores::relations::RelationsStoreReader;
use crate::processes::reachability::inquirer::is_dag_ancestor_of;
use norn_consensus_core::BlockHashSet;
use norn_hashes::Hash;
use std::collections::VecDeque;

/// Computes the mergeset of a block with the given parents: all blocks in the
/// past of the parents which are not in the past of `selected_parent` (and are
/// not the selected parent itself).
pub fn unordered_mergeset_without_selected_parent(
    relations: &impl RelationsStoreReader,
    reachability: &impl ReachabilityStoreReader,
    selected_parent: Hash,
    parents: &[Hash],
) -> BlockHashSet {
    let mut queue: VecDeque<Hash> = parents.iter().copied().filter(|p| *p != selected_parent).collect();
    let mut mergeset: BlockHashSet = queue.iter().copied().collect();
    let mut past = BlockHashSet::new();

    while let Some(current) = queue.pop_front() {
        let current_parents = relations.get_parents(current).unwrap();

        // For each parent of the current block we check whether it is in the
        // past of the selected parent. If not, we add it to the mergeset and queue it.
        for parent in current_parents.iter().cloned() {
            if mergeset.contains(&parent) || past.contains(&parent) {
                continue;
            }

            if is_dag_ancestor_of(reachability, parent, selected_parent).unwrap() {
                past.insert(parent);
                continue;
            }

            mergeset.insert(parent);
            queue.push_back(parent);
        }
    }

    mergeset
}
