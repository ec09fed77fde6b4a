//!
//! Test utils and property tests for reachability
//!
use super::{inquirer::*, tree::add_tree_block};
use crate::model::stores::{
    reachability::{MemoryReachabilityStore, ReachabilityStore, ReachabilityStoreReader},
    relations::{MemoryRelationsStore, RelationsStore, RelationsStoreReader},
};
use norn_consensus_core::{
    blockhash::{BlockHashes, ORIGIN},
    BlockHashSet,
};
use norn_database::prelude::MemoryWriter;
use norn_hashes::Hash;
use std::collections::VecDeque;

/// A struct with fluent API to streamline tree building
pub struct TreeBuilder<'a, T: ReachabilityStore + ?Sized> {
    store: &'a mut T,
}

impl<'a, T: ReachabilityStore + ?Sized> TreeBuilder<'a, T> {
    pub fn new(store: &'a mut T) -> Self {
        Self { store }
    }

    pub fn init(&mut self) -> &mut Self {
        init(self.store).unwrap();
        self
    }

    pub fn add_block(&mut self, hash: Hash, parent: Hash) -> &mut Self {
        add_tree_block(self.store, hash, parent).unwrap();
        self
    }

    pub fn store(&self) -> &&'a mut T {
        &self.store
    }
}

/// A struct with fluent API to streamline DAG building, maintaining relations
/// alongside reachability and deriving each block's mergeset naively
pub struct DagBuilder<'a> {
    reachability: &'a mut MemoryReachabilityStore,
    relations: MemoryRelationsStore,
}

impl<'a> DagBuilder<'a> {
    pub fn new(reachability: &'a mut MemoryReachabilityStore) -> Self {
        Self { reachability, relations: MemoryRelationsStore::new() }
    }

    pub fn init(&mut self) -> &mut Self {
        init(self.reachability).unwrap();
        self.relations.insert(MemoryWriter, ORIGIN, BlockHashes::new(vec![])).unwrap();
        self
    }

    /// Adds a block with the given parents; the first parent plays the role of
    /// the selected parent
    pub fn add_block(&mut self, hash: Hash, parents: Vec<Hash>) -> &mut Self {
        let selected_parent = parents[0];
        let mergeset = self.mergeset(&parents, selected_parent);
        self.relations.insert(MemoryWriter, hash, BlockHashes::new(parents)).unwrap();
        add_block(self.reachability, hash, selected_parent, &mut mergeset.into_iter()).unwrap();
        self
    }

    /// The past of the new block minus the past of its selected parent
    /// (the selected parent excluded), computed by a naive BFS
    fn mergeset(&self, parents: &[Hash], selected_parent: Hash) -> Vec<Hash> {
        let selected_parent_past = self.past(selected_parent);
        let mut mergeset = BlockHashSet::new();
        let mut queue: VecDeque<Hash> = parents.iter().copied().filter(|p| *p != selected_parent).collect();
        while let Some(current) = queue.pop_front() {
            if selected_parent_past.contains(&current) || current == selected_parent || !mergeset.insert(current) {
                continue;
            }
            queue.extend(self.relations.get_parents(current).unwrap().iter().filter(|p| **p != ORIGIN));
        }
        mergeset.into_iter().collect()
    }

    /// The full past of `block` (exclusive), computed by a naive BFS
    pub fn past(&self, block: Hash) -> BlockHashSet {
        let mut past = BlockHashSet::new();
        let mut queue: VecDeque<Hash> = self.relations.get_parents(block).unwrap().iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if current == ORIGIN || !past.insert(current) {
                continue;
            }
            queue.extend(self.relations.get_parents(current).unwrap().iter());
        }
        past
    }

    pub fn blocks(&self) -> Vec<Hash> {
        // All inserted blocks minus the origin
        let mut queue = VecDeque::from([ORIGIN]);
        let mut visited = BlockHashSet::new();
        while let Some(current) = queue.pop_front() {
            for child in self.relations.get_children(current).unwrap().iter() {
                if visited.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        visited.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_tree_ancestry_basic() {
        // Builds the following tree:
        //      1
        //    / | \
        //   2  3  4
        //      |
        //      5
        let mut store = MemoryReachabilityStore::new();
        let root: Hash = 1.into();
        TreeBuilder::new(&mut store)
            .init()
            .add_block(root, ORIGIN)
            .add_block(2.into(), root)
            .add_block(3.into(), root)
            .add_block(4.into(), root)
            .add_block(5.into(), 3.into());

        assert!(is_chain_ancestor_of(&store, root, 5.into()).unwrap());
        assert!(is_chain_ancestor_of(&store, 3.into(), 5.into()).unwrap());
        assert!(!is_chain_ancestor_of(&store, 2.into(), 5.into()).unwrap());
        assert!(!is_chain_ancestor_of(&store, 5.into(), 3.into()).unwrap());
        assert!(is_chain_ancestor_of(&store, 5.into(), 5.into()).unwrap());
        assert_eq!(get_next_chain_ancestor(&store, 5.into(), root).unwrap(), 3.into());
    }

    #[test]
    fn test_deep_chain_triggers_reindex() {
        // A deep chain halves the available interval at each level, so the
        // allocation must eventually be rebalanced for the chain to continue
        let mut store = MemoryReachabilityStore::new();
        let mut builder = TreeBuilder::new(&mut store);
        builder.init();
        let mut parent = ORIGIN;
        for i in 1..=200u64 {
            builder.add_block(i.into(), parent);
            parent = i.into();
        }
        // Tree ancestry remains correct across reallocation
        for i in 1..200u64 {
            assert!(is_chain_ancestor_of(&store, i.into(), 200.into()).unwrap(), "chain block {i} must remain an ancestor");
        }
        assert!(!is_chain_ancestor_of(&store, 200.into(), 1.into()).unwrap());
    }

    #[test]
    fn test_dag_ancestry_simple_merge() {
        //   ORIGIN <- 1 <- 2 <- 4 (selected chain)
        //              \<- 3 </
        let mut store = MemoryReachabilityStore::new();
        let mut builder = DagBuilder::new(&mut store);
        builder
            .init()
            .add_block(1.into(), vec![ORIGIN])
            .add_block(2.into(), vec![1.into()])
            .add_block(3.into(), vec![1.into()])
            .add_block(4.into(), vec![2.into(), 3.into()]);

        // Block 3 is merged by 4 through a non-tree edge
        assert!(is_dag_ancestor_of(&store, 3.into(), 4.into()).unwrap());
        assert!(!is_chain_ancestor_of(&store, 3.into(), 4.into()).unwrap());
        assert!(is_dag_ancestor_of(&store, 1.into(), 4.into()).unwrap());
        assert!(!is_dag_ancestor_of(&store, 4.into(), 3.into()).unwrap());
        assert!(!is_dag_ancestor_of(&store, 2.into(), 3.into()).unwrap());
    }

    #[test]
    fn test_random_dag_vs_naive_bfs() {
        // The reachability oracle must agree with a naive BFS over a random DAG
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let mut store = MemoryReachabilityStore::new();
        let mut builder = DagBuilder::new(&mut store);
        builder.init();
        builder.add_block(1.into(), vec![ORIGIN]);

        let mut blocks: Vec<Hash> = vec![1.into()];
        for i in 2..=220u64 {
            let num_parents = rng.gen_range(1..=3.min(blocks.len()));
            let mut parents = Vec::with_capacity(num_parents);
            while parents.len() < num_parents {
                let candidate = blocks[rng.gen_range(0..blocks.len())];
                if !parents.contains(&candidate) {
                    parents.push(candidate);
                }
            }
            builder.add_block(i.into(), parents);
            blocks.push(i.into());
        }

        for &a in blocks.iter() {
            let past_a = builder.past(a);
            for &b in blocks.iter() {
                let expected = a == b || past_a.contains(&b);
                assert_eq!(
                    is_dag_ancestor_of(builder.reachability, b, a).unwrap(),
                    expected,
                    "disagreement for ancestor query ({b}, {a})"
                );
            }
        }
    }
}
