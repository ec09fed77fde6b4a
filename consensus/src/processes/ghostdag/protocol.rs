use crate::model::stores::{
    ghostdag::{GhostdagData, GhostdagStoreReader, HashKTypeMap},
    headers::HeaderStoreReader,
    reachability::ReachabilityStoreReader,
    relations::RelationsStoreReader,
};
use crate::processes::difficulty::calc_work;
use crate::processes::reachability::inquirer::is_dag_ancestor_of;
use itertools::Itertools;
use norn_consensus_core::{blockhash::ORIGIN, BlockHashMap, BlueWorkType};
use norn_hashes::Hash;
use std::sync::Arc;

use super::mergeset::unordered_mergeset_without_selected_parent;
use super::ordering::SortableBlock;

/// The GHOSTDAG protocol: computes for each block its selected parent, its
/// blue/red mergeset partition (the largest k-cluster), and the accumulated
/// blue score and blue work.
pub struct GhostdagManager {
    genesis_hash: Hash,
    pub(crate) k: u8,
}

impl GhostdagManager {
    pub fn new(genesis_hash: Hash, k: u8) -> Self {
        Self { genesis_hash, k }
    }

    pub fn genesis_ghostdag_data(&self) -> GhostdagData {
        GhostdagData::new(
            0,
            Default::default(),
            ORIGIN,
            Default::default(),
            Default::default(),
            HashKTypeMap::new(BlockHashMap::new()),
        )
    }

    /// Chooses the parent with the maximal blue work; ties are broken by
    /// preferring the lexicographically smaller hash, keeping the choice
    /// deterministic across nodes.
    pub fn find_selected_parent(&self, ghostdag_store: &impl GhostdagStoreReader, parents: &[Hash]) -> Hash {
        let mut selected = parents[0];
        let mut selected_blue_work = ghostdag_store.get_blue_work(selected).unwrap();
        for parent in parents.iter().skip(1).cloned() {
            let blue_work = ghostdag_store.get_blue_work(parent).unwrap();
            if blue_work > selected_blue_work || (blue_work == selected_blue_work && parent < selected) {
                selected = parent;
                selected_blue_work = blue_work;
            }
        }
        selected
    }

    /// Runs the GHOSTDAG protocol and calculates the block data for the block
    /// with the given parents
    pub fn ghostdag(
        &self,
        ghostdag_store: &impl GhostdagStoreReader,
        relations_store: &impl RelationsStoreReader,
        reachability: &impl ReachabilityStoreReader,
        headers_store: &impl HeaderStoreReader,
        parents: &[Hash],
    ) -> GhostdagData {
        assert!(!parents.is_empty(), "genesis must be added via a call to init");

        let selected_parent = self.find_selected_parent(ghostdag_store, parents);
        let mut new_block_data = GhostdagData::new_with_selected_parent(selected_parent, self.k);

        // Iterate the mergeset in ascending (blue_work, hash) order, so that
        // candidates with more accumulated work are considered first
        let mergeset = self.sorted_mergeset(ghostdag_store, relations_store, reachability, selected_parent, parents);

        for blue_candidate in mergeset {
            let coloring = self.check_blue_candidate(ghostdag_store, reachability, &new_block_data, blue_candidate);

            if let ColoringOutput::Blue(blue_anticone_size, blues_anticone_sizes) = coloring {
                // No k-cluster violation found, we can now set the candidate block as blue
                new_block_data.add_blue(blue_candidate, blue_anticone_size, &blues_anticone_sizes);
            } else {
                new_block_data.add_red(blue_candidate);
            }
        }

        let blue_score = ghostdag_store.get_blue_score(selected_parent).unwrap() + new_block_data.mergeset_blues.len() as u64;
        let added_blue_work: BlueWorkType = new_block_data
            .mergeset_blues
            .iter()
            .cloned()
            .map(|hash| calc_work(headers_store.get_bits(hash).unwrap()))
            .fold(Default::default(), |acc: BlueWorkType, work| acc.checked_add(work).expect("blue work overflow"));
        let blue_work = ghostdag_store.get_blue_work(selected_parent).unwrap().checked_add(added_blue_work).expect("blue work overflow");

        new_block_data.finalize_score_and_work(blue_score, blue_work);
        new_block_data
    }

    fn sorted_mergeset(
        &self,
        ghostdag_store: &impl GhostdagStoreReader,
        relations_store: &impl RelationsStoreReader,
        reachability: &impl ReachabilityStoreReader,
        selected_parent: Hash,
        parents: &[Hash],
    ) -> Vec<Hash> {
        unordered_mergeset_without_selected_parent(relations_store, reachability, selected_parent, parents)
            .into_iter()
            .map(|hash| SortableBlock::new(hash, ghostdag_store.get_blue_work(hash).unwrap()))
            .sorted()
            .map(|sortable| sortable.hash)
            .collect()
    }

    fn check_blue_candidate(
        &self,
        ghostdag_store: &impl GhostdagStoreReader,
        reachability: &impl ReachabilityStoreReader,
        new_block_data: &GhostdagData,
        blue_candidate: Hash,
    ) -> ColoringOutput {
        // The maximum length of new_block_data.mergeset_blues can be K+1 because
        // it contains the selected parent.
        if new_block_data.mergeset_blues.len() as u64 == self.k as u64 + 1 {
            return ColoringOutput::Red;
        }

        let mut candidate_blues_anticone_sizes: BlockHashMap<u8> = BlockHashMap::with_capacity(self.k as usize);
        // Iterate over all blocks in the blue past of the new block that are not in the past
        // of blue_candidate, and check for each one of them if blue_candidate potentially
        // enlarges their blue anticone to be over K, or that they enlarge the blue anticone
        // of blue_candidate to be over K.
        let mut chain_block = ChainBlock { hash: None, data: CowData::Borrowed(new_block_data) };
        let mut candidate_blue_anticone_size: u8 = 0;

        loop {
            match self.check_blue_candidate_with_chain_block(
                ghostdag_store,
                reachability,
                new_block_data,
                &chain_block,
                blue_candidate,
                &mut candidate_blues_anticone_sizes,
                &mut candidate_blue_anticone_size,
            ) {
                ChainBlockVerdict::Blue => return ColoringOutput::Blue(candidate_blue_anticone_size, candidate_blues_anticone_sizes),
                ChainBlockVerdict::Red => return ColoringOutput::Red,
                ChainBlockVerdict::Undecided => {}
            }

            let next_hash = chain_block.data.selected_parent();
            if next_hash == ORIGIN {
                // The whole known chain was traversed without a k-cluster
                // violation, so the candidate is blue
                return ColoringOutput::Blue(candidate_blue_anticone_size, candidate_blues_anticone_sizes);
            }
            chain_block = ChainBlock {
                hash: Some(next_hash),
                data: CowData::Owned(ghostdag_store.get_data(next_hash).unwrap()),
            };
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_blue_candidate_with_chain_block(
        &self,
        ghostdag_store: &impl GhostdagStoreReader,
        reachability: &impl ReachabilityStoreReader,
        new_block_data: &GhostdagData,
        chain_block: &ChainBlock<'_>,
        blue_candidate: Hash,
        candidate_blues_anticone_sizes: &mut BlockHashMap<u8>,
        candidate_blue_anticone_size: &mut u8,
    ) -> ChainBlockVerdict {
        // If blue_candidate is in the future of chain_block, it means
        // that all remaining blues are in the past of chain_block and thus
        // in the past of blue_candidate. In this case we know for sure that
        // the anticone of blue_candidate will not exceed K, and we can mark
        // it as blue.
        //
        // The new block is always in the future of blue_candidate, so there's
        // no point in checking it.
        if let Some(hash) = chain_block.hash {
            if is_dag_ancestor_of(reachability, hash, blue_candidate).unwrap() {
                return ChainBlockVerdict::Blue;
            }
        }

        for &block in chain_block.data.mergeset_blues().iter() {
            // Skip blocks that exist in the past of blue_candidate.
            if is_dag_ancestor_of(reachability, block, blue_candidate).unwrap() {
                continue;
            }

            candidate_blues_anticone_sizes.insert(block, self.blue_anticone_size(ghostdag_store, block, new_block_data));

            *candidate_blue_anticone_size += 1;
            if *candidate_blue_anticone_size > self.k {
                // k-cluster violation: The candidate's blue anticone exceeded k
                return ChainBlockVerdict::Red;
            }

            if candidate_blues_anticone_sizes[&block] == self.k {
                // k-cluster violation: A block in candidate's blue anticone already
                // has k blue blocks in its own anticone
                return ChainBlockVerdict::Red;
            }

            // This is a sanity check that validates that a blue
            // block's blue anticone is not already larger than K.
            assert!(candidate_blues_anticone_sizes[&block] <= self.k, "found blue anticone larger than K");
        }

        ChainBlockVerdict::Undecided
    }

    /// Returns the blue anticone size of `block` from the worldview of `context`.
    /// Expects `block` to be in the blue set of `context`.
    fn blue_anticone_size(&self, ghostdag_store: &impl GhostdagStoreReader, block: Hash, context: &GhostdagData) -> u8 {
        let mut current_blues_anticone_sizes = HashKTypeMap::clone(&context.blues_anticone_sizes);
        let mut current_selected_parent = context.selected_parent;
        loop {
            if let Some(size) = current_blues_anticone_sizes.get(&block) {
                return *size;
            }

            if current_selected_parent == self.genesis_hash || current_selected_parent == ORIGIN {
                panic!("block {block} is not in blue set of the given context");
            }

            current_blues_anticone_sizes = ghostdag_store.get_blues_anticone_sizes(current_selected_parent).unwrap();
            current_selected_parent = ghostdag_store.get_selected_parent(current_selected_parent).unwrap();
        }
    }
}

/// Chain block data: either the new block under construction (no hash yet) or
/// a stored chain ancestor
struct ChainBlock<'a> {
    hash: Option<Hash>,
    data: CowData<'a>,
}

enum CowData<'a> {
    Borrowed(&'a GhostdagData),
    Owned(Arc<GhostdagData>),
}

impl CowData<'_> {
    fn selected_parent(&self) -> Hash {
        match self {
            Self::Borrowed(data) => data.selected_parent,
            Self::Owned(data) => data.selected_parent,
        }
    }

    fn mergeset_blues(&self) -> &[Hash] {
        match self {
            Self::Borrowed(data) => &data.mergeset_blues,
            Self::Owned(data) => &data.mergeset_blues,
        }
    }
}

enum ColoringOutput {
    /// The candidate is blue, with its blue anticone size and the updated
    /// anticone sizes of affected blues
    Blue(u8, BlockHashMap<u8>),
    Red,
}

enum ChainBlockVerdict {
    Blue,
    Red,
    Undecided,
}
