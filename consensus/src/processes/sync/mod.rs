use crate::model::stores::ghostdag::GhostdagStoreReader;
use norn_database::prelude::StoreError;
use norn_hashes::Hash;

/// Builds an exponentially-spaced block locator: a list of selected-chain
/// hashes walking back from `high` towards `low`, with step sizes doubling
/// after each hop. The locator always ends with `low` itself, letting the
/// receiving peer find the highest shared chain block in O(log n) exchanged hashes.
pub fn create_block_locator(
    ghostdag_store: &impl GhostdagStoreReader,
    low: Hash,
    high: Hash,
    limit: usize,
) -> Result<Vec<Hash>, StoreError> {
    let low_blue_score = ghostdag_store.get_blue_score(low)?;
    let mut locator = Vec::new();
    let mut current = high;
    let mut step = 1u64;
    loop {
        locator.push(current);
        if current == low || (limit > 0 && locator.len() >= limit) {
            break;
        }
        let mut current_blue_score = ghostdag_store.get_blue_score(current)?;
        // Walk `step` blocks up the selected parent chain, clamping at `low`
        for _ in 0..step {
            if current_blue_score <= low_blue_score || current == low {
                break;
            }
            current = ghostdag_store.get_selected_parent(current)?;
            current_blue_score = ghostdag_store.get_blue_score(current)?;
        }
        if current_blue_score <= low_blue_score {
            current = low;
        }
        step *= 2;
    }
    if *locator.last().unwrap() != low && (limit == 0 || locator.len() < limit) {
        locator.push(low);
    }
    Ok(locator)
}
