use norn_math::Uint256;

/// Converts a compact difficulty `bits` value to the expected number of hash
/// attempts it represents (`2^256 / (target + 1)`). Blocks carrying invalid
/// bits are rejected beforehand, so this treats them as zero work.
pub fn calc_work(bits: u32) -> Uint256 {
    match Uint256::from_compact_target_bits(bits) {
        Some(target) => Uint256::work_from_target(target),
        None => Uint256::ZERO,
    }
}

/// A sample of a past block consulted by the retarget calculation
#[derive(Clone, Copy, Debug)]
pub struct DifficultyBlock {
    pub timestamp: u64,
    pub bits: u32,
}

/// Computes the required difficulty of a new block from a window of its chain
/// ancestors, retargeting so that block rate converges to one block per
/// `target_time_per_block` milliseconds.
#[derive(Clone)]
pub struct DifficultyManager {
    window_size: usize,
    target_time_per_block: u64,
    max_target: Uint256,
    genesis_bits: u32,
}

impl DifficultyManager {
    pub fn new(window_size: usize, target_time_per_block: u64, max_target: Uint256, genesis_bits: u32) -> Self {
        Self { window_size, target_time_per_block, max_target, genesis_bits }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `window` is expected to hold up to `window_size` samples of the blocks
    /// closest to the new block, unordered.
    pub fn calc_required_bits(&self, window: &[DifficultyBlock]) -> u32 {
        // Until the window is populated we keep the most recent known
        // difficulty (the genesis one on a fresh DAG)
        if window.len() < 2 {
            return window.first().map(|block| block.bits).unwrap_or(self.genesis_bits);
        }

        let min_timestamp = window.iter().map(|block| block.timestamp).min().unwrap();
        let max_timestamp = window.iter().map(|block| block.timestamp).max().unwrap();
        let expected_duration = self.target_time_per_block * (window.len() as u64 - 1);
        // Clamp the measured duration so a burst of skewed timestamps cannot
        // swing the difficulty by more than 4x per retarget
        let actual_duration = (max_timestamp - min_timestamp).clamp(expected_duration / 4, expected_duration * 4).max(1);

        let average_target = self.average_target(window);
        let new_target = Self::scale_target(average_target, actual_duration, expected_duration);
        if new_target > self.max_target {
            self.max_target.compact_target_bits()
        } else {
            new_target.compact_target_bits()
        }
    }

    fn average_target(&self, window: &[DifficultyBlock]) -> Uint256 {
        let count = window.len() as u64;
        let mut acc = Uint256::ZERO;
        for block in window {
            let target = Uint256::from_compact_target_bits(block.bits).unwrap_or(self.max_target);
            acc += target.div_u64(count);
        }
        acc
    }

    /// `target * duration / expected`, pre-shifting so the multiplication
    /// cannot overflow 256 bits
    fn scale_target(target: Uint256, duration: u64, expected: u64) -> Uint256 {
        let shift = target.bits().saturating_sub(190);
        ((target >> shift).wrapping_mul_u64(duration).div_u64(expected)) << shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_BITS: u32 = 0x207fffff;

    fn manager() -> DifficultyManager {
        DifficultyManager::new(10, 1000, Uint256::from_compact_target_bits(GENESIS_BITS).unwrap(), GENESIS_BITS)
    }

    #[test]
    fn test_calc_work_monotonic() {
        // A smaller target means more expected work
        let easy = calc_work(0x207fffff);
        let hard = calc_work(0x1d00ffff);
        assert!(hard > easy);
        assert_eq!(calc_work(0x1d80ffff), Uint256::ZERO); // sign bit is invalid
    }

    #[test]
    fn test_short_window_keeps_genesis_bits() {
        let manager = manager();
        assert_eq!(manager.calc_required_bits(&[]), GENESIS_BITS);
        assert_eq!(manager.calc_required_bits(&[DifficultyBlock { timestamp: 0, bits: GENESIS_BITS }]), GENESIS_BITS);
    }

    #[test]
    fn test_fast_blocks_raise_difficulty() {
        let manager = DifficultyManager::new(10, 1000, Uint256::MAX, 0x1e7fffff);
        // Ten blocks only 100ms apart: the new target must shrink
        let window: Vec<DifficultyBlock> =
            (0..10).map(|i| DifficultyBlock { timestamp: i * 100, bits: 0x1e7fffff }).collect();
        let new_bits = manager.calc_required_bits(&window);
        let new_target = Uint256::from_compact_target_bits(new_bits).unwrap();
        let old_target = Uint256::from_compact_target_bits(0x1e7fffff).unwrap();
        assert!(new_target < old_target);
    }

    #[test]
    fn test_slow_blocks_lower_difficulty() {
        let manager = DifficultyManager::new(10, 1000, Uint256::MAX, 0x1e7fffff);
        let window: Vec<DifficultyBlock> =
            (0..10).map(|i| DifficultyBlock { timestamp: i * 3000, bits: 0x1e7fffff }).collect();
        let new_bits = manager.calc_required_bits(&window);
        let new_target = Uint256::from_compact_target_bits(new_bits).unwrap();
        let old_target = Uint256::from_compact_target_bits(0x1e7fffff).unwrap();
        assert!(new_target > old_target);
    }

    #[test]
    fn test_on_pace_keeps_target_stable() {
        let manager = DifficultyManager::new(10, 1000, Uint256::MAX, 0x1e7fffff);
        let window: Vec<DifficultyBlock> =
            (0..10).map(|i| DifficultyBlock { timestamp: i * 1000, bits: 0x1e7fffff }).collect();
        let new_bits = manager.calc_required_bits(&window);
        // Compact form rounding keeps the result within one mantissa step
        let new_target = Uint256::from_compact_target_bits(new_bits).unwrap();
        let old_target = Uint256::from_compact_target_bits(0x1e7fffff).unwrap();
        let ratio_ok = new_target <= old_target.wrapping_mul_u64(2) && old_target <= new_target.wrapping_mul_u64(2);
        assert!(ratio_ok);
    }
}
