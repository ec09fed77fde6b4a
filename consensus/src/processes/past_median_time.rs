/// Computes the past median time over a window of past block timestamps
#[derive(Clone)]
pub struct PastMedianTimeManager {
    window_size: usize,
    genesis_timestamp: u64,
}

impl PastMedianTimeManager {
    pub fn new(window_size: usize, genesis_timestamp: u64) -> Self {
        Self { window_size, genesis_timestamp }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `timestamps` is expected to hold up to `window_size` timestamps of the
    /// blocks closest to the queried block, unordered
    pub fn calc_past_median_time(&self, mut timestamps: Vec<u64>) -> u64 {
        if timestamps.is_empty() {
            return self.genesis_timestamp;
        }
        timestamps.sort_unstable();
        timestamps[timestamps.len() / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        let manager = PastMedianTimeManager::new(5, 100);
        assert_eq!(manager.calc_past_median_time(vec![]), 100);
        assert_eq!(manager.calc_past_median_time(vec![7]), 7);
        assert_eq!(manager.calc_past_median_time(vec![3, 9, 5]), 5);
        assert_eq!(manager.calc_past_median_time(vec![10, 2, 8, 4]), 8);
    }
}
