use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A closed integer interval `[start, end]` on the reachability tree line.
/// The interval is empty iff `end == start - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start > 0 && end < u64::MAX && end >= start - 1);
        Interval { start, end }
    }

    pub fn empty() -> Self {
        Self::new(1, 0)
    }

    /// Returns the maximally allowed interval. The interval boundaries are
    /// kept within `1..u64::MAX - 1` so that the edges never overflow when an
    /// empty sub-interval is carved at either end.
    pub fn maximal() -> Self {
        Self::new(1, u64::MAX - 1)
    }

    pub fn size(&self) -> u64 {
        // Empty intervals are indicated by `self.end == self.start - 1`, so
        // we avoid the overflow by checking emptiness first
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start - 1
    }

    pub fn increase_start(&self, offset: u64) -> Self {
        Self::new(self.start + offset, self.end)
    }

    pub fn decrease_end(&self, offset: u64) -> Self {
        Self::new(self.start, self.end - offset)
    }

    /// Returns the empty interval lying right after this interval's end
    pub fn empty_after(&self) -> Self {
        Self::new(self.end + 1, self.end)
    }

    pub fn contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn strictly_contains(&self, other: Self) -> bool {
        self.start <= other.start && other.end < self.end
    }

    /// Splits this interval into two halves
    pub fn split_half(&self) -> (Self, Self) {
        self.split_fraction(0.5)
    }

    /// Splits this interval to two parts where the first part takes the given fraction
    fn split_fraction(&self, fraction: f64) -> (Self, Self) {
        let left_size = (self.size() as f64 * fraction) as u64;
        (Self::new(self.start, self.start + left_size - 1), Self::new(self.start + left_size, self.end))
    }

    /// Splits this interval to exactly `sizes.len()` parts where the size of each
    /// part i is sizes[i]. Expects the interval size to be exactly equal to the sum of sizes.
    pub fn split_exact(&self, sizes: &[u64]) -> Vec<Self> {
        debug_assert_eq!(sizes.iter().sum::<u64>(), self.size(), "sum of sizes must be equal to the interval size");
        let mut start = self.start;
        sizes
            .iter()
            .map(|size| {
                let interval = Self::new(start, start + size - 1);
                start += size;
                interval
            })
            .collect()
    }

    /// Splits this interval into `sizes.len()` parts where part i is at least of
    /// size sizes[i], with the remaining space distributed proportionally to the
    /// required sizes. Expects the interval size to be no less than the sum of sizes.
    pub fn split_proportional(&self, sizes: &[u64]) -> Vec<Self> {
        let interval_size = self.size();
        let sizes_sum: u64 = sizes.iter().sum();
        debug_assert!(interval_size >= sizes_sum, "interval must be large enough to contain all sizes");
        if interval_size == sizes_sum {
            return self.split_exact(sizes);
        }
        // Add a proportional share of the slack to each size. Rounding leftovers
        // are handed to the last part.
        let slack = interval_size - sizes_sum;
        let mut biased: Vec<u64> =
            sizes.iter().map(|&size| size + (slack as u128 * size as u128 / sizes_sum as u128) as u64).collect();
        let used: u64 = biased.iter().sum();
        *biased.last_mut().unwrap() += interval_size - used;
        self.split_exact(&biased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_basics() {
        let interval = Interval::new(101, 164);
        assert_eq!(interval.size(), 64);
        assert!(!interval.is_empty());
        assert_eq!(Interval::empty().size(), 0);
        assert!(Interval::empty().is_empty());
        assert_eq!(interval.empty_after(), Interval::new(165, 164));
        assert!(interval.empty_after().is_empty());
    }

    #[test]
    fn test_split_half() {
        let (left, right) = Interval::new(1, 100).split_half();
        assert_eq!(left, Interval::new(1, 50));
        assert_eq!(right, Interval::new(51, 100));
        assert_eq!(left.size() + right.size(), 100);
    }

    #[test]
    fn test_split_exact() {
        let splits = Interval::new(1, 100).split_exact(&[50, 20, 20, 10]);
        assert_eq!(splits.len(), 4);
        assert_eq!(splits[0], Interval::new(1, 50));
        assert_eq!(splits[3], Interval::new(91, 100));
        assert_eq!(splits.iter().map(|i| i.size()).sum::<u64>(), 100);
    }

    #[test]
    fn test_split_proportional() {
        let interval = Interval::new(1, 100);
        let splits = interval.split_proportional(&[10, 10]);
        assert_eq!(splits.len(), 2);
        assert_eq!(splits.iter().map(|i| i.size()).sum::<u64>(), interval.size());
        // Parts are contiguous and at least the required size
        assert_eq!(splits[0].end + 1, splits[1].start);
        assert!(splits[0].size() >= 10 && splits[1].size() >= 10);

        // Unequal weights get proportionally unequal shares
        let splits = interval.split_proportional(&[5, 15]);
        assert!(splits[1].size() > splits[0].size());
        assert_eq!(splits.iter().map(|i| i.size()).sum::<u64>(), interval.size());
    }

    #[test]
    fn test_containment() {
        let outer = Interval::new(10, 100);
        assert!(outer.contains(Interval::new(10, 100)));
        assert!(!outer.strictly_contains(Interval::new(10, 100)));
        assert!(outer.strictly_contains(Interval::new(10, 99)));
        assert!(!outer.contains(Interval::new(9, 100)));
    }
}
