pub mod perf {
    /// Default cache size for stores keyed by block hash
    pub const DEFAULT_CACHE_SIZE: u64 = 100_000;

    /// Default cache size for stores holding heavyweight data (full blocks, UTXO diffs)
    pub const LARGE_DATA_CACHE_SIZE: u64 = 2_000;
}

/// Capacity of the signature verification cache
pub const SIG_CACHE_SIZE: u64 = 10_000;
