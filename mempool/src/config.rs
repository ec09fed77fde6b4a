/// Maximum number of orphan transactions kept before random eviction kicks in
pub const DEFAULT_MAX_ORPHAN_TRANSACTIONS: usize = 50;

/// An orphan transaction is evicted this many milliseconds after insertion
pub const DEFAULT_ORPHAN_EXPIRE_MILLISECONDS: u64 = 15 * 60 * 1000;

/// Expired orphans are scanned for at most once per this interval, piggybacked
/// on inserts
pub const DEFAULT_ORPHAN_EXPIRE_SCAN_INTERVAL_MILLISECONDS: u64 = 5 * 60 * 1000;

/// Minimum relay fee in motes per kilogram of mass
pub const DEFAULT_MINIMUM_RELAY_TRANSACTION_FEE: u64 = 1000;

/// Maximum mass of a transaction accepted into the orphan pool
pub const DEFAULT_MAXIMUM_ORPHAN_TRANSACTION_MASS: u64 = 10_000;

/// Outputs below this value are considered dust and rejected by policy
pub const DEFAULT_DUST_THRESHOLD: u64 = 546;

#[derive(Clone, Debug)]
pub struct Config {
    pub maximum_orphan_transaction_count: usize,
    pub maximum_orphan_transaction_mass: u64,
    pub orphan_expire_milliseconds: u64,
    pub orphan_expire_scan_interval_milliseconds: u64,
    pub minimum_relay_transaction_fee: u64,
    pub dust_threshold: u64,
    /// Skip policy (standardness/fee) checks; consensus checks always apply
    pub accept_non_standard: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maximum_orphan_transaction_count: DEFAULT_MAX_ORPHAN_TRANSACTIONS,
            maximum_orphan_transaction_mass: DEFAULT_MAXIMUM_ORPHAN_TRANSACTION_MASS,
            orphan_expire_milliseconds: DEFAULT_ORPHAN_EXPIRE_MILLISECONDS,
            orphan_expire_scan_interval_milliseconds: DEFAULT_ORPHAN_EXPIRE_SCAN_INTERVAL_MILLISECONDS,
            minimum_relay_transaction_fee: DEFAULT_MINIMUM_RELAY_TRANSACTION_FEE,
            dust_threshold: DEFAULT_DUST_THRESHOLD,
            accept_non_standard: false,
        }
    }
}
