/// BLOCK_VERSION represents the current block version
pub const BLOCK_VERSION: u16 = 1;

/// TX_VERSION is the current latest supported transaction version.
pub const TX_VERSION: u16 = 1;

/// The maximum number of parents a block may reference
pub const MAX_BLOCK_PARENTS: usize = 255;

pub const LOCK_TIME_THRESHOLD: u64 = 500_000_000_000;

/// MOTES_PER_NORN is the number of motes in one norn (1 NORN).
pub const MOTES_PER_NORN: u64 = 100_000_000;

/// MAX_MOTES is the maximum transaction amount allowed in motes.
pub const MAX_MOTES: u64 = 21_000_000_000 * MOTES_PER_NORN;

/// MAX_TX_IN_SEQUENCE_NUM is the maximum sequence number the sequence field
/// of a transaction input can be.
pub const MAX_TX_IN_SEQUENCE_NUM: u64 = u64::MAX;

/// SEQUENCE_LOCK_TIME_MASK is a mask that extracts the relative lock time
/// when masked against the transaction input sequence number.
pub const SEQUENCE_LOCK_TIME_MASK: u64 = 0x00000000ffffffff;

/// SEQUENCE_LOCK_TIME_DISABLED is a flag that if set on a transaction
/// input's sequence number, the sequence number will not be interpreted
/// as a relative lock time.
pub const SEQUENCE_LOCK_TIME_DISABLED: u64 = 1 << 63;

/// UNACCEPTED_BLUE_SCORE marks UtxoEntries that were created by transactions
/// in the mempool, or otherwise not-yet-accepted transactions.
pub const UNACCEPTED_BLUE_SCORE: u64 = u64::MAX;
