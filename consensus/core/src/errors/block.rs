use crate::coinbase::CoinbaseError;
use crate::errors::tx::TxRuleError;
use crate::tx::{TransactionId, TransactionOutpoint};
use norn_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RuleError {
    #[error("wrong block version: got {0} expected {1}")]
    WrongBlockVersion(u16, u16),

    #[error("the block timestamp is too far into the future: block timestamp is {0} but maximum timestamp allowed is {1}")]
    TimeTooFarIntoTheFuture(u64, u64),

    #[error("block has no parents")]
    NoParents,

    #[error("block has {0} parents while the maximum allowed is {1}")]
    TooManyParents(usize, usize),

    #[error("block is already known")]
    DuplicateBlock,

    #[error("block is known to be invalid")]
    KnownInvalid,

    #[error("block parents are missing: {0:?}")]
    MissingParents(Vec<Hash>),

    #[error("the block hash does not satisfy its declared target (invalid proof of work)")]
    InvalidPoW,

    #[error("block difficulty bits are {0} while the expected retarget value is {1}")]
    UnexpectedDifficulty(u32, u32),

    #[error("the block timestamp {0} is not after the past median time {1}")]
    TimeTooOld(u64, u64),

    #[error("block hash merkle root is {0} while the merkle root of its transactions is {1}")]
    BadMerkleRoot(Hash, Hash),

    #[error("block accepted-ID merkle root is {0} while the expected root is {1}")]
    BadAcceptedIDMerkleRoot(Hash, Hash),

    #[error("block UTXO commitment is {0} while the expected commitment is {1}")]
    InvalidUTXOCommitment(Hash, Hash),

    #[error("first block transaction is not a coinbase")]
    FirstTxNotCoinbase,

    #[error("block transaction at index {0} is an extra coinbase")]
    MultipleCoinbases(usize),

    #[error("bad coinbase payload: {0}")]
    BadCoinbasePayload(#[from] CoinbaseError),

    #[error("coinbase declares a blue score of {0} while the block blue score is {1}")]
    BadCoinbaseBlueScore(u64, u64),

    #[error("coinbase pays {0} while the expected total subsidy and fees is {1}")]
    BadCoinbaseAmount(u64, u64),

    #[error("transaction {0} appears more than once in the block")]
    DuplicateTransactions(TransactionId),

    #[error("outpoint {0} is spent more than once within the block")]
    DoubleSpendInSameBlock(TransactionOutpoint),

    #[error("block mergeset size is {0} which exceeds the allowed maximum of {1}")]
    MergesetTooBig(u64, u64),

    #[error("block total transaction mass is {0} which exceeds the allowed maximum of {1}")]
    ExceedsMassLimit(u64, u64),

    #[error("block transaction {0} failed validation: {1}")]
    TxInContextFailed(TransactionId, TxRuleError),

    #[error("block violates the finality rule")]
    FinalityViolation,

    #[error("expected header-only block data but got a block with transactions")]
    NonHeaderOnlyInHeadersPhase,
}

pub type BlockProcessResult<T> = std::result::Result<T, RuleError>;
