use norn_consensus_core::errors::tx::TxRuleError as ConsensusTxRuleError;
use norn_consensus_core::tx::{TransactionId, TransactionOutpoint};
use thiserror::Error;

/// The on-wire rejection classification reported back to peers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectCode {
    Duplicate,
    Invalid,
    Nonstandard,
    InsufficientFee,
    Dust,
    Malformed,
}

#[derive(Error, Debug, Clone)]
pub enum RuleError {
    #[error("transaction {0} is already in the mempool")]
    RejectDuplicate(TransactionId),

    #[error("transaction {0} is already in the orphan pool")]
    RejectDuplicateOrphan(TransactionId),

    #[error("outpoint {0} is already spent by mempool transaction {1}")]
    RejectDoubleSpend(TransactionOutpoint, TransactionId),

    #[error("transaction violates a consensus rule: {0}")]
    RejectInvalid(#[from] ConsensusTxRuleError),

    #[error("transaction output {0} has a non-standard script form")]
    RejectNonstandard(usize),

    #[error("transaction output {0} pays dust ({1} motes)")]
    RejectDust(usize, u64),

    #[error("transaction fee {0} is below the minimum relay fee {1}")]
    RejectInsufficientFee(u64, u64),

    #[error("transaction {0} has missing inputs and orphans are not allowed in this context")]
    RejectMissingOutpoints(TransactionId),

    #[error("orphan transaction {0} mass {1} exceeds the allowed maximum {2}")]
    RejectOrphanTooLarge(TransactionId, u64, u64),

    #[error("transaction gas exceeds the subnetwork limit")]
    RejectInvalidGas,
}

impl RuleError {
    pub fn reject_code(&self) -> RejectCode {
        match self {
            RuleError::RejectDuplicate(_) | RuleError::RejectDuplicateOrphan(_) | RuleError::RejectDoubleSpend(_, _) => {
                RejectCode::Duplicate
            }
            RuleError::RejectInvalid(inner) => match inner {
                ConsensusTxRuleError::NoTxInputs | ConsensusTxRuleError::TxDuplicateInputs => RejectCode::Malformed,
                _ => RejectCode::Invalid,
            },
            RuleError::RejectNonstandard(_) => RejectCode::Nonstandard,
            RuleError::RejectDust(_, _) => RejectCode::Dust,
            RuleError::RejectInsufficientFee(_, _) => RejectCode::InsufficientFee,
            RuleError::RejectMissingOutpoints(_) => RejectCode::Invalid,
            RuleError::RejectOrphanTooLarge(_, _, _) => RejectCode::Nonstandard,
            RuleError::RejectInvalidGas => RejectCode::Invalid,
        }
    }
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
