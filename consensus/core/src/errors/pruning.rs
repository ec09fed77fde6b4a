use crate::errors::block::RuleError;
use norn_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PruningImportError {
    #[error("block {0} is not a valid pruning point candidate")]
    PruningValidationError(Hash),

    #[error("the imported UTXO set multiset hash is {0} while the pruning point commits to {1}")]
    ImportedMultisetHashMismatch(Hash, Hash),

    #[error("pruning point {0} violates finality of the existing DAG")]
    PruningImportFinalityViolation(Hash),

    #[error("pruning point rule error: {0}")]
    PruningImportRuleError(#[from] RuleError),

    #[error("no pruning point import is in progress")]
    NoImportInProgress,
}

pub type PruningImportResult<T> = std::result::Result<T, PruningImportError>;
