use thiserror::Error;

use crate::tx::TransactionOutpoint;

#[derive(Error, Debug, Clone)]
pub enum UtxoAlgebraError {
    #[error("outpoint {0} both in self.remove and in other.remove")]
    DuplicateRemovePoint(TransactionOutpoint),

    #[error("outpoint {0} both in self.add and in other.add")]
    DuplicateAddPoint(TransactionOutpoint),

    #[error("cannot remove outpoint {0} twice")]
    DoubleRemoveCall(TransactionOutpoint),

    #[error("cannot add outpoint {0} twice")]
    DoubleAddCall(TransactionOutpoint),

    #[error("outpoint {0} {1}")]
    DiffIntersectionPoint(TransactionOutpoint, &'static str),

    #[error("{0}")]
    General(&'static str),
}

/// Equality disregards the explanatory messages, so tests can state expected
/// errors without repeating them
impl PartialEq for UtxoAlgebraError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::DuplicateRemovePoint(a), Self::DuplicateRemovePoint(b)) => a == b,
            (Self::DuplicateAddPoint(a), Self::DuplicateAddPoint(b)) => a == b,
            (Self::DoubleRemoveCall(a), Self::DoubleRemoveCall(b)) => a == b,
            (Self::DoubleAddCall(a), Self::DoubleAddCall(b)) => a == b,
            (Self::DiffIntersectionPoint(a, _), Self::DiffIntersectionPoint(b, _)) => a == b,
            (Self::General(_), Self::General(_)) => true,
            _ => false,
        }
    }
}

impl Eq for UtxoAlgebraError {}

pub type UtxoResult<T> = std::result::Result<T, UtxoAlgebraError>;
