use norn_database::prelude::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReachabilityError {
    #[error("data store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("data overflow error: {0}")]
    DataOverflow(String),

    #[error("data inconsistency error")]
    DataInconsistency,

    #[error("query is inconsistent with the queried data order")]
    BadQuery,
}

pub type ReachabilityResult<T> = std::result::Result<T, ReachabilityError>;
