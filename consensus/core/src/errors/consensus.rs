use norn_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ConsensusError {
    #[error("couldn't find block {0}")]
    BlockNotFound(Hash),

    #[error("block {0} is not a chain block")]
    NotChainBlock(Hash),

    #[error("cannot build a block template while the node is syncing")]
    IsSyncing,

    #[error("{0}")]
    General(&'static str),
}

pub type ConsensusResult<T> = std::result::Result<T, ConsensusError>;
