use crate::wire::{MessageCommand, SerError};
use norn_hashes::Hash;
use std::time::Duration;
use thiserror::Error;

/// Errors arising while serving a peer. [`ProtocolError::should_ban`] decides
/// whether the peer address is banned before disconnecting.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("timeout expired after {0:?}")]
    Timeout(Duration),

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("wire format error: {0}")]
    SerializationError(#[from] SerError),

    #[error("expected message {expected} but got {got}")]
    UnexpectedMessage { expected: &'static str, got: MessageCommand },

    #[error("peer sent block {0} which was not requested")]
    UnrequestedBlock(Hash),

    #[error("peer sent a hash list of size {0} exceeding the allowed maximum")]
    OversizedHashList(usize),

    #[error("peer is on network {got} while this node is on {expected}")]
    WrongNetwork { expected: String, got: String },

    #[error("peer protocol version {0} is below the minimum supported {1}")]
    ObsoleteProtocolVersion(u32, u32),

    #[error("self-connection detected")]
    LoopbackConnection,

    #[error("peer subnetwork is incompatible with this node")]
    IncompatibleSubnetwork,

    #[error("incoming route for {0} reached its capacity")]
    RouteCapacityReached(MessageCommand),

    #[error("peer rejected us: {0}")]
    PeerRejected(String),

    #[error("peer sent an invalid block or transaction: {0}")]
    ConsensusViolation(String),

    #[error("{0}")]
    Other(&'static str),

    #[error("{0}")]
    OtherOwned(String),
}

impl ProtocolError {
    /// Whether the misbehavior warrants banning the peer address. Timeouts and
    /// clean closes never ban; rule violations and malformed traffic do.
    pub fn should_ban(&self) -> bool {
        match self {
            ProtocolError::Timeout(_)
            | ProtocolError::ConnectionClosed
            | ProtocolError::PeerRejected(_)
            | ProtocolError::RouteCapacityReached(_)
            | ProtocolError::LoopbackConnection
            | ProtocolError::Other(_)
            | ProtocolError::OtherOwned(_) => false,
            ProtocolError::SerializationError(_)
            | ProtocolError::UnexpectedMessage { .. }
            | ProtocolError::UnrequestedBlock(_)
            | ProtocolError::OversizedHashList(_)
            | ProtocolError::WrongNetwork { .. }
            | ProtocolError::ObsoleteProtocolVersion(_, _)
            | ProtocolError::IncompatibleSubnetwork
            | ProtocolError::ConsensusViolation(_) => true,
        }
    }
}
