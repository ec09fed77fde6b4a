use crate::subnets::SubnetworkId;
use crate::tx::TransactionOutpoint;
use norn_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxRuleError {
    #[error("transaction has no inputs")]
    NoTxInputs,

    #[error("transaction has duplicate inputs")]
    TxDuplicateInputs,

    #[error("transaction input {0} refers to a non-existing outpoint")]
    MissingTxOutpoints(TransactionOutpoint),

    #[error("one of the transaction outputs has zero value")]
    TxOutZero,

    #[error("one of the transaction outputs exceeds the maximum allowed value of {0}")]
    TxOutTooHigh(u64),

    #[error("the sum of transaction outputs overflows")]
    OutputsValueOverflow,

    #[error("the sum of transaction inputs overflows")]
    InputsValueOverflow,

    #[error("total inputs amount {0} is less than total outputs amount {1}")]
    SpendTooHigh(u64, u64),

    #[error("transaction declares a payload hash which does not match its payload")]
    InvalidPayloadHash,

    #[error("native and built-in subnetwork transactions must carry zero gas")]
    InvalidGasInBuiltinOrNative,

    #[error("subnetwork {0} is not registered")]
    UnknownSubnetwork(SubnetworkId),

    #[error("transaction gas {0} exceeds the subnetwork gas limit {1}")]
    GasExceedsSubnetworkLimit(u64, u64),

    #[error("transaction mass {0} exceeds the allowed maximum of {1}")]
    MassExceedsLimit(u64, u64),

    #[error("coinbase output {0} is spent at blue score {1} while its maturity requires {2}")]
    ImmatureCoinbaseSpend(TransactionOutpoint, u64, u64),

    #[error("transaction is not finalized: lock time {0} is in the future")]
    UnfinalizedTx(u64),

    #[error("transaction sequence lock is not yet active")]
    SequenceLockNotMet,

    #[error("signature script of input {0} is malformed")]
    MalformedSignatureScript(usize),

    #[error("script public key spent by input {0} has an unsupported form")]
    UnsupportedScriptForm(usize),

    #[error("signature of input {0} failed verification")]
    InvalidSignature(usize),

    #[error("transaction version {0} is above the maximum supported {1}")]
    UnknownTxVersion(u16, u16),

    #[error("coinbase transaction carries a gas value")]
    CoinbaseHasGas,

    #[error("transaction {0} was rejected by past UTXO of the validated chain block")]
    RejectedByPastUtxo(Hash),
}

pub type TxResult<T> = std::result::Result<T, TxRuleError>;
