pub mod acceptance_data;
pub mod block_transactions;
pub mod ghostdag;
pub mod headers;
pub mod pruning;
pub mod reachability;
pub mod relations;
pub mod statuses;
pub mod subnetworks;
pub mod tips;
pub mod utxo_diffs;
pub mod utxo_multisets;
pub mod utxo_set;
pub mod virtual_state;

pub use norn_database::prelude::DB;
