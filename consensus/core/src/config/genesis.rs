use crate::block::Block;
use crate::coinbase::{serialize_coinbase_payload, CoinbaseData, MinerData};
use crate::constants::{BLOCK_VERSION, TX_VERSION};
use crate::header::Header;
use crate::subnets::SUBNETWORK_ID_COINBASE;
use crate::tx::Transaction;
use norn_merkle::calc_merkle_root;
use norn_multiset::Multiset;

/// The defining constants of a network's genesis block. The genesis header is
/// rebuilt deterministically from these fields, so its hash never needs to be
/// pinned separately.
#[derive(Clone, Debug)]
pub struct GenesisBlock {
    pub version: u16,
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
    pub extra_data: &'static [u8],
}

impl GenesisBlock {
    /// The genesis coinbase: pays nothing and tags the network via its payload
    pub fn build_coinbase_transaction(&self) -> Transaction {
        let payload = serialize_coinbase_payload(&CoinbaseData {
            blue_score: 0,
            subsidy: 0,
            miner_data: MinerData::new(Vec::new(), self.extra_data.to_vec()),
        })
        .expect("the genesis payload is within limits");
        Transaction::new(TX_VERSION, Vec::new(), Vec::new(), 0, SUBNETWORK_ID_COINBASE, 0, payload)
    }

    pub fn build_block(&self) -> Block {
        let coinbase = self.build_coinbase_transaction();
        let hash_merkle_root = calc_merkle_root(std::iter::once(coinbase.hash()));
        let accepted_id_merkle_root = calc_merkle_root(std::iter::once(coinbase.id()));
        let utxo_commitment = Multiset::new().finalize();
        let header = Header::new(
            self.version,
            Vec::new(), // Zero parents define genesis
            hash_merkle_root,
            accepted_id_merkle_root,
            utxo_commitment,
            self.timestamp,
            self.bits,
            self.nonce,
        );
        Block::new(header, vec![coinbase])
    }
}

pub const GENESIS: GenesisBlock = GenesisBlock {
    version: BLOCK_VERSION,
    timestamp: 1719200000000,
    bits: 0x1e7fffff,
    nonce: 0x211a9c4,
    extra_data: b"norn-mainnet",
};

pub const TESTNET_GENESIS: GenesisBlock = GenesisBlock {
    version: BLOCK_VERSION,
    timestamp: 1719200000000,
    bits: 0x1e7fffff,
    nonce: 0x1161,
    extra_data: b"norn-testnet",
};

pub const SIMNET_GENESIS: GenesisBlock = GenesisBlock {
    version: BLOCK_VERSION,
    timestamp: 1719200000000,
    bits: 0x207fffff, // Maximal target, so simnet blocks need no mining
    nonce: 0x0,
    extra_data: b"norn-simnet",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_deterministic() {
        let a = GENESIS.build_block();
        let b = GENESIS.build_block();
        assert_eq!(a.hash(), b.hash());
        assert!(a.header.is_genesis());
        assert_eq!(a.transactions.len(), 1);
        assert!(a.transactions[0].is_coinbase());
    }

    #[test]
    fn test_networks_have_distinct_genesis() {
        let hashes = [GENESIS.build_block().hash(), TESTNET_GENESIS.build_block().hash(), SIMNET_GENESIS.build_block().hash()];
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[1], hashes[2]);
        assert_ne!(hashes[0], hashes[2]);
    }
}
