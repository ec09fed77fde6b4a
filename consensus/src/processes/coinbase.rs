use norn_consensus_core::{
    coinbase::{deserialize_coinbase_payload, serialize_coinbase_payload, CoinbaseData, CoinbaseResult, MinerData},
    constants::TX_VERSION,
    subnets::SUBNETWORK_ID_COINBASE,
    tx::{Transaction, TransactionOutput},
};

/// Builds and validates coinbase transactions, including the subsidy schedule
#[derive(Clone)]
pub struct CoinbaseManager {
    base_subsidy: u64,
    subsidy_halving_interval: u64,
}

impl CoinbaseManager {
    pub fn new(base_subsidy: u64, subsidy_halving_interval: u64) -> Self {
        Self { base_subsidy, subsidy_halving_interval }
    }

    /// The block subsidy halves every `subsidy_halving_interval` blue score units
    pub fn calc_block_subsidy(&self, blue_score: u64) -> u64 {
        let halvings = blue_score / self.subsidy_halving_interval;
        if halvings >= 64 {
            return 0;
        }
        self.base_subsidy >> halvings
    }

    /// Builds a coinbase transaction paying the block subsidy plus the total
    /// fees of the block's accepted transactions to the miner
    pub fn build_coinbase_transaction(&self, blue_score: u64, total_fees: u64, miner_data: MinerData) -> CoinbaseResult<Transaction> {
        let subsidy = self.calc_block_subsidy(blue_score);
        let payload = serialize_coinbase_payload(&CoinbaseData { blue_score, subsidy, miner_data: miner_data.clone() })?;
        let outputs = if subsidy + total_fees > 0 {
            vec![TransactionOutput::new(subsidy + total_fees, miner_data.script_public_key)]
        } else {
            Vec::new()
        };
        Ok(Transaction::new(TX_VERSION, Vec::new(), outputs, 0, SUBNETWORK_ID_COINBASE, 0, payload))
    }

    /// Deserializes and returns the structured payload of a coinbase transaction
    pub fn deserialize_coinbase_payload(&self, tx: &Transaction) -> CoinbaseResult<CoinbaseData> {
        deserialize_coinbase_payload(&tx.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norn_consensus_core::constants::MOTES_PER_NORN;

    #[test]
    fn test_subsidy_halving() {
        let manager = CoinbaseManager::new(50 * MOTES_PER_NORN, 1000);
        assert_eq!(manager.calc_block_subsidy(0), 50 * MOTES_PER_NORN);
        assert_eq!(manager.calc_block_subsidy(999), 50 * MOTES_PER_NORN);
        assert_eq!(manager.calc_block_subsidy(1000), 25 * MOTES_PER_NORN);
        assert_eq!(manager.calc_block_subsidy(2000), 12 * MOTES_PER_NORN + MOTES_PER_NORN / 2);
        assert_eq!(manager.calc_block_subsidy(64 * 1000), 0);
    }

    #[test]
    fn test_coinbase_roundtrip() {
        let manager = CoinbaseManager::new(50 * MOTES_PER_NORN, 1000);
        let miner_data = MinerData::new(vec![0x20; 34], vec![1, 2, 3]);
        let tx = manager.build_coinbase_transaction(1500, 777, miner_data.clone()).unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.outputs[0].value, 25 * MOTES_PER_NORN + 777);

        let data = manager.deserialize_coinbase_payload(&tx).unwrap();
        assert_eq!(data.blue_score, 1500);
        assert_eq!(data.subsidy, 25 * MOTES_PER_NORN);
        assert_eq!(data.miner_data, miner_data);
    }
}
