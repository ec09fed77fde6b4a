mod scripts;
mod sigcache;
mod tx_validation_in_isolation;
mod tx_validation_in_utxo_context;

pub use scripts::{pay_to_pubkey_script, sign_input, standard_signature_script};
pub use sigcache::SigCache;

use norn_consensus_core::mass::MassCalculator;

/// Full transaction validation, used both by block validation (against a
/// block's past UTXO) and by the mempool (against the virtual UTXO).
pub struct TransactionValidator {
    max_tx_mass: u64,
    coinbase_maturity: u64,
    lock_time_threshold: u64,
    pub(crate) mass_calculator: MassCalculator,
    sig_cache: SigCache,
}

impl TransactionValidator {
    pub fn new(
        max_tx_mass: u64,
        coinbase_maturity: u64,
        mass_per_tx_byte: u64,
        mass_per_script_pub_key_byte: u64,
        mass_per_sig_op: u64,
        sig_cache_size: u64,
    ) -> Self {
        Self {
            max_tx_mass,
            coinbase_maturity,
            lock_time_threshold: norn_consensus_core::constants::LOCK_TIME_THRESHOLD,
            mass_calculator: MassCalculator::new(mass_per_tx_byte, mass_per_script_pub_key_byte, mass_per_sig_op),
            sig_cache: SigCache::new(sig_cache_size),
        }
    }

    pub fn calc_tx_mass(&self, tx: &norn_consensus_core::tx::Transaction) -> u64 {
        self.mass_calculator.calc_tx_mass(tx)
    }
}
