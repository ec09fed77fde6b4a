use super::TransactionValidator;
use norn_consensus_core::{
    constants::{MAX_MOTES, TX_VERSION},
    errors::tx::{TxResult, TxRuleError},
    hashing,
    subnets::SUBNETWORK_ID_NATIVE,
    tx::Transaction,
};
use std::collections::HashSet;

impl TransactionValidator {
    /// Validates everything that can be checked for a standalone transaction,
    /// with no UTXO or DAG context
    pub fn validate_tx_in_isolation(&self, tx: &Transaction) -> TxResult<()> {
        self.check_transaction_inputs(tx)?;
        self.check_transaction_outputs(tx)?;
        self.check_tx_version(tx)?;
        self.check_subnetwork_gas(tx)?;
        self.check_payload_hash(tx)?;
        self.check_mass(tx)?;
        Ok(())
    }

    fn check_transaction_inputs(&self, tx: &Transaction) -> TxResult<()> {
        if !tx.is_coinbase() && tx.inputs.is_empty() {
            return Err(TxRuleError::NoTxInputs);
        }
        let mut outpoints = HashSet::with_capacity(tx.inputs.len());
        for input in tx.inputs.iter() {
            if !outpoints.insert(input.previous_outpoint) {
                return Err(TxRuleError::TxDuplicateInputs);
            }
        }
        Ok(())
    }

    fn check_transaction_outputs(&self, tx: &Transaction) -> TxResult<()> {
        let mut total: u64 = 0;
        for output in tx.outputs.iter() {
            if output.value == 0 {
                return Err(TxRuleError::TxOutZero);
            }
            if output.value > MAX_MOTES {
                return Err(TxRuleError::TxOutTooHigh(MAX_MOTES));
            }
            total = total.checked_add(output.value).ok_or(TxRuleError::OutputsValueOverflow)?;
            if total > MAX_MOTES {
                return Err(TxRuleError::OutputsValueOverflow);
            }
        }
        Ok(())
    }

    fn check_tx_version(&self, tx: &Transaction) -> TxResult<()> {
        if tx.version > TX_VERSION {
            return Err(TxRuleError::UnknownTxVersion(tx.version, TX_VERSION));
        }
        Ok(())
    }

    fn check_subnetwork_gas(&self, tx: &Transaction) -> TxResult<()> {
        if tx.is_coinbase() && tx.gas > 0 {
            return Err(TxRuleError::CoinbaseHasGas);
        }
        if tx.subnetwork_id.is_builtin_or_native() && tx.gas > 0 {
            return Err(TxRuleError::InvalidGasInBuiltinOrNative);
        }
        Ok(())
    }

    fn check_payload_hash(&self, tx: &Transaction) -> TxResult<()> {
        if tx.subnetwork_id == SUBNETWORK_ID_NATIVE {
            if tx.payload_hash != Default::default() || !tx.payload.is_empty() {
                return Err(TxRuleError::InvalidPayloadHash);
            }
        } else if tx.payload_hash != hashing::tx::payload_hash(&tx.payload) {
            return Err(TxRuleError::InvalidPayloadHash);
        }
        Ok(())
    }

    fn check_mass(&self, tx: &Transaction) -> TxResult<()> {
        let mass = self.mass_calculator.calc_tx_mass(tx);
        if mass > self.max_tx_mass {
            return Err(TxRuleError::MassExceedsLimit(mass, self.max_tx_mass));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::SIG_CACHE_SIZE;
    use crate::processes::transaction_validator::TransactionValidator;
    use norn_consensus_core::errors::tx::TxRuleError;
    use norn_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
    use norn_consensus_core::tx::*;

    fn validator() -> TransactionValidator {
        TransactionValidator::new(100_000, 100, 1, 10, 1000, SIG_CACHE_SIZE)
    }

    fn valid_tx() -> Transaction {
        Transaction::new(
            1,
            vec![TransactionInput::new(TransactionOutpoint::new(TransactionId::from_u64_word(1), 0), vec![0; 65], 0)],
            vec![TransactionOutput::new(100, vec![0; 34])],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        )
    }

    #[test]
    fn test_valid_tx_passes() {
        validator().validate_tx_in_isolation(&valid_tx()).unwrap();
    }

    #[test]
    fn test_no_inputs_rejected() {
        let mut tx = valid_tx();
        tx.inputs.clear();
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::NoTxInputs)));
    }

    #[test]
    fn test_duplicate_inputs_rejected() {
        let mut tx = valid_tx();
        tx.inputs.push(tx.inputs[0].clone());
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TxDuplicateInputs)));
    }

    #[test]
    fn test_zero_output_rejected() {
        let mut tx = valid_tx();
        tx.outputs[0].value = 0;
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TxOutZero)));
    }

    #[test]
    fn test_gas_in_native_rejected() {
        let mut tx = valid_tx();
        tx.gas = 5;
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::InvalidGasInBuiltinOrNative)));
    }

    #[test]
    fn test_native_payload_rejected() {
        let mut tx = valid_tx();
        tx.payload = vec![1, 2, 3];
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::InvalidPayloadHash)));
    }
}
