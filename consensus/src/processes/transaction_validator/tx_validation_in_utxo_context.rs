use super::{scripts::verify_input_script, TransactionValidator};
use norn_consensus_core::{
    constants::{MAX_MOTES, SEQUENCE_LOCK_TIME_DISABLED, SEQUENCE_LOCK_TIME_MASK},
    errors::tx::{TxResult, TxRuleError},
    tx::VerifiableTransaction,
};

impl TransactionValidator {
    /// Validates a transaction against its populated UTXO entries from the
    /// point of view of a block with the given blue score and past median time.
    /// Returns the transaction fee.
    pub fn validate_populated_transaction_and_get_fee(
        &self,
        tx: &impl VerifiableTransaction,
        pov_blue_score: u64,
        pov_past_median_time: u64,
    ) -> TxResult<u64> {
        self.check_lock_time(tx, pov_blue_score, pov_past_median_time)?;
        self.check_coinbase_maturity(tx, pov_blue_score)?;
        let total_in = self.check_input_amounts(tx)?;
        let total_out = tx.outputs().iter().map(|output| output.value).sum::<u64>();
        if total_in < total_out {
            return Err(TxRuleError::SpendTooHigh(total_in, total_out));
        }
        self.check_sequence_locks(tx, pov_blue_score, pov_past_median_time)?;
        self.check_scripts(tx)?;
        Ok(total_in - total_out)
    }

    /// A transaction with a non-zero lock time is final once the lock value has
    /// passed (blue score, or milliseconds timestamp above the threshold), or
    /// when all its inputs opt out via a maximal sequence.
    fn check_lock_time(&self, tx: &impl VerifiableTransaction, pov_blue_score: u64, pov_past_median_time: u64) -> TxResult<()> {
        let lock_time = tx.tx().lock_time;
        if lock_time == 0 {
            return Ok(());
        }
        let threshold = if lock_time < self.lock_time_threshold { pov_blue_score } else { pov_past_median_time };
        if lock_time < threshold {
            return Ok(());
        }
        if tx.inputs().iter().all(|input| input.sequence == u64::MAX) {
            return Ok(());
        }
        Err(TxRuleError::UnfinalizedTx(lock_time))
    }

    fn check_coinbase_maturity(&self, tx: &impl VerifiableTransaction, pov_blue_score: u64) -> TxResult<()> {
        for (input, entry) in tx.populated_inputs() {
            if entry.is_coinbase && entry.block_blue_score + self.coinbase_maturity > pov_blue_score {
                return Err(TxRuleError::ImmatureCoinbaseSpend(
                    input.previous_outpoint,
                    pov_blue_score,
                    entry.block_blue_score + self.coinbase_maturity,
                ));
            }
        }
        Ok(())
    }

    fn check_input_amounts(&self, tx: &impl VerifiableTransaction) -> TxResult<u64> {
        let mut total: u64 = 0;
        for (_, entry) in tx.populated_inputs() {
            total = total.checked_add(entry.amount).ok_or(TxRuleError::InputsValueOverflow)?;
            if total > MAX_MOTES {
                return Err(TxRuleError::InputsValueOverflow);
            }
        }
        Ok(total)
    }

    /// For each input with a relative lock enabled, the spent entry must have
    /// aged by the declared number of blue score units
    fn check_sequence_locks(&self, tx: &impl VerifiableTransaction, pov_blue_score: u64, _pov_past_median_time: u64) -> TxResult<()> {
        for (input, entry) in tx.populated_inputs() {
            if input.sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
                continue;
            }
            let relative_lock = input.sequence & SEQUENCE_LOCK_TIME_MASK;
            if relative_lock == 0 {
                continue;
            }
            // Unaccepted (mempool) entries carry the maximal blue score, so any
            // nonzero relative lock on them is correctly treated as unmet
            if entry.block_blue_score.saturating_add(relative_lock) > pov_blue_score {
                return Err(TxRuleError::SequenceLockNotMet);
            }
        }
        Ok(())
    }

    fn check_scripts(&self, tx: &impl VerifiableTransaction) -> TxResult<()> {
        for index in 0..tx.inputs().len() {
            verify_input_script(tx, index, &self.sig_cache)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIG_CACHE_SIZE;
    use crate::processes::transaction_validator::{pay_to_pubkey_script, sign_input};
    use norn_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
    use norn_consensus_core::tx::*;
    use secp256k1::{rand::thread_rng, Keypair, SECP256K1};

    fn validator() -> TransactionValidator {
        TransactionValidator::new(100_000, 100, 1, 10, 1000, SIG_CACHE_SIZE)
    }

    fn build_signed(entry_score: u64, is_coinbase: bool, sequence: u64) -> (Transaction, Vec<UtxoEntry>) {
        let keypair = Keypair::new(SECP256K1, &mut thread_rng());
        let script = pay_to_pubkey_script(&keypair.x_only_public_key().0);
        let entry = UtxoEntry::new(1000, script, entry_score, is_coinbase);
        let mut tx = Transaction::new(
            1,
            vec![TransactionInput::new(TransactionOutpoint::new(TransactionId::from_u64_word(3), 0), vec![], sequence)],
            vec![TransactionOutput::new(900, vec![0; 34])],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let sig = sign_input(&PopulatedTransaction::new(&tx, vec![entry.clone()]), 0, &keypair);
        tx.inputs[0].signature_script = sig;
        tx.finalize();
        (tx, vec![entry])
    }

    #[test]
    fn test_fee_calculation() {
        let (tx, entries) = build_signed(0, false, 0);
        let fee = validator()
            .validate_populated_transaction_and_get_fee(&PopulatedTransaction::new(&tx, entries), 1000, 0)
            .unwrap();
        assert_eq!(fee, 100);
    }

    #[test]
    fn test_immature_coinbase_rejected() {
        let (tx, entries) = build_signed(950, true, 0);
        let result = validator().validate_populated_transaction_and_get_fee(&PopulatedTransaction::new(&tx, entries), 1000, 0);
        assert!(matches!(result, Err(TxRuleError::ImmatureCoinbaseSpend(_, 1000, 1050))));
    }

    #[test]
    fn test_mature_coinbase_accepted() {
        let (tx, entries) = build_signed(900, true, 0);
        validator().validate_populated_transaction_and_get_fee(&PopulatedTransaction::new(&tx, entries), 1000, 0).unwrap();
    }

    #[test]
    fn test_sequence_lock() {
        // The entry aged 50 blue scores but the input demands 100
        let (tx, entries) = build_signed(950, false, 100);
        let result = validator().validate_populated_transaction_and_get_fee(&PopulatedTransaction::new(&tx, entries), 1000, 0);
        assert!(matches!(result, Err(TxRuleError::SequenceLockNotMet)));

        // With the disable flag set the lock is ignored
        let (tx, entries) = build_signed(950, false, 100 | norn_consensus_core::constants::SEQUENCE_LOCK_TIME_DISABLED);
        validator().validate_populated_transaction_and_get_fee(&PopulatedTransaction::new(&tx, entries), 1000, 0).unwrap();
    }

    #[test]
    fn test_overspend_rejected() {
        let (mut tx, entries) = build_signed(0, false, 0);
        tx.outputs[0].value = 2000;
        tx.finalize();
        let result = validator().validate_populated_transaction_and_get_fee(&PopulatedTransaction::new(&tx, entries), 1000, 0);
        assert!(matches!(result, Err(TxRuleError::SpendTooHigh(1000, 2000))));
    }
}
