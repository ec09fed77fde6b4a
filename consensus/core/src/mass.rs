use crate::tx::Transaction;

/// Estimates the canonical serialized byte size of a transaction, matching the
/// wire encoding element-for-element (length prefixes counted as u64 as in the
/// hashing domain).
pub fn transaction_estimated_serialized_size(tx: &Transaction) -> u64 {
    let mut size: u64 = 0;
    size += 2; // version
    size += 8; // number of inputs
    size += tx.inputs.iter().map(|input| 32 + 4 + 8 + 8 + input.signature_script.len() as u64).sum::<u64>();
    size += 8; // number of outputs
    size += tx.outputs.iter().map(|output| 8 + 8 + output.script_public_key.len() as u64).sum::<u64>();
    size += 8; // lock time
    size += crate::subnets::SUBNETWORK_ID_SIZE as u64;
    size += 8; // gas
    size += 32; // payload hash
    size += 8 + tx.payload.len() as u64;
    size
}

/// Converts byte sizes and script costs into the consensus mass unit
#[derive(Clone)]
pub struct MassCalculator {
    mass_per_tx_byte: u64,
    mass_per_script_pub_key_byte: u64,
    mass_per_sig_op: u64,
}

impl MassCalculator {
    pub fn new(mass_per_tx_byte: u64, mass_per_script_pub_key_byte: u64, mass_per_sig_op: u64) -> Self {
        Self { mass_per_tx_byte, mass_per_script_pub_key_byte, mass_per_sig_op }
    }

    pub fn calc_tx_mass(&self, tx: &Transaction) -> u64 {
        let size = transaction_estimated_serialized_size(tx);
        let script_pub_key_size: u64 = tx.outputs.iter().map(|output| output.script_public_key.len() as u64).sum();
        // Each input carries exactly one signature check
        let sig_ops = tx.inputs.len() as u64;
        size * self.mass_per_tx_byte + script_pub_key_size * self.mass_per_script_pub_key_byte + sig_ops * self.mass_per_sig_op
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subnets::SUBNETWORK_ID_NATIVE;
    use crate::tx::*;

    #[test]
    fn test_mass_grows_with_tx() {
        let calc = MassCalculator::new(1, 10, 1000);
        let small = Transaction::new(1, vec![], vec![TransactionOutput::new(1, vec![0; 34])], 0, SUBNETWORK_ID_NATIVE, 0, vec![]);
        let big = Transaction::new(
            1,
            vec![TransactionInput::new(TransactionOutpoint::new(1.into(), 0), vec![0; 66], 0)],
            vec![TransactionOutput::new(1, vec![0; 34]), TransactionOutput::new(2, vec![0; 34])],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        assert!(calc.calc_tx_mass(&big) > calc.calc_tx_mass(&small));
        // One sig op charged per input
        assert_eq!(calc.calc_tx_mass(&big) - MassCalculator::new(1, 10, 0).calc_tx_mass(&big), 1000);
    }
}
