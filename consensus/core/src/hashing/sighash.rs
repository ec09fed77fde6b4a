use super::HasherExtensions;
use crate::tx::VerifiableTransaction;
use norn_hashes::{Hash, Hasher, HasherBase, TransactionSigningHash};

/// Calculates the signature hash committed to by the signature of `input_index`.
/// All inputs and outputs are covered (the only supported signing scheme), with
/// the spent UTXO entry of the signed input mixed in so a signature cannot be
/// replayed against a different output.
pub fn calc_signature_hash(tx: &impl VerifiableTransaction, input_index: usize) -> Hash {
    let mut hasher = TransactionSigningHash::new();
    let inner = tx.tx();
    hasher.write_u16(inner.version).write_len(inner.inputs.len());
    for input in inner.inputs.iter() {
        hasher.update(input.previous_outpoint.transaction_id).write_u32(input.previous_outpoint.index).write_u64(input.sequence);
    }

    let (signed_input, entry) = tx.populated_input(input_index);
    hasher
        .write_len(input_index)
        .write_u64(entry.amount)
        .write_var_bytes(&entry.script_public_key)
        .write_bool(entry.is_coinbase)
        .write_u64(signed_input.sequence);

    hasher.write_len(inner.outputs.len());
    for output in inner.outputs.iter() {
        hasher.write_u64(output.value).write_var_bytes(&output.script_public_key);
    }

    hasher.write_u64(inner.lock_time).update(&inner.subnetwork_id).write_u64(inner.gas).update(inner.payload_hash);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subnets::SUBNETWORK_ID_NATIVE;
    use crate::tx::*;

    fn populated_tx() -> (Transaction, Vec<UtxoEntry>) {
        let tx = Transaction::new(
            1,
            vec![
                TransactionInput::new(TransactionOutpoint::new(TransactionId::from_u64_word(1), 0), vec![], 0),
                TransactionInput::new(TransactionOutpoint::new(TransactionId::from_u64_word(2), 1), vec![], 0),
            ],
            vec![TransactionOutput::new(100, vec![0x51])],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let entries = vec![UtxoEntry::new(60, vec![1; 34], 5, false), UtxoEntry::new(50, vec![2; 34], 5, false)];
        (tx, entries)
    }

    #[test]
    fn test_signature_hash_per_input() {
        let (tx, entries) = populated_tx();
        let populated = PopulatedTransaction::new(&tx, entries);
        assert_ne!(calc_signature_hash(&populated, 0), calc_signature_hash(&populated, 1));
    }

    #[test]
    fn test_signature_hash_commits_to_outputs() {
        let (tx, entries) = populated_tx();
        let base = calc_signature_hash(&PopulatedTransaction::new(&tx, entries.clone()), 0);

        let mut changed = tx.clone();
        changed.outputs[0].value = 99;
        changed.finalize();
        let changed_hash = calc_signature_hash(&PopulatedTransaction::new(&changed, entries), 0);
        assert_ne!(base, changed_hash);
    }

    #[test]
    fn test_signature_hash_commits_to_spent_entry() {
        let (tx, mut entries) = populated_tx();
        let base = calc_signature_hash(&PopulatedTransaction::new(&tx, entries.clone()), 0);
        entries[0].amount += 1;
        let changed = calc_signature_hash(&PopulatedTransaction::new(&tx, entries), 0);
        assert_ne!(base, changed);
    }
}
