use super::HasherExtensions;
use crate::tx::{Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput};
use norn_hashes::{Hash, Hasher, HasherBase};

/// A bitmask defining which transaction fields we
/// want to encode and which to ignore.
type TxEncodingFlags = u8;

pub const TX_ENCODING_FULL: TxEncodingFlags = 0;
pub const TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT: TxEncodingFlags = 1;

/// Returns the transaction hash. Note that this is different than the transaction ID.
pub fn hash(tx: &Transaction) -> Hash {
    let mut hasher = norn_hashes::TransactionHash::new();
    write_transaction(&mut hasher, tx, TX_ENCODING_FULL);
    hasher.finalize()
}

/// Not intended for direct use by clients. Instead use `tx.id()`
pub(crate) fn id(tx: &Transaction) -> TransactionId {
    // Encode the transaction with signature scripts replaced by empty bytes
    // and hash the result. This makes the ID immune to signature malleation.
    let encoding_flags = if tx.is_coinbase() { TX_ENCODING_FULL } else { TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT };
    let mut hasher = norn_hashes::TransactionID::new();
    write_transaction(&mut hasher, tx, encoding_flags);
    hasher.finalize()
}

pub fn payload_hash(payload: &[u8]) -> Hash {
    norn_hashes::PayloadHash::hash(payload)
}

/// Write the transaction into the provided hasher according to the encoding flags
fn write_transaction<T: Hasher>(hasher: &mut T, tx: &Transaction, encoding_flags: TxEncodingFlags) {
    hasher.write_u16(tx.version).write_len(tx.inputs.len());
    for input in tx.inputs.iter() {
        write_input(hasher, input, encoding_flags);
    }

    hasher.write_len(tx.outputs.len());
    for output in tx.outputs.iter() {
        write_output(hasher, output);
    }

    hasher.write_u64(tx.lock_time).update(&tx.subnetwork_id).write_u64(tx.gas).update(tx.payload_hash);

    write_var_bytes(hasher, &tx.payload);
}

#[inline(always)]
fn write_input<T: Hasher>(hasher: &mut T, input: &TransactionInput, encoding_flags: TxEncodingFlags) {
    write_outpoint(hasher, &input.previous_outpoint);
    if encoding_flags & TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT != TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT {
        write_var_bytes(hasher, input.signature_script.as_slice());
    } else {
        write_var_bytes(hasher, &[]);
    }
    hasher.write_u64(input.sequence);
}

#[inline(always)]
fn write_outpoint<T: Hasher>(hasher: &mut T, outpoint: &TransactionOutpoint) {
    hasher.update(outpoint.transaction_id).write_u32(outpoint.index);
}

#[inline(always)]
fn write_output<T: Hasher>(hasher: &mut T, output: &TransactionOutput) {
    hasher.write_u64(output.value);
    write_var_bytes(hasher, &output.script_public_key);
}

#[inline(always)]
fn write_var_bytes<T: Hasher>(hasher: &mut T, bytes: &[u8]) {
    hasher.write_len(bytes.len()).update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subnets::SUBNETWORK_ID_NATIVE;

    #[test]
    fn test_id_and_hash_differ_only_by_scripts() {
        let input = TransactionInput::new(TransactionOutpoint::new(Hash::from_u64_word(5), 2), vec![1, 2], 7);
        let tx = Transaction::new(1, vec![input], Vec::new(), 0, SUBNETWORK_ID_NATIVE, 0, Vec::new());

        let mut stripped = tx.clone();
        stripped.inputs[0].signature_script = vec![];
        stripped.finalize();

        assert_eq!(tx.id(), stripped.id());
        assert_eq!(stripped.hash(), {
            let mut hasher = norn_hashes::TransactionID::new();
            write_transaction(&mut hasher, &stripped, TX_ENCODING_FULL);
            hasher.finalize()
        });
    }

    #[test]
    fn test_coinbase_id_includes_scripts() {
        use crate::subnets::SUBNETWORK_ID_COINBASE;
        let input = TransactionInput::new(TransactionOutpoint::new(Hash::from_u64_word(5), 2), vec![1, 2], 7);
        let tx = Transaction::new(1, vec![input], Vec::new(), 0, SUBNETWORK_ID_COINBASE, 0, vec![1, 2, 3]);
        let mut malleated = tx.clone();
        malleated.inputs[0].signature_script = vec![3];
        malleated.finalize();
        assert_ne!(tx.id(), malleated.id());
    }
}
