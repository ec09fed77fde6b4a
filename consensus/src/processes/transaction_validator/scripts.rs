use super::sigcache::{SigCache, SigCacheKey};
use norn_consensus_core::errors::tx::{TxResult, TxRuleError};
use norn_consensus_core::hashing::sighash::calc_signature_hash;
use norn_consensus_core::tx::{ScriptPublicKey, VerifiableTransaction};
use secp256k1::{schnorr, Keypair, Message, XOnlyPublicKey, SECP256K1};

// Script opcodes used by the standard pay-to-pubkey form
const OP_DATA_32: u8 = 0x20;
const OP_DATA_64: u8 = 0x40;
const OP_CHECKSIG: u8 = 0xac;

pub const PAY_TO_PUBKEY_SCRIPT_LEN: usize = 34;
pub const STANDARD_SIGNATURE_SCRIPT_LEN: usize = 65;

/// Builds the standard output script paying to the given x-only public key:
/// `OP_DATA_32 <32-byte pubkey> OP_CHECKSIG`
pub fn pay_to_pubkey_script(public_key: &XOnlyPublicKey) -> ScriptPublicKey {
    let mut script = Vec::with_capacity(PAY_TO_PUBKEY_SCRIPT_LEN);
    script.push(OP_DATA_32);
    script.extend(public_key.serialize());
    script.push(OP_CHECKSIG);
    script
}

/// Builds a signature script carrying a schnorr signature:
/// `OP_DATA_64 <64-byte signature>`
pub fn standard_signature_script(signature: &schnorr::Signature) -> Vec<u8> {
    let mut script = Vec::with_capacity(STANDARD_SIGNATURE_SCRIPT_LEN);
    script.push(OP_DATA_64);
    script.extend(signature.as_ref());
    script
}

/// Signs input `input_index` of the populated transaction with the given keypair,
/// returning the full signature script
pub fn sign_input(tx: &impl VerifiableTransaction, input_index: usize, keypair: &Keypair) -> Vec<u8> {
    let signing_hash = calc_signature_hash(tx, input_index);
    let message = Message::from_digest(signing_hash.as_bytes());
    let signature = SECP256K1.sign_schnorr(&message, keypair);
    standard_signature_script(&signature)
}

/// Verifies the signature script of input `input_index` against the script
/// public key of the UTXO entry it spends. Only the standard pay-to-pubkey
/// form is supported; any other form is rejected as unspendable.
pub fn verify_input_script(tx: &impl VerifiableTransaction, input_index: usize, sig_cache: &SigCache) -> TxResult<()> {
    let (input, entry) = tx.populated_input(input_index);

    let script = entry.script_public_key.as_slice();
    if script.len() != PAY_TO_PUBKEY_SCRIPT_LEN || script[0] != OP_DATA_32 || script[PAY_TO_PUBKEY_SCRIPT_LEN - 1] != OP_CHECKSIG {
        return Err(TxRuleError::UnsupportedScriptForm(input_index));
    }
    let public_key_bytes: [u8; 32] = script[1..33].try_into().unwrap();

    let sig_script = input.signature_script.as_slice();
    if sig_script.len() != STANDARD_SIGNATURE_SCRIPT_LEN || sig_script[0] != OP_DATA_64 {
        return Err(TxRuleError::MalformedSignatureScript(input_index));
    }
    let signature_bytes: [u8; 64] = sig_script[1..].try_into().unwrap();

    let signing_hash = calc_signature_hash(tx, input_index);
    let key = SigCacheKey { signing_hash, public_key: public_key_bytes, signature: signature_bytes };
    if let Some(valid) = sig_cache.get(&key) {
        return if valid { Ok(()) } else { Err(TxRuleError::InvalidSignature(input_index)) };
    }

    let public_key = XOnlyPublicKey::from_slice(&public_key_bytes).map_err(|_| TxRuleError::UnsupportedScriptForm(input_index))?;
    let signature = schnorr::Signature::from_slice(&signature_bytes).map_err(|_| TxRuleError::MalformedSignatureScript(input_index))?;
    let message = Message::from_digest(signing_hash.as_bytes());

    let valid = SECP256K1.verify_schnorr(&signature, &message, &public_key).is_ok();
    sig_cache.insert(key, valid);
    if valid {
        Ok(())
    } else {
        Err(TxRuleError::InvalidSignature(input_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norn_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
    use norn_consensus_core::tx::*;
    use secp256k1::rand::thread_rng;

    fn signed_tx() -> (Transaction, Vec<UtxoEntry>, Keypair) {
        let keypair = Keypair::new(SECP256K1, &mut thread_rng());
        let script = pay_to_pubkey_script(&keypair.x_only_public_key().0);
        let entry = UtxoEntry::new(100, script, 0, false);

        let mut tx = Transaction::new(
            1,
            vec![TransactionInput::new(TransactionOutpoint::new(TransactionId::from_u64_word(7), 0), vec![], 0)],
            vec![TransactionOutput::new(90, vec![0x51])],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let sig_script = sign_input(&PopulatedTransaction::new(&tx, vec![entry.clone()]), 0, &keypair);
        tx.inputs[0].signature_script = sig_script;
        tx.finalize();
        (tx, vec![entry], keypair)
    }

    #[test]
    fn test_sign_and_verify() {
        let (tx, entries, _) = signed_tx();
        let populated = PopulatedTransaction::new(&tx, entries);
        let sig_cache = SigCache::new(16);
        verify_input_script(&populated, 0, &sig_cache).unwrap();
        // Second verification is served from the cache
        verify_input_script(&populated, 0, &sig_cache).unwrap();
    }

    #[test]
    fn test_tampered_output_fails() {
        let (mut tx, entries, _) = signed_tx();
        tx.outputs[0].value = 91;
        tx.finalize();
        let populated = PopulatedTransaction::new(&tx, entries);
        let result = verify_input_script(&populated, 0, &SigCache::new(16));
        assert!(matches!(result, Err(TxRuleError::InvalidSignature(0))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (tx, mut entries, _) = signed_tx();
        let other = Keypair::new(SECP256K1, &mut thread_rng());
        entries[0].script_public_key = pay_to_pubkey_script(&other.x_only_public_key().0);
        let populated = PopulatedTransaction::new(&tx, entries);
        let result = verify_input_script(&populated, 0, &SigCache::new(16));
        assert!(matches!(result, Err(TxRuleError::InvalidSignature(0))));
    }

    #[test]
    fn test_malformed_scripts_rejected() {
        let (tx, mut entries, _) = signed_tx();
        entries[0].script_public_key = vec![0x51, 0x52];
        let populated = PopulatedTransaction::new(&tx, entries);
        assert!(matches!(verify_input_script(&populated, 0, &SigCache::new(16)), Err(TxRuleError::UnsupportedScriptForm(0))));

        let (mut tx2, entries2, _) = signed_tx();
        tx2.inputs[0].signature_script = vec![1, 2, 3];
        let populated = PopulatedTransaction::new(&tx2, entries2);
        assert!(matches!(verify_input_script(&populated, 0, &SigCache::new(16)), Err(TxRuleError::MalformedSignatureScript(0))));
    }
}
