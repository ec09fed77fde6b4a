//!
//! Mempool admission tests backed by a real consensus instance
//!

use norn_consensus::consensus::test_consensus::TestConsensus;
use norn_consensus::processes::transaction_validator::{pay_to_pubkey_script, sign_input};
use norn_consensus_core::api::ConsensusApi;
use norn_consensus_core::coinbase::MinerData;
use norn_consensus_core::config::params::SIMNET_PARAMS;
use norn_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use norn_consensus_core::tx::{
    PopulatedTransaction, Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry,
};
use norn_mempool::config::Config as MempoolConfig;
use norn_mempool::errors::{RejectCode, RuleError};
use norn_mempool::Mempool;
use secp256k1::{Keypair, SECP256K1};

const FEE: u64 = 50_000;

struct Harness {
    tc: TestConsensus,
    mempool: Mempool,
    keypair: Keypair,
    /// Matured coinbase outpoints payable to `keypair`, with their amounts
    spendable: Vec<(TransactionOutpoint, u64)>,
}

impl Harness {
    /// Mines a chain with two spendable (matured) coinbases
    fn new() -> Self {
        let tc = TestConsensus::new(SIMNET_PARAMS.clone());
        let keypair = Keypair::new(SECP256K1, &mut secp256k1::rand::thread_rng());
        let miner_data = MinerData::new(pay_to_pubkey_script(&keypair.x_only_public_key().0), vec![]);

        let mut tip = tc.genesis_hash();
        let mut spendable = Vec::new();
        for height in 0..tc.params().coinbase_maturity + 4 {
            let block = tc.build_block_with_miner_data(vec![tip], vec![], miner_data.clone()).unwrap();
            tip = block.hash();
            if height < 2 {
                let coinbase = block.coinbase_transaction();
                spendable.push((TransactionOutpoint::new(coinbase.id(), 0), coinbase.outputs[0].value));
            }
            tc.consensus.validate_and_insert_block(block).unwrap();
        }
        Self { tc, mempool: Mempool::new(MempoolConfig::default()), keypair, spendable }
    }

    fn script(&self) -> Vec<u8> {
        pay_to_pubkey_script(&self.keypair.x_only_public_key().0)
    }

    /// Builds a signed transaction spending `outpoint` (holding `amount`)
    fn build_spend(&self, outpoint: TransactionOutpoint, amount: u64, entry_blue_score: u64, is_coinbase: bool) -> Transaction {
        let entry = UtxoEntry::new(amount, self.script(), entry_blue_score, is_coinbase);
        let mut tx = Transaction::new(
            1,
            vec![TransactionInput::new(outpoint, vec![], 0)],
            vec![TransactionOutput::new(amount - FEE, self.script())],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let signature = sign_input(&PopulatedTransaction::new(&tx, vec![entry]), 0, &self.keypair);
        tx.inputs[0].signature_script = signature;
        tx.finalize();
        tx
    }
}

#[test]
fn test_accept_and_query() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    let tx = harness.build_spend(outpoint, amount, 2, true);
    let id = tx.id();

    let accepted = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), tx, false).unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id(), id);
    assert!(accepted[0].fee_per_mass > 0);

    assert!(harness.mempool.has_transaction(id, false));
    assert_eq!(harness.mempool.get_all_transactions().len(), 1);
    assert_eq!(harness.mempool.check_spend(&outpoint), Some(id));
}

#[test]
fn test_double_spend_rejected_as_duplicate() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    let first = harness.build_spend(outpoint, amount, 2, true);
    let first_id = first.id();
    harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), first, false).unwrap();

    // A conflicting spend of the same outpoint (different fee -> different id)
    let entry = UtxoEntry::new(amount, harness.script(), 2, true);
    let mut conflicting = Transaction::new(
        1,
        vec![TransactionInput::new(outpoint, vec![], 0)],
        vec![TransactionOutput::new(amount - 2 * FEE, harness.script())],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    );
    let signature = sign_input(&PopulatedTransaction::new(&conflicting, vec![entry]), 0, &harness.keypair);
    conflicting.inputs[0].signature_script = signature;
    conflicting.finalize();

    let result = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), conflicting, false);
    match result {
        Err(err) => {
            // The on-wire classification of a mempool double spend is `Duplicate`
            assert_eq!(err.reject_code(), RejectCode::Duplicate);
            match err {
                RuleError::RejectDoubleSpend(conflicted_outpoint, spender) => {
                    assert_eq!(conflicted_outpoint, outpoint);
                    assert_eq!(spender, first_id);
                }
                other => panic!("expected a double spend rejection, got {other:?}"),
            }
        }
        Ok(_) => panic!("a conflicting spend must not be accepted"),
    }
    // Only the first transaction remains
    let all: Vec<TransactionId> = harness.mempool.get_all_transactions().iter().map(|d| d.id()).collect();
    assert_eq!(all, vec![first_id]);
}

#[test]
fn test_resubmission_rejected() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    let tx = harness.build_spend(outpoint, amount, 2, true);
    harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), tx.clone(), false).unwrap();
    let result = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), tx, false);
    assert!(matches!(result, Err(RuleError::RejectDuplicate(_))));
}

#[test]
fn test_chained_transaction_goes_to_depends() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    let parent = harness.build_spend(outpoint, amount, 2, true);
    let parent_id = parent.id();
    harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), parent, false).unwrap();

    // Spend the parent's (unaccepted) output while it is still in the mempool
    let child = harness.build_spend(TransactionOutpoint::new(parent_id, 0), amount - FEE, 0, false);
    let accepted = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), child.clone(), false).unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(harness.mempool.get_all_transactions().len(), 2);
    // Chained transactions are not eligible for block templates
    assert_eq!(harness.mempool.block_candidate_transactions(u64::MAX).len(), 1);
}

#[test]
fn test_orphan_pool_and_promotion() {
    let harness = Harness::new();
    let (outpoint0, amount0) = harness.spendable[0];

    // Build the parent but do not submit it yet; its child is an orphan
    let parent = harness.build_spend(outpoint0, amount0, 2, true);
    let orphan = harness.build_spend(TransactionOutpoint::new(parent.id(), 0), amount0 - FEE, 0, false);
    let orphan_id = orphan.id();

    // Without the orphan flag, missing outpoints are a rejection
    let result = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), orphan.clone(), false);
    assert!(matches!(result, Err(RuleError::RejectMissingOutpoints(_))));

    let accepted = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), orphan, true).unwrap();
    assert!(accepted.is_empty());
    assert_eq!(harness.mempool.orphan_count(), 1);
    assert!(harness.mempool.has_transaction(orphan_id, true));
    assert!(!harness.mempool.has_transaction(orphan_id, false));

    // Submitting the parent recursively redeems the orphan
    let accepted = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), parent.clone(), true).unwrap();
    let ids: Vec<TransactionId> = accepted.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec![parent.id(), orphan_id]);
    assert_eq!(harness.mempool.orphan_count(), 0);
    assert!(harness.mempool.has_transaction(orphan_id, false));
}

#[test]
fn test_block_inclusion_evicts() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    let tx = harness.build_spend(outpoint, amount, 2, true);
    let id = tx.id();
    harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), tx.clone(), false).unwrap();

    // Mine the transaction into a block and let the mempool observe it
    let tip = harness.tc.consensus.get_virtual_selected_parent();
    let block = harness.tc.build_block_with_parents(vec![tip], vec![tx]).unwrap();
    harness.tc.consensus.validate_and_insert_block(block.clone()).unwrap();
    harness.mempool.handle_new_block_transactions(harness.tc.consensus.as_ref(), &block.transactions).unwrap();

    assert!(!harness.mempool.has_transaction(id, true));
    assert_eq!(harness.mempool.get_all_transactions().len(), 0);
    assert_eq!(harness.mempool.check_spend(&outpoint), None);
}

#[test]
fn test_orphan_resubmission() {
    let harness = Harness::new();
    let (outpoint0, amount0) = harness.spendable[0];
    let parent = harness.build_spend(outpoint0, amount0, 2, true);
    let orphan = harness.build_spend(TransactionOutpoint::new(parent.id(), 0), amount0 - FEE, 0, false);
    let orphan_id = orphan.id();

    harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), orphan.clone(), true).unwrap();
    assert_eq!(harness.mempool.orphan_count(), 1);

    // A re-announced orphan is rejected as a duplicate only when orphans are
    // not allowed; an orphan-tolerant resubmission simply keeps it parked
    let result = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), orphan.clone(), false);
    assert!(matches!(result, Err(RuleError::RejectDuplicateOrphan(id)) if id == orphan_id));

    let accepted = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), orphan, true).unwrap();
    assert!(accepted.is_empty());
    assert_eq!(harness.mempool.orphan_count(), 1);

    // The parked copy still redeems normally once its parent arrives
    let accepted = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), parent.clone(), true).unwrap();
    let ids: Vec<TransactionId> = accepted.iter().map(|d| d.id()).collect();
    assert_eq!(ids, vec![parent.id(), orphan_id]);
    assert_eq!(harness.mempool.orphan_count(), 0);
}

#[test]
fn test_fee_floor_applies_to_non_standard_nodes() {
    let harness = Harness::new();
    let mempool = Mempool::new(MempoolConfig { accept_non_standard: true, ..MempoolConfig::default() });

    // Accepting non-standard scripts does not waive the relay fee floor
    let (outpoint0, amount0) = harness.spendable[0];
    let entry = UtxoEntry::new(amount0, harness.script(), 2, true);
    let mut zero_fee = Transaction::new(
        1,
        vec![TransactionInput::new(outpoint0, vec![], 0)],
        vec![TransactionOutput::new(amount0, harness.script())],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    );
    let signature = sign_input(&PopulatedTransaction::new(&zero_fee, vec![entry]), 0, &harness.keypair);
    zero_fee.inputs[0].signature_script = signature;
    zero_fee.finalize();
    let result = mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), zero_fee, false);
    assert!(matches!(result, Err(RuleError::RejectInsufficientFee(0, _))));

    // While a sufficiently paying non-standard output is now admissible
    let (outpoint1, amount1) = harness.spendable[1];
    let entry = UtxoEntry::new(amount1, harness.script(), 3, true);
    let mut non_standard = Transaction::new(
        1,
        vec![TransactionInput::new(outpoint1, vec![], 0)],
        vec![TransactionOutput::new(amount1 - FEE, vec![0x51, 0x52, 0x53])],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    );
    let signature = sign_input(&PopulatedTransaction::new(&non_standard, vec![entry]), 0, &harness.keypair);
    non_standard.inputs[0].signature_script = signature;
    non_standard.finalize();
    let accepted = mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), non_standard, false).unwrap();
    assert_eq!(accepted.len(), 1);
}

#[test]
fn test_orphan_expiry_on_next_insert() {
    let harness = Harness::new();
    // Zero TTL and scan interval make every insert sweep expired orphans
    let mempool = Mempool::new(MempoolConfig {
        orphan_expire_milliseconds: 0,
        orphan_expire_scan_interval_milliseconds: 0,
        ..MempoolConfig::default()
    });

    let (outpoint0, amount0) = harness.spendable[0];
    let parent = harness.build_spend(outpoint0, amount0, 2, true);
    let orphan = harness.build_spend(TransactionOutpoint::new(parent.id(), 0), amount0 - FEE, 0, false);
    mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), orphan, true).unwrap();
    assert_eq!(mempool.orphan_count(), 1);

    // Any subsequent insert past the scan interval evicts the expired orphan
    let (outpoint1, amount1) = harness.spendable[1];
    let unrelated = harness.build_spend(outpoint1, amount1, 3, true);
    mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), unrelated, false).unwrap();
    assert_eq!(mempool.orphan_count(), 0);
}

#[test]
fn test_insufficient_fee_rejected() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    // Spend everything: a zero-fee transaction violates the relay fee policy
    let entry = UtxoEntry::new(amount, harness.script(), 2, true);
    let mut tx = Transaction::new(
        1,
        vec![TransactionInput::new(outpoint, vec![], 0)],
        vec![TransactionOutput::new(amount, harness.script())],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    );
    let signature = sign_input(&PopulatedTransaction::new(&tx, vec![entry]), 0, &harness.keypair);
    tx.inputs[0].signature_script = signature;
    tx.finalize();

    let result = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), tx, false);
    match result {
        Err(ref err @ RuleError::RejectInsufficientFee(0, _)) => {
            assert_eq!(err.reject_code(), RejectCode::InsufficientFee)
        }
        other => panic!("expected an insufficient fee rejection, got {other:?}"),
    }
}

#[test]
fn test_nonstandard_output_rejected() {
    let harness = Harness::new();
    let (outpoint, amount) = harness.spendable[0];
    let entry = UtxoEntry::new(amount, harness.script(), 2, true);
    let mut tx = Transaction::new(
        1,
        vec![TransactionInput::new(outpoint, vec![], 0)],
        vec![TransactionOutput::new(amount - FEE, vec![0x51, 0x52, 0x53])],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    );
    let signature = sign_input(&PopulatedTransaction::new(&tx, vec![entry]), 0, &harness.keypair);
    tx.inputs[0].signature_script = signature;
    tx.finalize();

    let result = harness.mempool.validate_and_insert_transaction(harness.tc.consensus.as_ref(), tx, false);
    match result {
        Err(ref err @ RuleError::RejectNonstandard(0)) => assert_eq!(err.reject_code(), RejectCode::Nonstandard),
        other => panic!("expected a nonstandard rejection, got {other:?}"),
    }
}
