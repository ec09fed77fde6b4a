//!
//! End-to-end consensus tests driving the full engine over a temp database
//!

use norn_consensus::consensus::test_consensus::TestConsensus;
use norn_consensus::processes::transaction_validator::{pay_to_pubkey_script, sign_input};
use norn_consensus_core::api::ConsensusApi;
use norn_consensus_core::blockstatus::BlockStatus;
use norn_consensus_core::coinbase::MinerData;
use norn_consensus_core::config::params::SIMNET_PARAMS;
use norn_consensus_core::errors::block::RuleError;
use norn_consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use norn_consensus_core::tx::{
    PopulatedTransaction, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry,
};
use norn_hashes::Hash;
use secp256k1::{Keypair, SECP256K1};

fn simnet_consensus() -> TestConsensus {
    TestConsensus::new(SIMNET_PARAMS.clone())
}

#[test]
fn test_genesis_state() {
    let tc = simnet_consensus();
    let genesis = tc.genesis_hash();
    let info = tc.consensus.get_block_info(genesis);
    assert!(info.exists);
    assert_eq!(info.status, Some(BlockStatus::StatusUTXOValid));
    assert_eq!(info.blue_score, Some(0));
    assert_eq!(tc.consensus.get_virtual_selected_parent(), genesis);
    assert_eq!(tc.consensus.get_virtual_blue_score(), 1);
}

#[test]
fn test_chain_growth() {
    let tc = simnet_consensus();
    let tip = tc.add_chain(tc.genesis_hash(), 20);

    assert_eq!(tc.consensus.get_virtual_selected_parent(), tip);
    let info = tc.consensus.get_block_info(tip);
    assert_eq!(info.status, Some(BlockStatus::StatusUTXOValid));
    assert_eq!(info.blue_score, Some(20));
    // Every chain block carries a valid UTXO commitment by construction;
    // re-inserting any of them is a duplicate
    let block = tc.consensus.get_block(tip).unwrap();
    assert!(matches!(tc.consensus.validate_and_insert_block(block), Err(RuleError::DuplicateBlock)));
}

#[test]
fn test_simple_dag_merge() {
    // genesis <- a <- c
    //        \<- b </
    let tc = simnet_consensus();
    let genesis = tc.genesis_hash();
    // Distinct coinbase extra data keeps the sibling blocks distinct
    let a = tc.build_block_with_miner_data(vec![genesis], vec![], MinerData::new(vec![], b"a".to_vec())).unwrap();
    tc.consensus.validate_and_insert_block(a.clone()).unwrap();
    let b = tc.build_block_with_miner_data(vec![genesis], vec![], MinerData::new(vec![], b"b".to_vec())).unwrap();
    tc.consensus.validate_and_insert_block(b.clone()).unwrap();

    let c = tc.build_block_with_parents(vec![a.hash(), b.hash()], vec![]).unwrap();
    tc.consensus.validate_and_insert_block(c.clone()).unwrap();

    // Both parents are blue in a small anticone, so c's blue past holds
    // genesis, a and b
    let info = tc.consensus.get_block_info(c.hash());
    assert_eq!(info.blue_score, Some(3));
    assert_eq!(tc.consensus.get_virtual_selected_parent(), c.hash());
    assert_eq!(tc.consensus.get_virtual_blue_score(), 4);
    assert_eq!(tc.consensus.get_virtual_parents().len(), 1);
}

#[test]
fn test_utxo_commitment_mismatch_rejected() {
    let tc = simnet_consensus();
    let block = tc.build_block_with_parents(vec![tc.genesis_hash()], vec![]).unwrap();

    // Tamper with the commitment by one byte; the nonce must be re-ground so
    // the failure is attributable to the commitment check alone
    let mut header = (*block.header).clone();
    let mut commitment = header.utxo_commitment.as_bytes();
    commitment[0] ^= 1;
    header.utxo_commitment = Hash::from_bytes(commitment);
    header.finalize();
    let target = norn_math::Uint256::from_compact_target_bits(header.bits).unwrap();
    while norn_math::Uint256::from(header.hash) > target {
        header.nonce += 1;
        header.finalize();
    }
    let tampered = norn_consensus_core::block::Block::new(header, (*block.transactions).clone());

    let result = tc.consensus.validate_and_insert_block(tampered);
    assert!(matches!(result, Err(RuleError::InvalidUTXOCommitment(_, _))), "got: {result:?}");
}

#[test]
fn test_missing_parents_reported() {
    let tc = simnet_consensus();
    let block = tc.build_block_with_parents(vec![tc.genesis_hash()], vec![]).unwrap();

    let unknown_parent = Hash::from_u64_word(0xdeadbeef);
    let mut header = (*block.header).clone();
    header.parents = vec![unknown_parent];
    header.finalize();
    let target = norn_math::Uint256::from_compact_target_bits(header.bits).unwrap();
    while norn_math::Uint256::from(header.hash) > target {
        header.nonce += 1;
        header.finalize();
    }
    let orphan = norn_consensus_core::block::Block::new(header, (*block.transactions).clone());

    match tc.consensus.validate_and_insert_block(orphan) {
        Err(RuleError::MissingParents(parents)) => assert_eq!(parents, vec![unknown_parent]),
        other => panic!("expected missing parents, got {other:?}"),
    }
}

#[test]
fn test_out_of_order_insertion_across_nodes() {
    // Node A mines b <- c; node B receives c first (missing parent), then b,
    // then c again; both land with correct blue scores
    let tc_a = simnet_consensus();
    let genesis = tc_a.genesis_hash();
    let b = tc_a.build_block_with_parents(vec![genesis], vec![]).unwrap();
    tc_a.consensus.validate_and_insert_block(b.clone()).unwrap();
    let c = tc_a.build_block_with_parents(vec![b.hash()], vec![]).unwrap();
    tc_a.consensus.validate_and_insert_block(c.clone()).unwrap();

    let tc_b = simnet_consensus();
    assert_eq!(tc_b.genesis_hash(), genesis, "both nodes share the simnet genesis");

    match tc_b.consensus.validate_and_insert_block(c.clone()) {
        Err(RuleError::MissingParents(parents)) => assert_eq!(parents, vec![b.hash()]),
        other => panic!("expected missing parents, got {other:?}"),
    }
    tc_b.consensus.validate_and_insert_block(b.clone()).unwrap();
    tc_b.consensus.validate_and_insert_block(c.clone()).unwrap();

    assert_eq!(tc_b.consensus.get_block_info(b.hash()).blue_score, Some(1));
    assert_eq!(tc_b.consensus.get_block_info(c.hash()).blue_score, Some(2));
    assert_eq!(tc_b.consensus.get_virtual_selected_parent(), c.hash());
}

#[test]
fn test_chain_path_reported_on_reorg() {
    let tc = simnet_consensus();
    let genesis = tc.genesis_hash();

    // A short chain, then a longer competing chain which must reorg the virtual
    let a1 = tc.build_block_with_miner_data(vec![genesis], vec![], MinerData::new(vec![], b"a1".to_vec())).unwrap();
    tc.consensus.validate_and_insert_block(a1.clone()).unwrap();

    let b1 = tc.build_block_with_miner_data(vec![genesis], vec![], MinerData::new(vec![], b"b1".to_vec())).unwrap();
    tc.consensus.validate_and_insert_block(b1.clone()).unwrap();
    let b2 = tc.build_block_with_parents(vec![b1.hash()], vec![]).unwrap();
    let result = tc.consensus.validate_and_insert_block(b2.clone()).unwrap();

    assert_eq!(tc.consensus.get_virtual_selected_parent(), b2.hash());
    assert!(result.chain_path.added.contains(&b2.hash()));
}

#[test]
fn test_spend_matured_coinbase() {
    let tc = simnet_consensus();
    let genesis = tc.genesis_hash();
    let keypair = Keypair::new(SECP256K1, &mut secp256k1::rand::thread_rng());
    let miner_data = MinerData::new(pay_to_pubkey_script(&keypair.x_only_public_key().0), vec![]);

    // Mine a block paying us, then let its coinbase mature
    let reward_block = tc.build_block_with_miner_data(vec![genesis], vec![], miner_data.clone()).unwrap();
    tc.consensus.validate_and_insert_block(reward_block.clone()).unwrap();
    let mut tip = reward_block.hash();
    let maturity = tc.params().coinbase_maturity;
    for _ in 0..maturity + 1 {
        let block = tc.build_block_with_miner_data(vec![tip], vec![], miner_data.clone()).unwrap();
        tip = block.hash();
        tc.consensus.validate_and_insert_block(block).unwrap();
    }

    let coinbase = reward_block.coinbase_transaction();
    let reward = coinbase.outputs[0].value;
    let outpoint = TransactionOutpoint::new(coinbase.id(), 0);
    // The coinbase was accepted by the child of its block (blue score 2)
    let spent_entry = UtxoEntry::new(reward, miner_data.script_public_key.clone(), 2, true);

    let mut tx = Transaction::new(
        1,
        vec![TransactionInput::new(outpoint, vec![], 0)],
        vec![TransactionOutput::new(reward - 1000, miner_data.script_public_key.clone())],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        vec![],
    );
    let signature = sign_input(&PopulatedTransaction::new(&tx, vec![spent_entry]), 0, &keypair);
    tx.inputs[0].signature_script = signature;
    tx.finalize();

    // The spending block and the acceptance by its child must both validate
    let spend_block = tc.build_block_with_parents(vec![tip], vec![tx.clone()]).unwrap();
    tc.consensus.validate_and_insert_block(spend_block.clone()).unwrap();
    let accepting_block = tc.build_block_with_parents(vec![spend_block.hash()], vec![]).unwrap();
    tc.consensus.validate_and_insert_block(accepting_block.clone()).unwrap();

    // The spent coinbase output is gone from the virtual UTXO and the new
    // output took its place
    let utxos = tc.consensus.get_virtual_utxos(None, usize::MAX);
    assert!(!utxos.iter().any(|(op, _)| *op == outpoint));
    assert!(utxos.iter().any(|(op, _)| op.transaction_id == tx.id()));
}

#[test]
fn test_block_template_round_trips_through_validation() {
    let tc = simnet_consensus();
    tc.add_chain(tc.genesis_hash(), 5);

    let template = tc.consensus.build_block_template(MinerData::default(), vec![]).unwrap();
    let mut header = (*template.block.header).clone();
    let target = norn_math::Uint256::from_compact_target_bits(header.bits).unwrap();
    while norn_math::Uint256::from(header.hash) > target {
        header.nonce += 1;
        header.finalize();
    }
    let mined = norn_consensus_core::block::Block::new(header, (*template.block.transactions).clone());
    tc.consensus.validate_and_insert_block(mined.clone()).unwrap();
    assert_eq!(tc.consensus.get_virtual_selected_parent(), mined.hash());
}
