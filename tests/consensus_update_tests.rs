//! End-to-end tests of consensus-change processing: confirmed-set updates,
//! history synthesis, reorg reversal, and the unconfirmed view.

mod common;

use common::{
    block_with_transactions, change_applying_block, payment_transaction, unlocked_wallet,
};
use node_wallet_libs::wallet::database::{
    BUCKET_HISTORIC_CLAIM_STARTS, BUCKET_HISTORIC_OUTPUTS, BUCKET_SIACOIN_OUTPUTS,
    BUCKET_SIAFUND_OUTPUTS,
};
use node_wallet_libs::{
    Block, ConsensusChange, Currency, DiffDirection, FundKind, SiacoinInput, SiacoinOutput,
    SiafundInput, SiafundOutput, SiafundPoolDiff, Transaction, TransactionId, UnlockHash,
    MATURITY_DELAY,
};

fn confirmed_dumps(
    wallet: &node_wallet_libs::Wallet,
) -> (Vec<(Vec<u8>, Vec<u8>)>, Vec<(Vec<u8>, Vec<u8>)>) {
    (
        wallet.bucket_dump(BUCKET_SIACOIN_OUTPUTS).unwrap(),
        wallet.bucket_dump(BUCKET_SIAFUND_OUTPUTS).unwrap(),
    )
}

#[test]
fn test_simple_receive() {
    // S1: an empty wallet with one key receives a two-output transaction.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address_a = wallet.next_address().unwrap().unlock_hash();
    let address_b = UnlockHash([0xbb; 32]);

    let txn = payment_transaction(&[(address_a, 100), (address_b, 50)]);
    let txid = txn.id();
    let id_a = txn.siacoin_output_id(0);
    let id_b = txn.siacoin_output_id(1);
    let change = change_applying_block(block_with_transactions(vec![txn]));

    wallet.process_consensus_change(&change);

    assert_eq!(wallet.consensus_height().unwrap(), 1);
    assert_eq!(
        wallet.confirmed_siacoin_balance().unwrap(),
        Currency::new(100)
    );

    // Only the wallet-owned output enters the confirmed set; both outputs
    // enter the historic bucket.
    let confirmed = wallet.bucket_dump(BUCKET_SIACOIN_OUTPUTS).unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].0, id_a.as_bytes().to_vec());
    let historic = wallet.bucket_dump(BUCKET_HISTORIC_OUTPUTS).unwrap();
    let historic_keys: Vec<_> = historic.iter().map(|(k, _)| k.clone()).collect();
    assert!(historic_keys.contains(&id_a.as_bytes().to_vec()));
    assert!(historic_keys.contains(&id_b.as_bytes().to_vec()));

    let history = wallet.processed_transactions().unwrap();
    assert_eq!(history.len(), 1);
    let pt = &history[0];
    assert_eq!(pt.transaction_id, txid);
    assert_eq!(pt.confirmation_height, 1);
    assert_eq!(pt.outputs.len(), 2);
    assert_eq!(pt.outputs[0].fund_kind, FundKind::SiacoinOutput);
    assert!(pt.outputs[0].wallet_address);
    assert_eq!(pt.outputs[0].value, Currency::new(100));
    assert!(!pt.outputs[1].wallet_address);
    assert_eq!(pt.outputs[1].value, Currency::new(50));
}

#[test]
fn test_receive_then_revert() {
    // S2: applying a change and then its inverse restores the confirmed
    // set and the history; historic values may remain.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();

    let before = confirmed_dumps(&wallet);
    let change =
        change_applying_block(block_with_transactions(vec![payment_transaction(&[(
            address, 100,
        )])]));

    wallet.process_consensus_change(&change);
    assert_eq!(wallet.processed_transactions().unwrap().len(), 1);

    wallet.process_consensus_change(&change.inverse());
    assert_eq!(wallet.consensus_height().unwrap(), 0);
    assert!(wallet.processed_transactions().unwrap().is_empty());
    assert_eq!(wallet.confirmed_siacoin_balance().unwrap(), Currency::ZERO);
    assert_eq!(confirmed_dumps(&wallet), before);
}

#[test]
fn test_replay_then_full_revert_restores_state() {
    // Invariant: a change sequence composed with its reversed inverses is
    // an identity on the confirmed buckets and the in-memory history.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let conditions_a = wallet.next_address().unwrap();
    let address_a = conditions_a.unlock_hash();
    let address_b = wallet.next_address().unwrap().unlock_hash();

    let txn1 = payment_transaction(&[(address_a, 100)]);
    let parent = txn1.siacoin_output_id(0);
    let txn2 = Transaction {
        siacoin_inputs: vec![SiacoinInput {
            parent_id: parent,
            unlock_conditions: conditions_a,
        }],
        siacoin_outputs: vec![SiacoinOutput {
            value: Currency::new(60),
            unlock_hash: address_b,
        }],
        miner_fees: vec![Currency::new(40)],
        ..Default::default()
    };

    let changes = vec![
        change_applying_block(block_with_transactions(vec![txn1])),
        change_applying_block(block_with_transactions(vec![txn2])),
    ];

    let before_dumps = confirmed_dumps(&wallet);
    for change in &changes {
        wallet.process_consensus_change(change);
    }
    assert_eq!(wallet.consensus_height().unwrap(), 2);
    assert_eq!(wallet.processed_transactions().unwrap().len(), 2);

    for change in changes.iter().rev() {
        wallet.process_consensus_change(&change.inverse());
    }
    assert_eq!(wallet.consensus_height().unwrap(), 0);
    assert!(wallet.processed_transactions().unwrap().is_empty());
    assert_eq!(confirmed_dumps(&wallet), before_dumps);
}

#[test]
fn test_transaction_index_resolves_to_latest_entry() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();

    let txn = payment_transaction(&[(address, 100)]);
    let txid = txn.id();
    wallet.process_consensus_change(&change_applying_block(block_with_transactions(vec![txn])));

    let via_index = wallet.transaction(txid).unwrap().unwrap();
    let history = wallet.processed_transactions().unwrap();
    assert_eq!(via_index, *history.last().unwrap());

    assert!(wallet
        .transaction(TransactionId([0xee; 32]))
        .unwrap()
        .is_none());
}

#[test]
fn test_siafund_pool_tracks_diff_composition() {
    // Invariant: the pool equals the apply/revert composition of all pool
    // diffs delivered so far.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");

    let mut change = ConsensusChange::default();
    change.applied_blocks.push(Block::default());
    change.siafund_pool_diffs.push(SiafundPoolDiff {
        direction: DiffDirection::Apply,
        adjusted: Currency::new(500),
        previous: Currency::ZERO,
    });
    change.siafund_pool_diffs.push(SiafundPoolDiff {
        direction: DiffDirection::Apply,
        adjusted: Currency::new(1200),
        previous: Currency::new(500),
    });

    wallet.process_consensus_change(&change);
    assert_eq!(wallet.siafund_pool().unwrap(), Currency::new(1200));

    wallet.process_consensus_change(&change.inverse());
    assert_eq!(wallet.siafund_pool().unwrap(), Currency::ZERO);
}

#[test]
fn test_miner_payout_maturity() {
    // S3: a miner payout appears in history with a delayed maturity height
    // but never enters the confirmed set until the consensus layer emits a
    // diff.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();

    let block = Block {
        miner_payouts: vec![SiacoinOutput {
            value: Currency::new(200),
            unlock_hash: address,
        }],
        ..Default::default()
    };
    let payout_id = block.miner_payout_id(0);
    let block_id = block.id();

    let mut change = ConsensusChange::default();
    change.applied_blocks.push(block);
    wallet.process_consensus_change(&change);

    assert_eq!(wallet.confirmed_siacoin_balance().unwrap(), Currency::ZERO);
    let history = wallet.processed_transactions().unwrap();
    assert_eq!(history.len(), 1);
    let pt = &history[0];
    assert_eq!(pt.transaction_id, TransactionId::from(block_id));
    assert_eq!(pt.outputs[0].fund_kind, FundKind::MinerPayout);
    assert_eq!(pt.outputs[0].maturity_height, 1 + MATURITY_DELAY);

    // Reaching the maturity height alone changes nothing.
    let mut filler = ConsensusChange::default();
    for _ in 0..MATURITY_DELAY {
        filler.applied_blocks.push(Block::default());
    }
    wallet.process_consensus_change(&filler);
    assert_eq!(wallet.consensus_height().unwrap(), 1 + MATURITY_DELAY);
    assert_eq!(wallet.confirmed_siacoin_balance().unwrap(), Currency::ZERO);

    // Maturity is materialized by the consensus layer as a diff.
    let mut maturity_change = ConsensusChange::default();
    maturity_change.applied_blocks.push(Block::default());
    maturity_change
        .siacoin_output_diffs
        .push(node_wallet_libs::SiacoinOutputDiff {
            direction: DiffDirection::Apply,
            id: payout_id,
            output: SiacoinOutput {
                value: Currency::new(200),
                unlock_hash: address,
            },
        });
    wallet.process_consensus_change(&maturity_change);
    assert_eq!(
        wallet.confirmed_siacoin_balance().unwrap(),
        Currency::new(200)
    );
}

#[test]
fn test_miner_payout_revert_pops_synthetic_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();

    let block = Block {
        miner_payouts: vec![SiacoinOutput {
            value: Currency::new(300),
            unlock_hash: address,
        }],
        ..Default::default()
    };
    let block_id = block.id();
    let mut change = ConsensusChange::default();
    change.applied_blocks.push(block);

    wallet.process_consensus_change(&change);
    assert_eq!(wallet.processed_transactions().unwrap().len(), 1);

    wallet.process_consensus_change(&change.inverse());
    assert!(wallet.processed_transactions().unwrap().is_empty());
    assert!(wallet
        .transaction(TransactionId::from(block_id))
        .unwrap()
        .is_none());
    assert_eq!(wallet.consensus_height().unwrap(), 0);
}

#[test]
fn test_siafund_claim_arithmetic() {
    // S4: spending a siafund output synthesizes a claim output worth
    // (pool - claim_start) * value.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let conditions = wallet.next_address().unwrap();
    let address = conditions.unlock_hash();
    let claim_address = UnlockHash([0xcc; 32]);

    // Fund: a siafund output of value 3 with claim start 400, and a pool
    // of 1000.
    let funding = Transaction {
        siafund_outputs: vec![SiafundOutput {
            value: Currency::new(3),
            unlock_hash: address,
            claim_start: Currency::new(400),
        }],
        ..Default::default()
    };
    let sfo_id = funding.siafund_output_id(0);
    let mut fund_change = ConsensusChange::default();
    fund_change
        .applied_blocks
        .push(block_with_transactions(vec![funding]));
    fund_change.siafund_pool_diffs.push(SiafundPoolDiff {
        direction: DiffDirection::Apply,
        adjusted: Currency::new(1000),
        previous: Currency::ZERO,
    });
    wallet.process_consensus_change(&fund_change);
    assert!(wallet
        .bucket_dump(BUCKET_HISTORIC_CLAIM_STARTS)
        .unwrap()
        .iter()
        .any(|(k, _)| k == &sfo_id.as_bytes().to_vec()));

    // Spend the siafund output.
    let spend = Transaction {
        siafund_inputs: vec![SiafundInput {
            parent_id: sfo_id,
            unlock_conditions: conditions,
            claim_unlock_hash: claim_address,
        }],
        ..Default::default()
    };
    let mut spend_change = ConsensusChange::default();
    spend_change
        .applied_blocks
        .push(block_with_transactions(vec![spend]));
    wallet.process_consensus_change(&spend_change);

    let history = wallet.processed_transactions().unwrap();
    let pt = history.last().unwrap();
    assert_eq!(pt.inputs.len(), 1);
    assert_eq!(pt.inputs[0].fund_kind, FundKind::SiafundInput);
    assert_eq!(pt.inputs[0].value, Currency::new(3));

    let claim = &pt.outputs[0];
    assert_eq!(claim.fund_kind, FundKind::ClaimOutput);
    assert_eq!(claim.value, Currency::new((1000 - 400) * 3));
    assert_eq!(claim.related_address, Some(claim_address));
    assert_eq!(claim.maturity_height, 2 + MATURITY_DELAY);
}

#[test]
fn test_unconfirmed_view_is_rebuilt_each_update() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();

    let pending = payment_transaction(&[(address, 75)]);
    wallet.receive_updated_unconfirmed_transactions(
        std::slice::from_ref(&pending),
        &ConsensusChange::default(),
    );

    let unconfirmed = wallet.unconfirmed_transactions().unwrap();
    assert_eq!(unconfirmed.len(), 1);
    assert!(unconfirmed[0].is_unconfirmed());
    assert_eq!(unconfirmed[0].outputs[0].maturity_height, u64::MAX);

    // An irrelevant pool replaces the view entirely.
    let unrelated = payment_transaction(&[(UnlockHash([0xdd; 32]), 10)]);
    wallet
        .receive_updated_unconfirmed_transactions(&[unrelated], &ConsensusChange::default());
    assert!(wallet.unconfirmed_transactions().unwrap().is_empty());
}

#[test]
fn test_unconfirmed_spend_resolves_historic_value() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let conditions = wallet.next_address().unwrap();
    let address = conditions.unlock_hash();

    let funding = payment_transaction(&[(address, 100)]);
    let parent = funding.siacoin_output_id(0);
    wallet.process_consensus_change(&change_applying_block(block_with_transactions(vec![
        funding,
    ])));

    let spend = Transaction {
        siacoin_inputs: vec![SiacoinInput {
            parent_id: parent,
            unlock_conditions: conditions,
        }],
        miner_fees: vec![Currency::new(1)],
        ..Default::default()
    };
    wallet.receive_updated_unconfirmed_transactions(&[spend], &ConsensusChange::default());

    let unconfirmed = wallet.unconfirmed_transactions().unwrap();
    assert_eq!(unconfirmed.len(), 1);
    assert_eq!(unconfirmed[0].inputs[0].value, Currency::new(100));
    assert_eq!(unconfirmed[0].outputs[0].fund_kind, FundKind::MinerFee);
}

#[test]
fn test_unconfirmed_update_with_unknown_parent_is_skipped() {
    // Spending an output the wallet has never seen aborts the update; the
    // previous view is kept and nothing is half-applied.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let conditions = wallet.next_address().unwrap();

    let spend = Transaction {
        siacoin_inputs: vec![SiacoinInput {
            parent_id: node_wallet_libs::SiacoinOutputID([0x77; 32]),
            unlock_conditions: conditions,
        }],
        ..Default::default()
    };
    wallet.receive_updated_unconfirmed_transactions(&[spend], &ConsensusChange::default());
    assert!(wallet.unconfirmed_transactions().unwrap().is_empty());
}

#[test]
fn test_deliveries_after_close_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();
    wallet.close().unwrap();

    let change =
        change_applying_block(block_with_transactions(vec![payment_transaction(&[(
            address, 100,
        )])]));
    wallet.process_consensus_change(&change);
    wallet.receive_updated_unconfirmed_transactions(
        &[payment_transaction(&[(address, 5)])],
        &ConsensusChange::default(),
    );

    assert_eq!(wallet.consensus_height().unwrap(), 0);
    assert!(wallet.processed_transactions().unwrap().is_empty());
    assert!(wallet.unconfirmed_transactions().unwrap().is_empty());
}

#[test]
fn test_outputs_in_confirmed_set_belong_to_wallet_keys() {
    // Invariant: every confirmed siacoin output's address is a wallet
    // address.
    let dir = tempfile::tempdir().unwrap();
    let wallet = unlocked_wallet(dir.path(), "pass");
    let address = wallet.next_address().unwrap().unlock_hash();

    let txn = payment_transaction(&[(address, 10), (UnlockHash([0x99; 32]), 20)]);
    wallet.process_consensus_change(&change_applying_block(block_with_transactions(vec![txn])));

    for (_, value) in wallet.bucket_dump(BUCKET_SIACOIN_OUTPUTS).unwrap() {
        let output: SiacoinOutput = serde_json::from_slice(&value).unwrap();
        assert!(wallet.is_wallet_address(&output.unlock_hash).unwrap());
    }
}
