//! Shared fixtures for integration tests: an in-memory consensus engine
//! and builders for blocks and consensus changes.

#![allow(dead_code)]

use std::cell::Cell;

use node_wallet_libs::{
    Block, ConsensusChange, ConsensusChangeId, ConsensusSet, ConsensusSubscriber, Currency,
    DiffDirection, ReleaseProfile, SiacoinOutput, SiacoinOutputDiff, SubscribeMode,
    SubscriptionId, Transaction, UnlockHash, Wallet, WalletConfig, WalletResult,
};

/// An in-memory consensus feed. `subscribe` synchronously replays every
/// recorded change, which is exactly the contract the seed scanner relies
/// on.
pub struct MockConsensusSet {
    changes: Vec<ConsensusChange>,
    subscribe_count: Cell<u64>,
}

impl MockConsensusSet {
    pub fn new() -> Self {
        MockConsensusSet {
            changes: Vec::new(),
            subscribe_count: Cell::new(0),
        }
    }

    /// Record a change, assigning it the next sequential id.
    pub fn push_change(&mut self, mut change: ConsensusChange) {
        change.id = ConsensusChangeId(self.changes.len() as u64 + 1);
        self.changes.push(change);
    }

    /// How many times `subscribe` has been called. The scanner's round
    /// count equals this.
    pub fn subscribe_count(&self) -> u64 {
        self.subscribe_count.get()
    }

    /// Deliver every recorded change to a wallet, in order.
    pub fn replay_into(&self, wallet: &Wallet) {
        for change in &self.changes {
            wallet.process_consensus_change(change);
        }
    }
}

impl ConsensusSet for MockConsensusSet {
    fn subscribe(
        &self,
        subscriber: &mut dyn ConsensusSubscriber,
        mode: SubscribeMode,
    ) -> WalletResult<SubscriptionId> {
        self.subscribe_count.set(self.subscribe_count.get() + 1);
        let after = match mode {
            SubscribeMode::FromBeginning => ConsensusChangeId(0),
            SubscribeMode::FromLast(id) => id,
        };
        for change in self.changes.iter().filter(|c| c.id.0 > after.0) {
            subscriber.process_consensus_change(change);
        }
        Ok(SubscriptionId(self.subscribe_count.get()))
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}

/// A block containing the given transactions and no miner payouts.
pub fn block_with_transactions(transactions: Vec<Transaction>) -> Block {
    Block {
        transactions,
        ..Default::default()
    }
}

/// A transaction paying `value` to each listed address.
pub fn payment_transaction(payments: &[(UnlockHash, u64)]) -> Transaction {
    Transaction {
        siacoin_outputs: payments
            .iter()
            .map(|&(unlock_hash, value)| SiacoinOutput {
                value: Currency::new(value),
                unlock_hash,
            })
            .collect(),
        ..Default::default()
    }
}

/// Wrap a block into a consensus change, with apply diffs for each of the
/// block's transaction outputs (the shape the consensus engine produces
/// for a freshly mined block).
pub fn change_applying_block(block: Block) -> ConsensusChange {
    let mut change = ConsensusChange::default();
    for txn in &block.transactions {
        for (i, sco) in txn.siacoin_outputs.iter().enumerate() {
            change.siacoin_output_diffs.push(SiacoinOutputDiff {
                direction: DiffDirection::Apply,
                id: txn.siacoin_output_id(i as u64),
                output: sco.clone(),
            });
        }
    }
    change.applied_blocks.push(block);
    change
}

/// A wallet with testing budgets rooted at `dir`, encrypted and unlocked
/// with the given passphrase.
pub fn unlocked_wallet(dir: &std::path::Path, passphrase: &str) -> Wallet {
    let wallet =
        Wallet::new(WalletConfig::new(dir).with_profile(ReleaseProfile::Testing)).unwrap();
    wallet.encrypt(passphrase).unwrap();
    wallet.unlock(passphrase).unwrap();
    wallet
}
