//! Consensus-change and transaction-pool ingestion.
//!
//! One consensus change is processed as one database transaction plus one
//! batch of in-memory mutations. The in-memory mutations are staged on a
//! copy of the history state and published only after the database commit
//! succeeds, so a failed change leaves both disk and memory exactly as
//! they were. Within a change, diff application runs first, then history
//! reversal, then history application; the consensus height crosses its
//! pre-change value exactly once at that boundary.

use std::collections::HashMap;

use tracing::error;

use crate::data_structures::{
    Block, ConsensusChange, Currency, DiffDirection, FundKind, ProcessedInput, ProcessedOutput,
    ProcessedTransaction, Transaction, TransactionId, UnlockHash, MATURITY_DELAY, UNCONFIRMED,
};
use crate::errors::WalletResult;
use crate::scanning::{ConsensusSubscriber, TransactionPoolSubscriber};
use crate::storage::DbTx;

use super::database::{
    delete_siacoin_output, delete_siafund_output, get_historic_claim_start, get_historic_output,
    put_historic_claim_start, put_historic_output, put_siacoin_output, put_siafund_output,
};
use super::{Wallet, WalletKey};

/// History state staged during change processing. Published into the
/// wallet only after the enclosing database transaction commits.
pub(super) struct StagedHistory {
    pub processed_transactions: Vec<ProcessedTransaction>,
    pub processed_transaction_index: HashMap<TransactionId, usize>,
    pub siafund_pool: Currency,
    pub consensus_height: u64,
}

fn is_wallet_address(keys: &HashMap<UnlockHash, WalletKey>, unlock_hash: &UnlockHash) -> bool {
    keys.contains_key(unlock_hash)
}

/// Apply the change's output diffs to the confirmed-set buckets and walk
/// its pool diffs. Diffs for addresses outside the key map are skipped;
/// per-entry replay is idempotent.
fn update_confirmed_set(
    tx: &DbTx<'_>,
    keys: &HashMap<UnlockHash, WalletKey>,
    staged: &mut StagedHistory,
    change: &ConsensusChange,
) -> WalletResult<()> {
    for diff in &change.siacoin_output_diffs {
        if !is_wallet_address(keys, &diff.output.unlock_hash) {
            continue;
        }
        match diff.direction {
            DiffDirection::Apply => put_siacoin_output(tx, diff.id, &diff.output)?,
            DiffDirection::Revert => delete_siacoin_output(tx, diff.id)?,
        }
    }
    for diff in &change.siafund_output_diffs {
        if !is_wallet_address(keys, &diff.output.unlock_hash) {
            continue;
        }
        match diff.direction {
            DiffDirection::Apply => put_siafund_output(tx, diff.id, &diff.output)?,
            DiffDirection::Revert => delete_siafund_output(tx, diff.id)?,
        }
    }
    for diff in &change.siafund_pool_diffs {
        staged.siafund_pool = match diff.direction {
            DiffDirection::Apply => diff.adjusted,
            DiffDirection::Revert => diff.previous,
        };
    }
    Ok(())
}

/// Remove history introduced by the reverted blocks. A relevant
/// transaction is necessarily the most recent entry of the processed list,
/// so reversal only ever pops from the tail.
fn revert_history(
    keys: &HashMap<UnlockHash, WalletKey>,
    staged: &mut StagedHistory,
    change: &ConsensusChange,
) {
    for block in &change.reverted_blocks {
        for txn in block.transactions.iter().rev() {
            let txid = txn.id();
            if staged
                .processed_transactions
                .last()
                .is_some_and(|last| last.transaction_id == txid)
            {
                staged.processed_transactions.pop();
                staged.processed_transaction_index.remove(&txid);
            }
        }

        // Pop the synthetic miner-payout transaction appended for this
        // block, if any payout targeted a wallet address.
        for payout in &block.miner_payouts {
            if is_wallet_address(keys, &payout.unlock_hash) {
                staged.processed_transactions.pop();
                staged
                    .processed_transaction_index
                    .remove(&TransactionId::from(block.id()));
                break;
            }
        }
        staged.consensus_height = staged.consensus_height.saturating_sub(1);
    }
}

fn push_processed(staged: &mut StagedHistory, pt: ProcessedTransaction) {
    let txid = pt.transaction_id;
    staged.processed_transactions.push(pt);
    staged
        .processed_transaction_index
        .insert(txid, staged.processed_transactions.len() - 1);
}

/// Append history introduced by the applied blocks.
fn apply_history(
    tx: &DbTx<'_>,
    keys: &HashMap<UnlockHash, WalletKey>,
    staged: &mut StagedHistory,
    applied: &[Block],
) -> WalletResult<()> {
    for block in applied {
        staged.consensus_height += 1;

        let mut relevant = false;
        for (i, payout) in block.miner_payouts.iter().enumerate() {
            relevant = relevant || is_wallet_address(keys, &payout.unlock_hash);
            put_historic_output(tx, block.miner_payout_id(i as u64).into(), payout.value)?;
        }
        if relevant {
            let mut miner_pt = ProcessedTransaction {
                transaction: Transaction::default(),
                transaction_id: TransactionId::from(block.id()),
                confirmation_height: staged.consensus_height,
                confirmation_timestamp: block.timestamp,
                inputs: Vec::new(),
                outputs: Vec::new(),
            };
            for payout in &block.miner_payouts {
                miner_pt.outputs.push(ProcessedOutput {
                    fund_kind: FundKind::MinerPayout,
                    maturity_height: staged.consensus_height + MATURITY_DELAY,
                    wallet_address: is_wallet_address(keys, &payout.unlock_hash),
                    related_address: Some(payout.unlock_hash),
                    value: payout.value,
                });
            }
            push_processed(staged, miner_pt);
        }

        for txn in &block.transactions {
            // Relevance pass. Historic values and claim starts are
            // recorded for every output regardless of relevance: a later
            // transaction may spend them.
            let mut relevant = false;
            for sci in &txn.siacoin_inputs {
                relevant =
                    relevant || is_wallet_address(keys, &sci.unlock_conditions.unlock_hash());
            }
            for (i, sco) in txn.siacoin_outputs.iter().enumerate() {
                relevant = relevant || is_wallet_address(keys, &sco.unlock_hash);
                put_historic_output(tx, txn.siacoin_output_id(i as u64).into(), sco.value)?;
            }
            for sfi in &txn.siafund_inputs {
                relevant =
                    relevant || is_wallet_address(keys, &sfi.unlock_conditions.unlock_hash());
            }
            for (i, sfo) in txn.siafund_outputs.iter().enumerate() {
                relevant = relevant || is_wallet_address(keys, &sfo.unlock_hash);
                let id = txn.siafund_output_id(i as u64);
                put_historic_output(tx, id.into(), sfo.value)?;
                put_historic_claim_start(tx, id, sfo.claim_start)?;
            }

            if !relevant {
                continue;
            }

            let mut pt = ProcessedTransaction {
                transaction: txn.clone(),
                transaction_id: txn.id(),
                confirmation_height: staged.consensus_height,
                confirmation_timestamp: block.timestamp,
                inputs: Vec::new(),
                outputs: Vec::new(),
            };

            for sci in &txn.siacoin_inputs {
                let value = get_historic_output(tx, sci.parent_id.into())?;
                pt.inputs.push(ProcessedInput {
                    fund_kind: FundKind::SiacoinInput,
                    wallet_address: is_wallet_address(
                        keys,
                        &sci.unlock_conditions.unlock_hash(),
                    ),
                    related_address: sci.unlock_conditions.unlock_hash(),
                    value,
                });
            }

            for sco in &txn.siacoin_outputs {
                pt.outputs.push(ProcessedOutput {
                    fund_kind: FundKind::SiacoinOutput,
                    maturity_height: staged.consensus_height,
                    wallet_address: is_wallet_address(keys, &sco.unlock_hash),
                    related_address: Some(sco.unlock_hash),
                    value: sco.value,
                });
            }

            for sfi in &txn.siafund_inputs {
                let value = get_historic_output(tx, sfi.parent_id.into())?;
                pt.inputs.push(ProcessedInput {
                    fund_kind: FundKind::SiafundInput,
                    wallet_address: is_wallet_address(
                        keys,
                        &sfi.unlock_conditions.unlock_hash(),
                    ),
                    related_address: sfi.unlock_conditions.unlock_hash(),
                    value,
                });
                let claim_start = get_historic_claim_start(tx, sfi.parent_id)?;
                let claim_value = staged
                    .siafund_pool
                    .saturating_sub(claim_start)
                    .saturating_mul(value);
                pt.outputs.push(ProcessedOutput {
                    fund_kind: FundKind::ClaimOutput,
                    maturity_height: staged.consensus_height + MATURITY_DELAY,
                    wallet_address: is_wallet_address(
                        keys,
                        &sfi.unlock_conditions.unlock_hash(),
                    ),
                    related_address: Some(sfi.claim_unlock_hash),
                    value: claim_value,
                });
            }

            for sfo in &txn.siafund_outputs {
                pt.outputs.push(ProcessedOutput {
                    fund_kind: FundKind::SiafundOutput,
                    maturity_height: staged.consensus_height,
                    wallet_address: is_wallet_address(keys, &sfo.unlock_hash),
                    related_address: Some(sfo.unlock_hash),
                    value: sfo.value,
                });
            }

            for fee in &txn.miner_fees {
                pt.outputs.push(ProcessedOutput {
                    fund_kind: FundKind::MinerFee,
                    maturity_height: 0,
                    wallet_address: false,
                    related_address: None,
                    value: *fee,
                });
            }

            push_processed(staged, pt);
        }
    }
    Ok(())
}

/// Rebuild the unconfirmed view from the full pool contents.
fn build_unconfirmed(
    tx: &DbTx<'_>,
    keys: &HashMap<UnlockHash, WalletKey>,
    transactions: &[Transaction],
) -> WalletResult<Vec<ProcessedTransaction>> {
    let mut unconfirmed = Vec::new();
    for txn in transactions {
        let mut relevant = false;
        for sci in &txn.siacoin_inputs {
            relevant = relevant || is_wallet_address(keys, &sci.unlock_conditions.unlock_hash());
        }
        for (i, sco) in txn.siacoin_outputs.iter().enumerate() {
            relevant = relevant || is_wallet_address(keys, &sco.unlock_hash);
            // Recorded now so that the confirming block later finds the
            // historic value without a special case.
            put_historic_output(tx, txn.siacoin_output_id(i as u64).into(), sco.value)?;
        }
        for sfi in &txn.siafund_inputs {
            relevant = relevant || is_wallet_address(keys, &sfi.unlock_conditions.unlock_hash());
        }
        for sfo in &txn.siafund_outputs {
            relevant = relevant || is_wallet_address(keys, &sfo.unlock_hash);
        }

        if !relevant {
            continue;
        }

        let mut pt = ProcessedTransaction {
            transaction: txn.clone(),
            transaction_id: txn.id(),
            confirmation_height: UNCONFIRMED,
            confirmation_timestamp: UNCONFIRMED,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        for sci in &txn.siacoin_inputs {
            let value = get_historic_output(tx, sci.parent_id.into())?;
            pt.inputs.push(ProcessedInput {
                fund_kind: FundKind::SiacoinInput,
                wallet_address: is_wallet_address(keys, &sci.unlock_conditions.unlock_hash()),
                related_address: sci.unlock_conditions.unlock_hash(),
                value,
            });
        }
        for sco in &txn.siacoin_outputs {
            pt.outputs.push(ProcessedOutput {
                fund_kind: FundKind::SiacoinOutput,
                maturity_height: UNCONFIRMED,
                wallet_address: is_wallet_address(keys, &sco.unlock_hash),
                related_address: Some(sco.unlock_hash),
                value: sco.value,
            });
        }
        for fee in &txn.miner_fees {
            pt.outputs.push(ProcessedOutput {
                fund_kind: FundKind::MinerFee,
                maturity_height: 0,
                wallet_address: false,
                related_address: None,
                value: *fee,
            });
        }
        unconfirmed.push(pt);
    }
    Ok(unconfirmed)
}

impl Wallet {
    /// Ingest a consensus change: update the confirmed-set buckets, revert
    /// history destroyed by reverted blocks, and append history introduced
    /// by applied blocks, all within one database transaction.
    ///
    /// Delivery after shutdown has begun is silently dropped. A failed
    /// change is logged and skipped; redelivery is the consensus engine's
    /// responsibility.
    pub fn process_consensus_change(&self, change: &ConsensusChange) {
        let _guard = match self.tg.add() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => {
                error!("wallet state lock poisoned; dropping consensus change");
                return;
            }
        };

        let mut staged = StagedHistory {
            processed_transactions: state.processed_transactions.clone(),
            processed_transaction_index: state.processed_transaction_index.clone(),
            siafund_pool: state.siafund_pool,
            consensus_height: state.consensus_height,
        };
        let result = self.db.update(|tx| {
            update_confirmed_set(tx, &state.keys, &mut staged, change)?;
            revert_history(&state.keys, &mut staged, change);
            apply_history(tx, &state.keys, &mut staged, &change.applied_blocks)
        });
        match result {
            Ok(()) => {
                state.processed_transactions = staged.processed_transactions;
                state.processed_transaction_index = staged.processed_transaction_index;
                state.siafund_pool = staged.siafund_pool;
                state.consensus_height = staged.consensus_height;
            }
            Err(err) => error!(%err, "failed to apply consensus change"),
        }
    }

    /// Replace the unconfirmed view with the given pool contents. The pool
    /// is small relative to the chain and arrives as a set, so the view is
    /// rebuilt from scratch on every update.
    pub fn receive_updated_unconfirmed_transactions(
        &self,
        transactions: &[Transaction],
        _change: &ConsensusChange,
    ) {
        let _guard = match self.tg.add() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => {
                error!("wallet state lock poisoned; dropping pool update");
                return;
            }
        };

        let result = self
            .db
            .update(|tx| build_unconfirmed(tx, &state.keys, transactions));
        match result {
            Ok(unconfirmed) => state.unconfirmed_processed_transactions = unconfirmed,
            Err(err) => error!(%err, "failed to add unconfirmed transactions"),
        }
    }
}

impl ConsensusSubscriber for Wallet {
    fn process_consensus_change(&mut self, change: &ConsensusChange) {
        Wallet::process_consensus_change(self, change);
    }
}

impl TransactionPoolSubscriber for Wallet {
    fn receive_updated_unconfirmed_transactions(
        &mut self,
        transactions: &[Transaction],
        change: &ConsensusChange,
    ) {
        Wallet::receive_updated_unconfirmed_transactions(self, transactions, change);
    }
}
